//! Non-fatal conditions raised by the numerical components.
//!
//! The core never logs. Components hand a [`Diagnostic`] to a
//! [`DiagnosticSink`] and carry on with their best estimate; the driver
//! decides how to surface it.

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use crate::bounds::UnitBounds;
use crate::integrate::{Moment, QuadStatus};
use crate::types::Margin;

/// A recoverable numerical problem.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The adaptive quadrature stopped before meeting its tolerance.
    IntegrationNonconvergence {
        /// Why the quadrature stopped.
        status: QuadStatus,
        /// Moment being integrated, `None` for the normalizing constant.
        moment: Option<Moment>,
        /// Margins of the unit.
        margin: Margin,
        /// Feasible bounds of the unit.
        bounds: UnitBounds,
        /// Best estimate returned in place of a converged value.
        estimate: f64,
        /// Error estimate at termination.
        abs_error: f64,
    },
    /// A moment tag outside −1..=7 was requested; the integrand was zero.
    InvalidSufficientStatisticKind {
        /// The rejected tag.
        tag: i32,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::IntegrationNonconvergence {
                status,
                moment,
                margin,
                bounds,
                estimate,
                abs_error,
            } => {
                let tag = moment.map_or(-1, Moment::tag);
                write!(
                    f,
                    "integration error {}: moment {} X {:.5} Y {:.5} [{:.5}, {:.5}] -> {:.5e} +- {:.5e}",
                    status.code(),
                    tag,
                    margin.x,
                    margin.y,
                    bounds.w1_lower,
                    bounds.w1_upper,
                    estimate,
                    abs_error
                )
            }
            Diagnostic::InvalidSufficientStatisticKind { tag } => {
                write!(f, "invalid sufficient statistic tag {}", tag)
            }
        }
    }
}

/// Receiver of non-fatal diagnostics.
pub trait DiagnosticSink {
    /// Accept one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

/// Sink that drops every diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl DiagnosticSink for Discard {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}
