//! Side channel for progress, diagnostics and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ecoinfer_core::Diagnostic;

use crate::result::RunStatus;

/// Receives notifications while a run is in progress.
///
/// Every method has an empty default, so implementors only override what
/// they care about.
pub trait Observer {
    /// Called once before the first iteration.
    fn on_start(&mut self, _units: usize, _effective_units: usize, _iterations: usize) {}

    /// Called each time another tenth of the iterations has completed.
    fn on_progress(&mut self, _percent: u32, _iteration: usize) {}

    /// Called for each non-fatal numerical problem, in the order raised.
    fn on_diagnostic(&mut self, _diagnostic: &Diagnostic) {}

    /// Called once after the last iteration or after an interrupt.
    fn on_finish(&mut self, _status: &RunStatus, _stored: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Observer for Silent {}

/// Observer that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_start(&mut self, units: usize, effective_units: usize, iterations: usize) {
        tracing::debug!(
            "Starting DP sampler: {} units ({} effective), {} iterations",
            units,
            effective_units,
            iterations
        );
    }

    fn on_progress(&mut self, percent: u32, iteration: usize) {
        tracing::info!(percent, iteration, "{:3} percent done", percent);
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::IntegrationNonconvergence { status, .. } => {
                tracing::warn!(code = status.code(), "{}", diagnostic);
            }
            Diagnostic::InvalidSufficientStatisticKind { tag } => {
                tracing::warn!(tag, "{}", diagnostic);
            }
        }
    }

    fn on_finish(&mut self, status: &RunStatus, stored: usize) {
        match status {
            RunStatus::Completed => {
                tracing::debug!("DP sampler finished: {} draws stored", stored);
            }
            RunStatus::Interrupted { iteration } => {
                tracing::info!(
                    "DP sampler interrupted at iteration {}: {} draws stored",
                    iteration,
                    stored
                );
            }
        }
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_start(&mut self, units: usize, effective_units: usize, iterations: usize) {
        (**self).on_start(units, effective_units, iterations);
    }

    fn on_progress(&mut self, percent: u32, iteration: usize) {
        (**self).on_progress(percent, iteration);
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        (**self).on_diagnostic(diagnostic);
    }

    fn on_finish(&mut self, status: &RunStatus, stored: usize) {
        (**self).on_finish(status, stored);
    }
}

/// Cancellation flag polled between outer iterations.
pub trait Interrupt {
    /// True once the run should stop.
    fn is_interrupted(&self) -> bool;
}

/// Interrupt that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Interrupt for Never {
    fn is_interrupted(&self) -> bool {
        false
    }
}

impl Interrupt for AtomicBool {
    fn is_interrupted(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: Interrupt + ?Sized> Interrupt for Arc<T> {
    fn is_interrupted(&self) -> bool {
        (**self).is_interrupted()
    }
}

impl<T: Interrupt + ?Sized> Interrupt for &T {
    fn is_interrupted(&self) -> bool {
        (**self).is_interrupted()
    }
}
