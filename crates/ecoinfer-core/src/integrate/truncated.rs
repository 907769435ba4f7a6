//! Integrals of the bivariate Normal restricted to one unit's tomography line.
//!
//! The feasible segment is parametrized by t ∈ [0, 1] through the affine maps
//! of [`UnitBounds::w1_at`] and [`UnitBounds::w2_at`]. On the transformed
//! scale the integrand is φ₂(W*(t); μ, Σ)·|dW*/dt|, where |dW*/dt| is the arc
//! length of the transformed curve. The domain is clipped to
//! `[QUAD_T_LOWER, QUAD_T_UPPER]` because the link derivative blows up where
//! a bound touches 0 or 1.

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use crate::bounds::UnitBounds;
use crate::constants::{QUAD_T_LOWER, QUAD_T_UPPER};
use crate::density::mvn_pdf;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::link::Link;
use crate::math;
use crate::types::{ClusterParams, Margin, Vector2};

use super::quadrature::{AdaptiveQuadrature, Quadrature};

/// Moment functional multiplied into the bounded density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Moment {
    /// The normalized density itself (tag −1).
    Mass,
    /// W1* (tag 0).
    Star1,
    /// W2* (tag 1).
    Star2,
    /// W1*² (tag 2).
    Star1Sq,
    /// W1*·W2* (tag 3).
    Star1Star2,
    /// W2*² (tag 4).
    Star2Sq,
    /// W1 on the proportion scale (tag 5).
    Prop1,
    /// W2 on the proportion scale (tag 6).
    Prop2,
    /// Unnormalized density; its integral is the unit's likelihood (tag 7).
    LogLikelihood,
}

impl Moment {
    /// Decode a numeric tag in −1..=7.
    pub fn from_tag(tag: i32) -> Option<Self> {
        let m = match tag {
            -1 => Moment::Mass,
            0 => Moment::Star1,
            1 => Moment::Star2,
            2 => Moment::Star1Sq,
            3 => Moment::Star1Star2,
            4 => Moment::Star2Sq,
            5 => Moment::Prop1,
            6 => Moment::Prop2,
            7 => Moment::LogLikelihood,
            _ => return None,
        };
        Some(m)
    }

    /// Numeric tag of this moment.
    pub fn tag(self) -> i32 {
        match self {
            Moment::Mass => -1,
            Moment::Star1 => 0,
            Moment::Star2 => 1,
            Moment::Star1Sq => 2,
            Moment::Star1Star2 => 3,
            Moment::Star2Sq => 4,
            Moment::Prop1 => 5,
            Moment::Prop2 => 6,
            Moment::LogLikelihood => 7,
        }
    }

    #[inline]
    fn weight(self, star: &Vector2, link: Link) -> f64 {
        match self {
            Moment::Mass | Moment::LogLikelihood => 1.0,
            Moment::Star1 => star[0],
            Moment::Star2 => star[1],
            Moment::Star1Sq => star[0] * star[0],
            Moment::Star1Star2 => star[0] * star[1],
            Moment::Star2Sq => star[1] * star[1],
            Moment::Prop1 => link.inverse(star[0]),
            Moment::Prop2 => link.inverse(star[1]),
        }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Moment::Mass => "mass",
            Moment::Star1 => "W1*",
            Moment::Star2 => "W2*",
            Moment::Star1Sq => "W1*^2",
            Moment::Star1Star2 => "W1*W2*",
            Moment::Star2Sq => "W2*^2",
            Moment::Prop1 => "W1",
            Moment::Prop2 => "W2",
            Moment::LogLikelihood => "likelihood",
        };
        f.write_str(s)
    }
}

/// Expected sufficient statistics of one unit under the bounded density.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SufficientStatistics {
    /// E[W1*].
    pub star1: f64,
    /// E[W2*].
    pub star2: f64,
    /// E[W1*²].
    pub star1_sq: f64,
    /// E[W1*·W2*].
    pub star1_star2: f64,
    /// E[W2*²].
    pub star2_sq: f64,
    /// E[W1].
    pub prop1: f64,
    /// E[W2].
    pub prop2: f64,
}

/// Bounded bivariate integrator for one unit and one parameter draw.
#[derive(Debug, Clone, Copy)]
pub struct TruncatedIntegrator<'a> {
    margin: Margin,
    bounds: UnitBounds,
    params: &'a ClusterParams,
    link: Link,
    quadrature: AdaptiveQuadrature,
}

impl<'a> TruncatedIntegrator<'a> {
    /// Integrator with the default quadrature tolerances.
    pub fn new(margin: Margin, bounds: UnitBounds, params: &'a ClusterParams, link: Link) -> Self {
        Self {
            margin,
            bounds,
            params,
            link,
            quadrature: AdaptiveQuadrature::default(),
        }
    }

    /// Replace the quadrature settings.
    pub fn with_quadrature(mut self, quadrature: AdaptiveQuadrature) -> Self {
        self.quadrature = quadrature;
        self
    }

    /// Transformed point and arc-length factor at `t`, or `None` when the
    /// line leaves (0, 1)² or the transform is not finite there.
    #[inline]
    fn node(&self, t: f64) -> Option<(Vector2, f64)> {
        let w1 = self.bounds.w1_at(t);
        let w2 = self.bounds.w2_at(t);
        if !(w1 > 0.0 && w1 < 1.0 && w2 > 0.0 && w2 < 1.0) {
            return None;
        }
        let star = Vector2::new(self.link.forward(w1), self.link.forward(w2));
        let d1 = self.link.derivative_along(w1, self.bounds.w1_slope());
        let d2 = self.link.derivative_along(w2, self.bounds.w2_slope());
        let arc = math::sqrt(d1 * d1 + d2 * d2);
        if !(star[0].is_finite() && star[1].is_finite() && arc.is_finite()) {
            return None;
        }
        Some((star, arc))
    }

    fn run<S>(&self, moment: Option<Moment>, scale: f64, sink: &mut S) -> f64
    where
        S: DiagnosticSink + ?Sized,
    {
        let m = moment.unwrap_or(Moment::Mass);
        let result: Quadrature = self.quadrature.integrate(
            |t| match self.node(t) {
                Some((star, arc)) => {
                    m.weight(&star, self.link) * mvn_pdf(&star, self.params) * arc / scale
                }
                None => 0.0,
            },
            QUAD_T_LOWER,
            QUAD_T_UPPER,
        );
        if !result.status.is_converged() {
            sink.report(Diagnostic::IntegrationNonconvergence {
                status: result.status,
                moment,
                margin: self.margin,
                bounds: self.bounds,
                estimate: result.value,
                abs_error: result.abs_error,
            });
        }
        result.value
    }

    /// ∫ φ₂(W*(t); μ, Σ)·|dW*/dt| dt over the clipped domain.
    pub fn normalizing_constant<S>(&self, sink: &mut S) -> f64
    where
        S: DiagnosticSink + ?Sized,
    {
        self.run(None, 1.0, sink)
    }

    /// Expectation of `moment` under the density normalized by `normc`.
    ///
    /// [`Moment::LogLikelihood`] ignores `normc` and integrates the
    /// unnormalized density.
    pub fn expectation<S>(&self, moment: Moment, normc: f64, sink: &mut S) -> f64
    where
        S: DiagnosticSink + ?Sized,
    {
        let scale = if moment == Moment::LogLikelihood {
            1.0
        } else {
            normc
        };
        self.run(Some(moment), scale, sink)
    }

    /// [`expectation`](Self::expectation) keyed by a numeric tag.
    ///
    /// An unknown tag is reported and treated as a zero integrand.
    pub fn integrate_tagged<S>(&self, tag: i32, normc: f64, sink: &mut S) -> f64
    where
        S: DiagnosticSink + ?Sized,
    {
        match Moment::from_tag(tag) {
            Some(moment) => self.expectation(moment, normc, sink),
            None => {
                sink.report(Diagnostic::InvalidSufficientStatisticKind { tag });
                0.0
            }
        }
    }

    /// Log-likelihood of the unit's margins under (μ, Σ).
    pub fn log_likelihood<S>(&self, sink: &mut S) -> f64
    where
        S: DiagnosticSink + ?Sized,
    {
        math::ln(self.expectation(Moment::LogLikelihood, 1.0, sink))
    }

    /// All first and second moments, each integrated separately.
    pub fn sufficient_statistics<S>(&self, sink: &mut S) -> SufficientStatistics
    where
        S: DiagnosticSink + ?Sized,
    {
        let normc = self.normalizing_constant(sink);
        SufficientStatistics {
            star1: self.expectation(Moment::Star1, normc, sink),
            star2: self.expectation(Moment::Star2, normc, sink),
            star1_sq: self.expectation(Moment::Star1Sq, normc, sink),
            star1_star2: self.expectation(Moment::Star1Star2, normc, sink),
            star2_sq: self.expectation(Moment::Star2Sq, normc, sink),
            prop1: self.expectation(Moment::Prop1, normc, sink),
            prop2: self.expectation(Moment::Prop2, normc, sink),
        }
    }
}

/// Inputs for one unit of a batch integration.
#[derive(Debug, Clone, Copy)]
pub struct UnitIntegrand<'a> {
    /// Unit margins.
    pub margin: Margin,
    /// Feasible bounds.
    pub bounds: UnitBounds,
    /// Current parameters of the unit's cluster.
    pub params: &'a ClusterParams,
}

fn unit_log_likelihood(unit: &UnitIntegrand<'_>, link: Link) -> (f64, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let ll = TruncatedIntegrator::new(unit.margin, unit.bounds, unit.params, link)
        .log_likelihood(&mut diagnostics);
    (ll, diagnostics)
}

/// Log-likelihood of every unit, in input order.
///
/// Units share no mutable state, so with the `parallel` feature the
/// integrations run on the rayon pool. Diagnostics are returned in unit order
/// either way.
pub fn log_likelihoods(units: &[UnitIntegrand<'_>], link: Link) -> (Vec<f64>, Vec<Diagnostic>) {
    #[cfg(feature = "parallel")]
    let per_unit: Vec<(f64, Vec<Diagnostic>)> = {
        use rayon::prelude::*;
        units
            .par_iter()
            .map(|u| unit_log_likelihood(u, link))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let per_unit: Vec<(f64, Vec<Diagnostic>)> =
        units.iter().map(|u| unit_log_likelihood(u, link)).collect();

    let mut values = Vec::with_capacity(per_unit.len());
    let mut diagnostics = Vec::new();
    for (ll, d) in per_unit {
        values.push(ll);
        diagnostics.extend(d);
    }
    (values, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Discard;
    use crate::types::Matrix2;

    fn params() -> ClusterParams {
        ClusterParams::from_covariance(
            Vector2::new(0.2, -0.3),
            Matrix2::new(1.5, 0.4, 0.4, 0.8),
        )
        .unwrap()
    }

    fn riemann(integrator: &TruncatedIntegrator<'_>, n: usize) -> f64 {
        let h = (QUAD_T_UPPER - QUAD_T_LOWER) / n as f64;
        (0..n)
            .map(|k| {
                let t = QUAD_T_LOWER + (k as f64 + 0.5) * h;
                match integrator.node(t) {
                    Some((star, arc)) => mvn_pdf(&star, integrator.params) * arc * h,
                    None => 0.0,
                }
            })
            .sum()
    }

    #[test]
    fn test_normalized_density_integrates_to_one() {
        let p = params();
        for link in [Link::Logit, Link::Probit, Link::CLogLog] {
            for &(x, y) in &[(0.3, 0.4), (0.7, 0.6), (0.5, 0.1)] {
                let m = Margin::new(x, y);
                let integ = TruncatedIntegrator::new(m, UnitBounds::from_margin(&m), &p, link);
                let normc = integ.normalizing_constant(&mut Discard);
                assert!(normc > 0.0);
                let mass = integ.expectation(Moment::Mass, normc, &mut Discard);
                assert!((mass - 1.0).abs() < 1e-6, "{link} x={x} y={y}: {mass}");
            }
        }
    }

    #[test]
    fn test_normalizing_constant_matches_riemann_sum() {
        let p = params();
        let m = Margin::new(0.6, 0.35);
        let integ = TruncatedIntegrator::new(m, UnitBounds::from_margin(&m), &p, Link::Logit);
        let mut sink: Vec<Diagnostic> = Vec::new();
        let normc = integ.normalizing_constant(&mut sink);
        let approx = riemann(&integ, 200_000);
        assert!((normc - approx).abs() < 1e-4 * normc, "{normc} vs {approx}");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_expected_proportions_inside_bounds() {
        let p = params();
        let m = Margin::new(0.7, 0.6);
        let b = UnitBounds::from_margin(&m);
        let integ = TruncatedIntegrator::new(m, b, &p, Link::Logit);
        let stats = integ.sufficient_statistics(&mut Discard);
        assert!(stats.prop1 > b.w1_lower && stats.prop1 < b.w1_upper);
        assert!(stats.prop2 > b.w2_lower && stats.prop2 < b.w2_upper);
        // The expected pair lies on the line because the identity is affine.
        assert!((m.aggregate(stats.prop1, stats.prop2) - 0.6).abs() < 1e-5);
        assert!(stats.star1_sq >= stats.star1 * stats.star1);
    }

    #[test]
    fn test_nodes_off_the_unit_square_contribute_zero() {
        let p = params();
        let m = Margin::new(0.5, 0.5);
        let inside = UnitBounds::from_margin(&m);
        // Same line extended to W1 ∈ [−0.5, 1.5]: half of it leaves (0, 1)².
        let wide = UnitBounds {
            w1_lower: -0.5,
            w1_upper: 1.5,
            w2_lower: -0.5,
            w2_upper: 1.5,
        };
        let integ = TruncatedIntegrator::new(m, wide, &p, Link::Logit);
        assert!(integ.node(0.1).is_none());
        assert!(integ.node(0.9).is_none());
        assert!(integ.node(0.5).is_some());

        let normc = integ.normalizing_constant(&mut Discard);
        assert!(normc.is_finite() && normc > 0.0);
        // The arc-length integral does not depend on the parametrization, so
        // the feasible half reproduces the integral over the true segment.
        let reference = TruncatedIntegrator::new(m, inside, &p, Link::Logit);
        let expected = reference.normalizing_constant(&mut Discard);
        assert!((normc - expected).abs() < 1e-3 * expected, "{normc} vs {expected}");
    }

    #[test]
    fn test_unknown_tag_reports_and_returns_zero() {
        let p = params();
        let m = Margin::new(0.3, 0.4);
        let integ = TruncatedIntegrator::new(m, UnitBounds::from_margin(&m), &p, Link::Logit);
        let mut sink: Vec<Diagnostic> = Vec::new();
        assert_eq!(integ.integrate_tagged(8, 1.0, &mut sink), 0.0);
        assert_eq!(sink, vec![Diagnostic::InvalidSufficientStatisticKind { tag: 8 }]);
    }

    #[test]
    fn test_tags_round_trip() {
        for tag in -1..=7 {
            assert_eq!(Moment::from_tag(tag).map(Moment::tag), Some(tag));
        }
        assert_eq!(Moment::from_tag(-2), None);
    }

    #[test]
    fn test_nonconvergence_is_reported_with_estimate() {
        let p = params();
        let m = Margin::new(0.3, 0.4);
        let integ = TruncatedIntegrator::new(m, UnitBounds::from_margin(&m), &p, Link::Logit)
            .with_quadrature(AdaptiveQuadrature::new(0.0, 0.0, 1));
        let mut sink: Vec<Diagnostic> = Vec::new();
        let normc = integ.normalizing_constant(&mut sink);
        assert!(normc > 0.0);
        assert_eq!(sink.len(), 1);
        match &sink[0] {
            Diagnostic::IntegrationNonconvergence {
                moment, estimate, ..
            } => {
                assert_eq!(*moment, None);
                assert_eq!(*estimate, normc);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_batch_log_likelihood_preserves_order() {
        let p = params();
        let margins = [Margin::new(0.3, 0.4), Margin::new(0.7, 0.6), Margin::new(0.5, 0.9)];
        let units: Vec<UnitIntegrand<'_>> = margins
            .iter()
            .map(|m| UnitIntegrand {
                margin: *m,
                bounds: UnitBounds::from_margin(m),
                params: &p,
            })
            .collect();
        let (values, diagnostics) = log_likelihoods(&units, Link::Logit);
        assert!(diagnostics.is_empty());
        for (m, v) in margins.iter().zip(&values) {
            let single = TruncatedIntegrator::new(*m, UnitBounds::from_margin(m), &p, Link::Logit)
                .log_likelihood(&mut Discard);
            assert_eq!(*v, single);
            assert!(v.is_finite());
        }
    }
}
