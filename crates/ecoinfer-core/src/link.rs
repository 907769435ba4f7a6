//! Link transforms between bounded proportions and the unconstrained scale.
//!
//! Each variant maps W ∈ (0, 1) to W* ∈ ℝ. The sampler works with densities
//! of W*, so every density evaluated on the W scale picks up the Jacobian
//! |dW*/dW| reported by [`Link::log_jacobian`].

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::math;

/// Monotone link selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Link {
    /// W* = ln(W / (1 − W)).
    #[default]
    Logit,
    /// W* = Φ⁻¹(W).
    Probit,
    /// W* = −ln(−ln W).
    CLogLog,
}

impl Link {
    /// Decode the numeric selector used at the call boundary (1, 2, 3).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Link::Logit),
            2 => Some(Link::Probit),
            3 => Some(Link::CLogLog),
            _ => None,
        }
    }

    /// Numeric selector for this link.
    pub fn code(self) -> i32 {
        match self {
            Link::Logit => 1,
            Link::Probit => 2,
            Link::CLogLog => 3,
        }
    }

    /// Map a proportion to the unconstrained scale.
    #[inline]
    pub fn forward(self, w: f64) -> f64 {
        match self {
            Link::Logit => math::ln(w) - math::ln(1.0 - w),
            Link::Probit => math::normal_quantile(w),
            Link::CLogLog => -math::ln(-math::ln(w)),
        }
    }

    /// Map an unconstrained value back to (0, 1).
    #[inline]
    pub fn inverse(self, z: f64) -> f64 {
        match self {
            Link::Logit => math::logistic(z),
            Link::Probit => math::normal_cdf(z),
            Link::CLogLog => math::exp(-math::exp(-z)),
        }
    }

    /// ln |dW*/dW| at proportion `w`.
    #[inline]
    pub fn log_jacobian(self, w: f64) -> f64 {
        match self {
            Link::Logit => -math::ln(w) - math::ln(1.0 - w),
            Link::Probit => -math::normal_ln_pdf(math::normal_quantile(w)),
            Link::CLogLog => -math::ln(w) - math::ln(-math::ln(w)),
        }
    }

    /// |dW*/dt| where W moves at `rate` = dW/dt.
    ///
    /// Formed in log space: near-zero proportions have Jacobians that
    /// overflow on their own but meet equally tiny rates.
    #[inline]
    pub fn derivative_along(self, w: f64, rate: f64) -> f64 {
        math::exp(self.log_jacobian(w) + math::ln(math::abs(rate)))
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Link::Logit => "logit",
            Link::Probit => "probit",
            Link::CLogLog => "cloglog",
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
