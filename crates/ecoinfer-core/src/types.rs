//! Type aliases and common types.

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::math;

/// 2x2 matrix for covariances and precisions of a transformed latent pair.
pub type Matrix2 = SMatrix<f64, 2, 2>;

/// 2-dimensional vector for a transformed latent pair (W1*, W2*).
pub type Vector2 = SVector<f64, 2>;

/// Observed margins of one areal unit.
///
/// `x` is the share of the first group and `y` the overall outcome share,
/// tied to the latent proportions by `y = x·w1 + (1 − x)·w2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    /// Group share X ∈ [0, 1].
    pub x: f64,
    /// Outcome share Y ∈ [0, 1].
    pub y: f64,
}

impl Margin {
    /// Create a margin pair.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// W2 implied by the accounting identity for a given W1.
    ///
    /// Only meaningful for `x < 1`.
    #[inline]
    pub fn w2_from_w1(&self, w1: f64) -> f64 {
        (self.y - self.x * w1) / (1.0 - self.x)
    }

    /// Y reproduced from a latent pair.
    #[inline]
    pub fn aggregate(&self, w1: f64, w2: f64) -> f64 {
        self.x * w1 + (1.0 - self.x) * w2
    }
}

/// Parameters θ = (μ, Σ) of one mixture component on the transformed scale.
///
/// Σ⁻¹ and ln|Σ| are cached because every Polya-urn weight needs them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Mean of W*.
    pub mu: Vector2,
    /// Covariance of W*.
    pub sigma: Matrix2,
    /// Cached inverse of `sigma`.
    pub inv_sigma: Matrix2,
    /// Cached ln|Σ|.
    pub ln_det: f64,
}

impl ClusterParams {
    /// Build from a mean and a precision matrix (the Wishart side of a draw).
    ///
    /// Returns `None` when the precision is singular.
    pub fn from_precision(mu: Vector2, inv_sigma: Matrix2) -> Option<Self> {
        let sigma = symmetrize(&inv_sigma.try_inverse()?);
        let det = sigma.determinant();
        if det.is_nan() || det <= 0.0 || sigma[(0, 0)] <= 0.0 {
            return None;
        }
        Some(Self {
            mu,
            sigma,
            inv_sigma: symmetrize(&inv_sigma),
            ln_det: math::ln(det),
        })
    }

    /// Build from a mean and a covariance matrix.
    ///
    /// Returns `None` when the covariance is not positive definite.
    pub fn from_covariance(mu: Vector2, sigma: Matrix2) -> Option<Self> {
        let sigma = symmetrize(&sigma);
        let det = sigma.determinant();
        if det.is_nan() || det <= 0.0 || sigma[(0, 0)] <= 0.0 {
            return None;
        }
        let inv_sigma = symmetrize(&sigma.try_inverse()?);
        Some(Self {
            mu,
            sigma,
            inv_sigma,
            ln_det: math::ln(det),
        })
    }

    /// Correlation ρ = Σ01 / √(Σ00 Σ11).
    #[inline]
    pub fn correlation(&self) -> f64 {
        self.sigma[(0, 1)] / math::sqrt(self.sigma[(0, 0)] * self.sigma[(1, 1)])
    }

    /// Upper triangle (Σ00, Σ01, Σ11), the layout used in stored draws.
    #[inline]
    pub fn sigma_upper(&self) -> [f64; 3] {
        [self.sigma[(0, 0)], self.sigma[(0, 1)], self.sigma[(1, 1)]]
    }
}

/// Average a matrix with its transpose.
#[inline]
pub fn symmetrize(m: &Matrix2) -> Matrix2 {
    (m + m.transpose()) * 0.5
}
