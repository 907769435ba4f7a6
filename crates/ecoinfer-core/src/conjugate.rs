//! Normal-Inverse-Wishart conjugate updates for cluster parameters.
//!
//! Base measure G0:
//!
//! ```text
//! Σ⁻¹ ~ Wishart(ν0, S0⁻¹)
//! μ | Σ ~ N(μ0, Σ/τ0)
//! ```
//!
//! Given n member points with mean w̄ and scatter Σ(w_k − w̄)(w_k − w̄)ᵀ:
//!
//! ```text
//! S_n = S0 + scatter + τ0·n/(τ0 + n)·(w̄ − μ0)(w̄ − μ0)ᵀ
//! Σ⁻¹ ~ Wishart(ν0 + n, S_n⁻¹)
//! μ | Σ ~ N((τ0·μ0 + n·w̄)/(τ0 + n), Σ/(τ0 + n))
//! ```

use core::fmt;

use rand::Rng;
use rand_distr::{ChiSquared, Distribution, StandardNormal};

use crate::math;
use crate::types::{symmetrize, ClusterParams, Matrix2, Vector2};

/// Normal-Inverse-Wishart hyperparameters (μ0, τ0, ν0, S0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NiwPrior {
    /// Prior mean of μ.
    pub mu0: Vector2,
    /// Prior pseudo-count on μ.
    pub tau0: f64,
    /// Prior degrees of freedom.
    pub nu0: f64,
    /// Prior scale matrix.
    pub s0: Matrix2,
}

/// Why a conjugate draw failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjugateError {
    /// A scale matrix reaching the Wishart draw was not positive definite.
    NotPositiveDefinite,
    /// Degrees of freedom too small for a 2×2 Wishart.
    InvalidDegreesOfFreedom,
}

impl fmt::Display for ConjugateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConjugateError::NotPositiveDefinite => {
                write!(f, "scale matrix is not symmetric positive definite")
            }
            ConjugateError::InvalidDegreesOfFreedom => {
                write!(f, "wishart degrees of freedom must exceed 1")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConjugateError {}

/// Sufficient statistics of a cluster's members on the transformed scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterSummary {
    /// Number of members.
    pub n: usize,
    /// Member mean w̄ (zero when empty).
    pub mean: Vector2,
    /// Centred scatter Σ(w_k − w̄)(w_k − w̄)ᵀ.
    pub scatter: Matrix2,
}

impl ClusterSummary {
    /// Summary of no members; the posterior draw becomes a prior draw.
    pub fn empty() -> Self {
        Self {
            n: 0,
            mean: Vector2::zeros(),
            scatter: Matrix2::zeros(),
        }
    }

    /// Summary of a single point.
    pub fn single(point: Vector2) -> Self {
        Self {
            n: 1,
            mean: point,
            scatter: Matrix2::zeros(),
        }
    }

    /// Two-pass mean and scatter over `points`.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vector2>,
        I::IntoIter: Clone,
    {
        let iter = points.into_iter();
        let mut n = 0usize;
        let mut sum = Vector2::zeros();
        for p in iter.clone() {
            sum += p;
            n += 1;
        }
        if n == 0 {
            return Self::empty();
        }
        let mean = sum / n as f64;
        let mut scatter = Matrix2::zeros();
        for p in iter {
            let d = p - mean;
            scatter += d * d.transpose();
        }
        Self { n, mean, scatter }
    }
}

/// Draw a 2×2 Wishart(df, scale) matrix by Bartlett decomposition.
///
/// With scale = L Lᵀ and A lower-triangular, A_ii = √χ²(df − i) and
/// A_ij ~ N(0, 1) below the diagonal, the draw is (L A)(L A)ᵀ.
pub fn sample_wishart<R: Rng + ?Sized>(
    df: f64,
    scale: &Matrix2,
    rng: &mut R,
) -> Result<Matrix2, ConjugateError> {
    if df.is_nan() || df <= 1.0 {
        return Err(ConjugateError::InvalidDegreesOfFreedom);
    }
    let chol = symmetrize(scale)
        .cholesky()
        .ok_or(ConjugateError::NotPositiveDefinite)?;

    let mut bartlett = Matrix2::zeros();
    for row in 0..2 {
        let chi = ChiSquared::new(df - row as f64)
            .map_err(|_| ConjugateError::InvalidDegreesOfFreedom)?;
        bartlett[(row, row)] = math::sqrt(chi.sample(rng));
        for col in 0..row {
            bartlett[(row, col)] = StandardNormal.sample(rng);
        }
    }
    let product = chol.l() * bartlett;
    Ok(symmetrize(&(product * product.transpose())))
}

/// Draw (μ, Σ) from the NIW posterior given a member summary.
///
/// `summary.n == 0` draws from the prior G0 itself.
pub fn niw_posterior_draw<R: Rng + ?Sized>(
    prior: &NiwPrior,
    summary: &ClusterSummary,
    rng: &mut R,
) -> Result<ClusterParams, ConjugateError> {
    let n = summary.n as f64;
    let tau_n = prior.tau0 + n;
    let nu_n = prior.nu0 + n;

    let mut s_n = prior.s0 + summary.scatter;
    let mut mu_n = prior.mu0;
    if summary.n > 0 {
        let d = summary.mean - prior.mu0;
        s_n += d * d.transpose() * (prior.tau0 * n / tau_n);
        mu_n = (prior.mu0 * prior.tau0 + summary.mean * n) / tau_n;
    }

    let inv_s_n = symmetrize(&s_n)
        .try_inverse()
        .ok_or(ConjugateError::NotPositiveDefinite)?;
    let precision = sample_wishart(nu_n, &inv_s_n, rng)?;
    let draw = ClusterParams::from_precision(mu_n, precision)
        .ok_or(ConjugateError::NotPositiveDefinite)?;

    let mean_chol = (draw.sigma / tau_n)
        .cholesky()
        .ok_or(ConjugateError::NotPositiveDefinite)?;
    let z = Vector2::new(StandardNormal.sample(rng), StandardNormal.sample(rng));
    let mu = mu_n + mean_chol.l() * z;

    Ok(ClusterParams { mu, ..draw })
}

/// Draw independent parameters from the base measure G0.
pub fn prior_draw<R: Rng + ?Sized>(
    prior: &NiwPrior,
    rng: &mut R,
) -> Result<ClusterParams, ConjugateError> {
    niw_posterior_draw(prior, &ClusterSummary::empty(), rng)
}
