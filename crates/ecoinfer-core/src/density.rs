//! Bivariate Normal and Student-t densities on the transformed scale.

use core::f64::consts::PI;

use crate::constants::LOG_2PI;
use crate::math;
use crate::types::{symmetrize, ClusterParams, Matrix2, Vector2};

/// Log-density of N(μ, Σ) at `x`, using the cached Σ⁻¹ and ln|Σ|.
#[inline]
pub fn mvn_ln_pdf(x: &Vector2, params: &ClusterParams) -> f64 {
    let d = x - params.mu;
    let q = d.dot(&(params.inv_sigma * d));
    -LOG_2PI - 0.5 * params.ln_det - 0.5 * q
}

/// Density of N(μ, Σ) at `x`.
#[inline]
pub fn mvn_pdf(x: &Vector2, params: &ClusterParams) -> f64 {
    math::exp(mvn_ln_pdf(x, params))
}

/// Bivariate Student-t with location μ, scale matrix S and `df` degrees of freedom.
///
/// Used as the prior predictive of a single observation under the
/// Normal-Inverse-Wishart base measure.
#[derive(Debug, Clone, Copy)]
pub struct StudentT2 {
    mu: Vector2,
    inv_scale: Matrix2,
    ln_norm: f64,
    df: f64,
}

impl StudentT2 {
    /// Create the distribution. Returns `None` if `scale` is not positive
    /// definite or `df` is not positive.
    pub fn new(mu: Vector2, scale: Matrix2, df: f64) -> Option<Self> {
        if df.is_nan() || df <= 0.0 {
            return None;
        }
        let scale = symmetrize(&scale);
        let det = scale.determinant();
        if det.is_nan() || det <= 0.0 || scale[(0, 0)] <= 0.0 {
            return None;
        }
        let inv_scale = scale.try_inverse()?;
        let ln_norm = math::ln_gamma(0.5 * (df + 2.0))
            - math::ln_gamma(0.5 * df)
            - math::ln(df * PI)
            - 0.5 * math::ln(det);
        Some(Self {
            mu,
            inv_scale,
            ln_norm,
            df,
        })
    }

    /// Prior predictive of one observation under NIW(μ0, τ0, ν0, S0).
    ///
    /// t with ν0 − 1 degrees of freedom and scale S0 (1 + τ0) / (τ0 (ν0 − 1)).
    pub fn niw_predictive(mu0: Vector2, tau0: f64, nu0: f64, s0: &Matrix2) -> Option<Self> {
        let df = nu0 - 1.0;
        let scale = s0 * ((1.0 + tau0) / (tau0 * df));
        Self::new(mu0, scale, df)
    }

    /// Log-density at `x`.
    pub fn ln_pdf(&self, x: &Vector2) -> f64 {
        let d = x - self.mu;
        let q = d.dot(&(self.inv_scale * d));
        self.ln_norm - 0.5 * (self.df + 2.0) * math::ln_1p(q / self.df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_bivariate_normal_at_origin() {
        let p = ClusterParams::from_covariance(Vector2::zeros(), Matrix2::identity()).unwrap();
        let v = mvn_pdf(&Vector2::zeros(), &p);
        assert!((v - 1.0 / (2.0 * PI)).abs() < 1e-15);
    }

    #[test]
    fn test_correlated_normal_matches_closed_form() {
        let sigma = Matrix2::new(2.0, 0.6, 0.6, 0.5);
        let mu = Vector2::new(0.3, -0.2);
        let p = ClusterParams::from_covariance(mu, sigma).unwrap();
        let x = Vector2::new(1.0, 0.4);

        let s0 = 2.0f64.sqrt();
        let s1 = 0.5f64.sqrt();
        let rho = 0.6 / (s0 * s1);
        let z0 = (x[0] - mu[0]) / s0;
        let z1 = (x[1] - mu[1]) / s1;
        let expected = (-(z0 * z0 + z1 * z1 - 2.0 * rho * z0 * z1) / (2.0 * (1.0 - rho * rho)))
            .exp()
            / (2.0 * PI * s0 * s1 * (1.0 - rho * rho).sqrt());
        assert!((mvn_pdf(&x, &p) - expected).abs() < 1e-14);
    }

    #[test]
    fn test_student_t_approaches_normal() {
        let t = StudentT2::new(Vector2::zeros(), Matrix2::identity(), 1e7).unwrap();
        let p = ClusterParams::from_covariance(Vector2::zeros(), Matrix2::identity()).unwrap();
        let x = Vector2::new(0.7, -1.1);
        assert!((t.ln_pdf(&x) - mvn_ln_pdf(&x, &p)).abs() < 1e-5);
    }

    #[test]
    fn test_student_t_cauchy_at_origin() {
        // Bivariate t with df=1 at its mode: Γ(3/2) / (Γ(1/2) π) = 1 / (2π).
        let t = StudentT2::new(Vector2::zeros(), Matrix2::identity(), 1.0).unwrap();
        assert!((t.ln_pdf(&Vector2::zeros()) - (1.0 / (2.0 * PI)).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_student_t_rejects_bad_input() {
        assert!(StudentT2::new(Vector2::zeros(), Matrix2::identity(), 0.0).is_none());
        assert!(StudentT2::new(Vector2::zeros(), Matrix2::zeros(), 3.0).is_none());
    }
}
