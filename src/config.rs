//! Run controls and prior hyperparameters for the DP sampler.

use ecoinfer_core::constants::{
    DEFAULT_ALPHA, DEFAULT_GRID_RESOLUTION, DEFAULT_SEED, DEFAULT_START_RETRY_CAP,
};
use ecoinfer_core::dp::{BaseMeasure, ConcentrationPrior};
use ecoinfer_core::{Link, Matrix2, NiwPrior, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hyperparameters of the Dirichlet-process mixture.
///
/// The base measure G0 is Normal-Inverse-Wishart on the transformed scale:
/// Σ⁻¹ ~ Wishart(ν0, S0⁻¹), μ | Σ ~ N(μ0, Σ/τ0). The concentration α has a
/// Gamma(a0, rate b0) hyperprior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    /// Prior mean of cluster means. Default: (0, 0).
    pub mu0: Vector2,
    /// Prior pseudo-count on cluster means. Default: 2.
    pub tau0: f64,
    /// Prior degrees of freedom. Default: 4.
    pub nu0: f64,
    /// Prior scale matrix. Default: 10·I.
    pub s0: Matrix2,
    /// Shape of the α hyperprior. Default: 1.
    pub a0: f64,
    /// Rate of the α hyperprior. Default: 0.1.
    pub b0: f64,
}

impl Default for Prior {
    fn default() -> Self {
        Self {
            mu0: Vector2::zeros(),
            tau0: 2.0,
            nu0: 4.0,
            s0: Matrix2::identity() * 10.0,
            a0: 1.0,
            b0: 0.1,
        }
    }
}

impl Prior {
    /// The NIW part of the prior.
    pub fn niw(&self) -> NiwPrior {
        NiwPrior {
            mu0: self.mu0,
            tau0: self.tau0,
            nu0: self.nu0,
            s0: self.s0,
        }
    }

    /// The α hyperprior.
    pub fn concentration(&self) -> ConcentrationPrior {
        ConcentrationPrior {
            a0: self.a0,
            b0: self.b0,
        }
    }

    /// Base measure with its precomputed predictive density.
    pub(crate) fn base_measure(&self) -> Result<BaseMeasure> {
        BaseMeasure::new(self.niw()).ok_or_else(|| {
            Error::InvalidConfig("prior predictive is improper: check tau0, nu0 and s0".to_string())
        })
    }

    /// Check the hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.mu0[0].is_finite() && self.mu0[1].is_finite()) {
            return Err(Error::InvalidConfig("mu0 must be finite".to_string()));
        }
        if !(self.tau0 > 0.0) {
            return Err(Error::InvalidConfig("tau0 must be positive".to_string()));
        }
        if !(self.nu0 > 1.0) {
            return Err(Error::InvalidConfig("nu0 must be greater than 1".to_string()));
        }
        let s0 = self.s0;
        if (s0[(0, 1)] - s0[(1, 0)]).abs() > 1e-12 * s0.norm() {
            return Err(Error::InvalidConfig("s0 must be symmetric".to_string()));
        }
        if !(s0[(0, 0)] > 0.0 && s0.determinant() > 0.0) {
            return Err(Error::InvalidConfig("s0 must be positive definite".to_string()));
        }
        if !(self.a0 > 0.0) || !(self.b0 > 0.0) {
            return Err(Error::InvalidConfig("a0 and b0 must be positive".to_string()));
        }
        Ok(())
    }
}

/// Configuration options for [`DpSampler`](crate::DpSampler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // =========================================================================
    // Chain length
    // =========================================================================
    /// Total number of outer Gibbs iterations. Default: 5,000.
    pub iterations: usize,

    /// Iterations discarded before storage starts. Default: 1,000.
    pub burn_in: usize,

    /// Store every `thin`-th post burn-in iteration. Default: 1.
    pub thin: usize,

    // =========================================================================
    // Model
    // =========================================================================
    /// Link between proportions and the unconstrained scale. Default: logit.
    pub link: Link,

    /// Prior hyperparameters.
    pub prior: Prior,

    /// Update α every iteration. When false α stays at `initial_alpha`.
    /// Default: true.
    pub update_alpha: bool,

    /// Starting concentration α. Default: 1.0.
    pub initial_alpha: f64,

    // =========================================================================
    // Optional outputs
    // =========================================================================
    /// Store posterior-predictive W and Y draws. Default: false.
    pub predict: bool,

    /// Store the summed unit log-likelihood with every draw. Default: false.
    ///
    /// This integrates every interior unit each stored draw.
    pub log_likelihood: bool,

    // =========================================================================
    // Numerics
    // =========================================================================
    /// Grid points per unit length of a feasible W1 interval. Default: 1,000.
    pub grid_resolution: usize,

    /// Proposals the rejection initializer may draw per unit. Default: 100,000.
    pub start_retry_cap: usize,

    /// Seed used by [`DpSampler::run`](crate::DpSampler::run).
    pub seed: u64,

    /// Emit decile progress to the observer. Default: true.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iterations: 5_000,
            burn_in: 1_000,
            thin: 1,

            link: Link::Logit,
            prior: Prior::default(),
            update_alpha: true,
            initial_alpha: DEFAULT_ALPHA,

            predict: false,
            log_likelihood: false,

            grid_resolution: DEFAULT_GRID_RESOLUTION,
            start_retry_cap: DEFAULT_START_RETRY_CAP,
            seed: DEFAULT_SEED,
            progress: true,
        }
    }
}

impl Config {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short chain for exploration: 1,000 iterations, 200 burn-in.
    pub fn quick() -> Self {
        Self {
            iterations: 1_000,
            burn_in: 200,
            ..Default::default()
        }
    }

    /// Long chain for final estimates: 50,000 iterations, 10,000 burn-in,
    /// every 10th draw stored.
    pub fn thorough() -> Self {
        Self {
            iterations: 50_000,
            burn_in: 10_000,
            thin: 10,
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the total number of iterations.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the burn-in length.
    pub fn burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = burn_in;
        self
    }

    /// Set the thinning interval.
    pub fn thin(mut self, thin: usize) -> Self {
        assert!(thin >= 1, "thin must be at least 1");
        self.thin = thin;
        self
    }

    /// Select the link function.
    pub fn link(mut self, link: Link) -> Self {
        self.link = link;
        self
    }

    /// Replace the prior.
    pub fn prior(mut self, prior: Prior) -> Self {
        self.prior = prior;
        self
    }

    /// Enable or disable the α update.
    pub fn update_alpha(mut self, update: bool) -> Self {
        self.update_alpha = update;
        self
    }

    /// Set the starting concentration.
    pub fn initial_alpha(mut self, alpha: f64) -> Self {
        assert!(alpha > 0.0, "initial_alpha must be positive");
        self.initial_alpha = alpha;
        self
    }

    /// Enable or disable posterior-predictive draws.
    pub fn predict(mut self, predict: bool) -> Self {
        self.predict = predict;
        self
    }

    /// Enable or disable per-draw log-likelihood storage.
    pub fn log_likelihood(mut self, enabled: bool) -> Self {
        self.log_likelihood = enabled;
        self
    }

    /// Set the grid resolution.
    pub fn grid_resolution(mut self, resolution: usize) -> Self {
        self.grid_resolution = resolution;
        self
    }

    /// Set the rejection initializer's retry cap.
    pub fn start_retry_cap(mut self, cap: usize) -> Self {
        self.start_retry_cap = cap;
        self
    }

    /// Set the seed used by [`DpSampler::run`](crate::DpSampler::run).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable progress notifications.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    // =========================================================================
    // Derived quantities
    // =========================================================================

    /// Number of draws a complete run stores.
    pub fn stored_draws(&self) -> usize {
        if self.iterations <= self.burn_in || self.thin == 0 {
            return 0;
        }
        (self.iterations - self.burn_in) / self.thin
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<()> {
        if self.iterations <= self.burn_in {
            return Err(Error::InvalidConfig(
                "iterations must exceed burn_in".to_string(),
            ));
        }
        if self.thin == 0 {
            return Err(Error::InvalidConfig("thin must be at least 1".to_string()));
        }
        if self.grid_resolution < 3 {
            return Err(Error::InvalidConfig(
                "grid_resolution must be at least 3".to_string(),
            ));
        }
        if !(self.initial_alpha > 0.0) || !self.initial_alpha.is_finite() {
            return Err(Error::InvalidConfig(
                "initial_alpha must be positive".to_string(),
            ));
        }
        self.prior.validate()
    }
}
