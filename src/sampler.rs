//! Gibbs driver for the Dirichlet-process mixture.
//!
//! Each outer iteration runs, in order:
//!
//! 1. latent update: grid draw for interior margin units, conditional Normal
//!    draw for homogeneous-area units;
//! 2. Polya-urn sweep over all units followed by the remix pass;
//! 3. concentration update, if enabled;
//! 4. storage of the current state, after burn-in and at the thinning cadence.
//!
//! The interrupt is polled before each iteration. An interrupted run returns
//! the draws stored so far.

use ecoinfer_core::integrate::log_likelihoods;
use ecoinfer_core::{ClusterParams, ClusterState, Vector2};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::Config;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::latent::LatentState;
use crate::observer::{Interrupt, Never, Observer, TracingObserver};
use crate::result::{DrawStore, Posterior, RunStatus, UnitDraw};

/// Dirichlet-process mixture sampler for 2×2 ecological inference.
///
/// # Example
///
/// ```ignore
/// use ecoinfer::{Config, Dataset, DpSampler, Margins};
///
/// let margins = Margins::from_columns(&[0.3, 0.7], &[0.4, 0.6])?;
/// let sampler = DpSampler::new(Config::quick().seed(42))?;
/// let posterior = sampler.run(&Dataset::new(margins))?;
/// println!("E[W1] = {:?}", posterior.draws.mean_w1());
/// ```
#[derive(Debug, Clone)]
pub struct DpSampler {
    config: Config,
}

impl DpSampler {
    /// Create a sampler after validating `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The run configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run with a generator seeded from [`Config::seed`], logging through
    /// `tracing`.
    pub fn run(&self, data: &Dataset) -> Result<Posterior> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        self.run_with_rng(data, &mut rng)
    }

    /// Run with a caller-owned generator.
    ///
    /// The generator is left in its post-run state, so the caller can
    /// persist it and continue the stream later.
    pub fn run_with_rng<R: Rng + ?Sized>(&self, data: &Dataset, rng: &mut R) -> Result<Posterior> {
        self.run_observed(data, rng, &mut TracingObserver, &Never)
    }

    /// Run with explicit observer and interrupt.
    pub fn run_observed<R, O, I>(
        &self,
        data: &Dataset,
        rng: &mut R,
        observer: &mut O,
        interrupt: &I,
    ) -> Result<Posterior>
    where
        R: Rng + ?Sized,
        O: Observer + ?Sized,
        I: Interrupt + ?Sized,
    {
        let config = &self.config;
        if data.margins().is_empty() {
            return Err(Error::InvalidInput("no margin units".to_string()));
        }
        let base = config.prior.base_measure()?;
        let hyper = config.prior.concentration();

        let mut latent = LatentState::initialize(
            data,
            config.link,
            config.grid_resolution,
            config.start_retry_cap,
            rng,
        )?;
        let mut clusters =
            ClusterState::from_prior(latent.len(), &base, config.initial_alpha, rng)?;

        let mut store = DrawStore::new(
            latent.margins().len(),
            latent.homogeneous_len(),
            config.stored_draws(),
            config.predict,
            config.log_likelihood,
        );
        let mut progress = Progress::new(config.iterations, config.progress);
        let mut diagnostics = 0usize;
        let mut since_stored = 0usize;
        let mut status = RunStatus::Completed;

        observer.on_start(latent.margins().len(), latent.len(), config.iterations);

        for iteration in 0..config.iterations {
            if interrupt.is_interrupted() {
                status = RunStatus::Interrupted { iteration };
                break;
            }

            latent.update(&clusters, rng);
            clusters.sweep(latent.stars(), &base, rng)?;
            clusters.remix(latent.stars(), &base, rng)?;
            if config.update_alpha {
                clusters.update_concentration(&hyper, rng)?;
            }

            if iteration >= config.burn_in {
                since_stored += 1;
                if since_stored == config.thin {
                    since_stored = 0;
                    diagnostics += self.store(&latent, &clusters, &mut store, observer, rng)?;
                }
            }

            if let Some(percent) = progress.tick(iteration) {
                observer.on_progress(percent, iteration);
            }
        }

        if status == RunStatus::Completed && config.progress {
            observer.on_progress(100, config.iterations);
        }
        observer.on_finish(&status, store.len());

        Ok(Posterior {
            draws: store.finish(),
            status,
            diagnostics,
        })
    }

    /// Append the current state to `store`; returns the number of
    /// diagnostics raised.
    fn store<R, O>(
        &self,
        latent: &LatentState,
        clusters: &ClusterState,
        store: &mut DrawStore,
        observer: &mut O,
        rng: &mut R,
    ) -> Result<usize>
    where
        R: Rng + ?Sized,
        O: Observer + ?Sized,
    {
        let link = self.config.link;
        for (i, margin) in latent.margins().iter().enumerate() {
            let params = clusters.unit_params(i);
            let predicted = if self.config.predict {
                let z = sample_mvn(params, rng)?;
                let w1 = link.inverse(z[0]);
                let w2 = link.inverse(z[1]);
                Some((w1, w2, margin.aggregate(w1, w2)))
            } else {
                None
            };
            store.push_unit(UnitDraw {
                mu: [params.mu[0], params.mu[1]],
                sigma: params.sigma_upper(),
                w: latent.w(i),
                predicted,
            });
        }
        for j in 0..latent.homogeneous_len() {
            store.push_homogeneous(latent.homogeneous_draw(j));
        }

        let mut raised = 0;
        let log_likelihood = if self.config.log_likelihood {
            let (values, diagnostics) = log_likelihoods(&latent.integrands(clusters), link);
            for d in &diagnostics {
                observer.on_diagnostic(d);
            }
            raised = diagnostics.len();
            Some(values.iter().sum::<f64>())
        } else {
            None
        };

        store.push_globals(clusters.alpha(), clusters.nstar(), log_likelihood);
        Ok(raised)
    }
}

/// Draw from N(μ, Σ) on the transformed scale.
fn sample_mvn<R: Rng + ?Sized>(params: &ClusterParams, rng: &mut R) -> Result<Vector2> {
    let chol = params.sigma.cholesky().ok_or_else(|| {
        Error::Numerical("cluster covariance is not positive definite".to_string())
    })?;
    let z = Vector2::new(StandardNormal.sample(rng), StandardNormal.sample(rng));
    Ok(params.mu + chol.l() * z)
}

/// Decile progress: fires after iterations ⌊n/10⌋, 2⌊n/10⌋, … up to 90%.
#[derive(Debug, Clone, Copy)]
struct Progress {
    step: usize,
    next: usize,
    decile: u32,
    enabled: bool,
}

impl Progress {
    fn new(iterations: usize, enabled: bool) -> Self {
        let step = iterations / 10;
        Self {
            step,
            next: step,
            decile: 1,
            enabled: enabled && step > 0,
        }
    }

    fn tick(&mut self, iteration: usize) -> Option<u32> {
        if !self.enabled || self.decile > 9 || iteration + 1 != self.next {
            return None;
        }
        let percent = self.decile * 10;
        self.decile += 1;
        self.next += self.step;
        Some(percent)
    }
}
