//! Dirichlet-process mixture clustering of the transformed latent pairs.
//!
//! Every unit carries its own copy of (μ, Σ); units sharing a label share
//! the same value. One outer iteration runs:
//!
//! 1. [`ClusterState::sweep`]: Polya-urn reassignment of each unit in index
//!    order. Unit i joins unit k ≠ i with weight φ₂(W*_i; μ_k, Σ_k) or opens
//!    a new table with weight α·t(W*_i; base predictive).
//! 2. [`ClusterState::remix`]: every cluster redraws (μ, Σ) from its full
//!    membership and labels are renumbered densely.
//! 3. [`ClusterState::update_concentration`]: auxiliary-variable Gibbs step
//!    for α under a Gamma(a0, b0) hyperprior.
//!
//! The sweep is sequential: unit i sees the assignments already made for
//! units before it in the same pass.

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use rand::Rng;
use rand_distr::{Beta, Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::conjugate::{niw_posterior_draw, prior_draw, ClusterSummary, ConjugateError, NiwPrior};
use crate::constants::ALPHA_MIN;
use crate::density::{mvn_ln_pdf, StudentT2};
use crate::math;
use crate::types::{ClusterParams, Vector2};

/// Gamma(a0, rate b0) hyperprior on the concentration α.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationPrior {
    /// Shape.
    pub a0: f64,
    /// Rate.
    pub b0: f64,
}

/// NIW base measure together with its single-observation predictive.
#[derive(Debug, Clone, Copy)]
pub struct BaseMeasure {
    niw: NiwPrior,
    predictive: StudentT2,
}

impl BaseMeasure {
    /// Returns `None` when the predictive Student-t is improper
    /// (ν0 ≤ 1, τ0 ≤ 0 or S0 not positive definite).
    pub fn new(niw: NiwPrior) -> Option<Self> {
        if niw.tau0.is_nan() || niw.tau0 <= 0.0 {
            return None;
        }
        let predictive = StudentT2::niw_predictive(niw.mu0, niw.tau0, niw.nu0, &niw.s0)?;
        Some(Self { niw, predictive })
    }

    /// The NIW hyperparameters.
    pub fn niw(&self) -> &NiwPrior {
        &self.niw
    }

    /// ln of the prior predictive density of one transformed pair.
    pub fn predictive_ln_pdf(&self, star: &Vector2) -> f64 {
        self.predictive.ln_pdf(star)
    }
}

/// Failure of a clustering step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusterError {
    /// A conjugate draw failed.
    Conjugate(ConjugateError),
    /// A Beta or Gamma draw received invalid parameters.
    InvalidConcentrationDraw {
        /// Current α.
        alpha: f64,
        /// Number of clusters at the time of the draw.
        nstar: usize,
    },
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::Conjugate(e) => write!(f, "conjugate update failed: {}", e),
            ClusterError::InvalidConcentrationDraw { alpha, nstar } => write!(
                f,
                "invalid concentration update (alpha {}, nstar {})",
                alpha, nstar
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ClusterError {}

impl From<ConjugateError> for ClusterError {
    fn from(e: ConjugateError) -> Self {
        ClusterError::Conjugate(e)
    }
}

/// Cluster assignments and parameters for all units of a run.
#[derive(Debug, Clone)]
pub struct ClusterState {
    params: Vec<ClusterParams>,
    labels: Vec<usize>,
    clusters: Vec<ClusterParams>,
    next_label: usize,
    alpha: f64,
    scratch: Vec<f64>,
}

impl ClusterState {
    /// Each unit starts in its own cluster with the given parameters
    /// (C_i = i, nstar = number of units).
    pub fn new(params: Vec<ClusterParams>, alpha: f64) -> Self {
        let n = params.len();
        Self {
            labels: (0..n).collect(),
            clusters: params.clone(),
            params,
            next_label: n,
            alpha: alpha.max(ALPHA_MIN),
            scratch: Vec::with_capacity(n),
        }
    }

    /// Start `n` singleton clusters with independent draws from G0.
    pub fn from_prior<R: Rng + ?Sized>(
        n: usize,
        base: &BaseMeasure,
        alpha: f64,
        rng: &mut R,
    ) -> Result<Self, ClusterError> {
        let params = (0..n)
            .map(|_| prior_draw(&base.niw, rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(params, alpha))
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True if there are no units.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Current concentration α.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of distinct clusters as of the last remix.
    pub fn nstar(&self) -> usize {
        self.clusters.len()
    }

    /// Membership labels.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Per-unit parameters.
    pub fn params(&self) -> &[ClusterParams] {
        &self.params
    }

    /// Parameters of unit `i`.
    pub fn unit_params(&self, i: usize) -> &ClusterParams {
        &self.params[i]
    }

    /// Canonical parameters indexed by label, as of the last remix.
    pub fn clusters(&self) -> &[ClusterParams] {
        &self.clusters
    }

    /// Polya-urn reassignment of every unit, in index order.
    ///
    /// Candidates are the other units in index order followed by the new
    /// table. A new table draws θ from the NIW posterior of the single point
    /// W*_i and gets a label no unit currently carries.
    pub fn sweep<R: Rng + ?Sized>(
        &mut self,
        stars: &[Vector2],
        base: &BaseMeasure,
        rng: &mut R,
    ) -> Result<(), ClusterError> {
        debug_assert_eq!(stars.len(), self.params.len());
        let n = self.params.len();
        let ln_alpha = math::ln(self.alpha);

        for i in 0..n {
            let star = &stars[i];
            self.scratch.clear();
            for (k, p) in self.params.iter().enumerate() {
                if k != i {
                    self.scratch.push(mvn_ln_pdf(star, p));
                }
            }
            self.scratch.push(ln_alpha + base.predictive_ln_pdf(star));

            let u: f64 = rng.random();
            let pick = select_from_log_weights(&mut self.scratch, u);

            if pick == n - 1 {
                let summary = ClusterSummary::single(*star);
                self.params[i] = niw_posterior_draw(&base.niw, &summary, rng)?;
                self.labels[i] = self.next_label;
                self.next_label += 1;
            } else {
                let k = if pick < i { pick } else { pick + 1 };
                self.params[i] = self.params[k];
                self.labels[i] = self.labels[k];
            }
        }
        Ok(())
    }

    /// Redraw each cluster's parameters from its members and relabel densely.
    ///
    /// Clusters are visited in increasing label order; members keep their
    /// index order within a cluster.
    pub fn remix<R: Rng + ?Sized>(
        &mut self,
        stars: &[Vector2],
        base: &BaseMeasure,
        rng: &mut R,
    ) -> Result<(), ClusterError> {
        debug_assert_eq!(stars.len(), self.params.len());
        let previous = self.labels.clone();
        let mut order: Vec<usize> = (0..previous.len()).collect();
        order.sort_by_key(|&i| previous[i]);

        self.clusters.clear();
        for group in order.chunk_by(|&a, &b| previous[a] == previous[b]) {
            let summary = ClusterSummary::from_points(group.iter().map(|&i| stars[i]));
            let theta = niw_posterior_draw(&base.niw, &summary, rng)?;
            let label = self.clusters.len();
            for &i in group {
                self.params[i] = theta;
                self.labels[i] = label;
            }
            self.clusters.push(theta);
        }
        self.next_label = self.clusters.len();
        Ok(())
    }

    /// One auxiliary-variable update of α given the current nstar.
    ///
    /// η ~ Beta(α + 1, n), r = b0 − ln η, p = (a0 + nstar − 1)/(n·r);
    /// with probability p, α ~ Gamma(a0 + nstar, r) else Gamma(a0 + nstar − 1, r).
    pub fn update_concentration<R: Rng + ?Sized>(
        &mut self,
        hyper: &ConcentrationPrior,
        rng: &mut R,
    ) -> Result<f64, ClusterError> {
        let n = self.params.len() as f64;
        let nstar = self.nstar();
        let invalid = ClusterError::InvalidConcentrationDraw {
            alpha: self.alpha,
            nstar,
        };

        let eta = Beta::new(self.alpha + 1.0, n)
            .map_err(|_| invalid)?
            .sample(rng)
            .max(f64::MIN_POSITIVE);
        let rate = hyper.b0 - math::ln(eta);
        let k = nstar as f64;
        let p = (hyper.a0 + k - 1.0) / (n * rate);

        let u: f64 = rng.random();
        let shape = if u < p { hyper.a0 + k } else { hyper.a0 + k - 1.0 };
        let gamma = Gamma::new(shape, 1.0 / rate).map_err(|_| invalid)?;
        self.alpha = gamma.sample(rng).max(ALPHA_MIN);
        Ok(self.alpha)
    }
}

/// Turn log weights into a normalized cumulative distribution in place and
/// return the first index whose cumulative weight exceeds `u`.
fn select_from_log_weights(weights: &mut [f64], u: f64) -> usize {
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for w in weights.iter_mut() {
        let e = if !max.is_finite() {
            1.0
        } else if w.is_nan() {
            0.0
        } else {
            math::exp(*w - max)
        };
        total += e;
        *w = total;
    }
    for w in weights.iter_mut() {
        *w /= total;
    }
    let j = weights.partition_point(|&c| c <= u);
    j.min(weights.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Matrix2;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn base() -> BaseMeasure {
        BaseMeasure::new(NiwPrior {
            mu0: Vector2::zeros(),
            tau0: 2.0,
            nu0: 4.0,
            s0: Matrix2::identity() * 10.0,
        })
        .unwrap()
    }

    fn stars(n: usize) -> Vec<Vector2> {
        (0..n)
            .map(|i| {
                let c = if i % 2 == 0 { -2.0 } else { 2.0 };
                Vector2::new(c + 0.01 * i as f64, -c)
            })
            .collect()
    }

    fn assert_contiguous(state: &ClusterState) {
        let nstar = state.nstar();
        assert!(nstar >= 1 && nstar <= state.len());
        let mut seen = vec![false; nstar];
        for (i, &c) in state.labels().iter().enumerate() {
            assert!(c < nstar);
            seen[c] = true;
            assert_eq!(state.params()[i], state.clusters()[c]);
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_initial_state_is_singletons() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let state = ClusterState::from_prior(5, &base(), 1.0, &mut rng).unwrap();
        assert_eq!(state.labels(), &[0, 1, 2, 3, 4]);
        assert_eq!(state.nstar(), 5);
        assert_contiguous(&state);
    }

    #[test]
    fn test_remix_makes_labels_contiguous() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let b = base();
        let w = stars(12);
        let mut state = ClusterState::from_prior(12, &b, 1.0, &mut rng).unwrap();
        for _ in 0..50 {
            state.sweep(&w, &b, &mut rng).unwrap();
            state.remix(&w, &b, &mut rng).unwrap();
            assert_contiguous(&state);
        }
    }

    #[test]
    fn test_huge_alpha_opens_new_tables() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let b = base();
        let w = stars(4);
        let mut state = ClusterState::from_prior(4, &b, 1e300, &mut rng).unwrap();
        state.sweep(&w, &b, &mut rng).unwrap();
        assert_eq!(state.labels(), &[4, 5, 6, 7]);
        state.remix(&w, &b, &mut rng).unwrap();
        assert_eq!(state.labels(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_tiny_alpha_pair_merges() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let b = base();
        let w = stars(2);
        let mut state = ClusterState::from_prior(2, &b, ALPHA_MIN, &mut rng).unwrap();
        state.sweep(&w, &b, &mut rng).unwrap();
        assert_eq!(state.labels()[0], state.labels()[1]);
        state.remix(&w, &b, &mut rng).unwrap();
        assert_eq!(state.nstar(), 1);
        assert_contiguous(&state);
    }

    #[test]
    fn test_sweep_is_deterministic_under_seed() {
        let b = base();
        let w = stars(10);
        let run = |seed| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let mut state = ClusterState::from_prior(10, &b, 1.0, &mut rng).unwrap();
            for _ in 0..5 {
                state.sweep(&w, &b, &mut rng).unwrap();
                state.remix(&w, &b, &mut rng).unwrap();
            }
            (state.labels().to_vec(), state.params()[0])
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_concentration_stays_positive() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let b = base();
        let hyper = ConcentrationPrior { a0: 1.0, b0: 0.1 };
        for n in [1usize, 2, 30] {
            let mut state = ClusterState::from_prior(n, &b, 1.0, &mut rng).unwrap();
            for _ in 0..500 {
                let a = state.update_concentration(&hyper, &mut rng).unwrap();
                assert!(a > 0.0 && a.is_finite());
            }
        }
    }

    #[test]
    fn test_select_from_log_weights() {
        // A zero-weight candidate is never chosen, even for u = 0.
        let mut w = [0.0f64.ln(), 1.0f64.ln(), 1.0f64.ln()];
        assert_eq!(select_from_log_weights(&mut w, 0.0), 1);
        assert_eq!(w[2], 1.0);
        let mut w = [0.0f64.ln(), 1.0f64.ln(), 1.0f64.ln()];
        assert_eq!(select_from_log_weights(&mut w, 0.5), 2);
        let mut w = [0.0f64.ln(), 1.0f64.ln(), 1.0f64.ln()];
        assert_eq!(select_from_log_weights(&mut w, 0.4), 1);
        let mut w = [0.0f64.ln(), 1.0f64.ln(), 1.0f64.ln()];
        assert_eq!(select_from_log_weights(&mut w, 0.9), 2);
    }

    #[test]
    fn test_base_measure_rejects_improper_predictive() {
        let mut niw = *base().niw();
        niw.nu0 = 1.0;
        assert!(BaseMeasure::new(niw).is_none());
        niw.nu0 = 4.0;
        niw.tau0 = 0.0;
        assert!(BaseMeasure::new(niw).is_none());
    }
}
