//! Stored posterior draws.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every iteration ran.
    Completed,
    /// The interrupt fired before `iteration` started.
    Interrupted {
        /// First iteration that did not run.
        iteration: usize,
    },
}

/// Draws stored at the thinning cadence.
///
/// Per-unit arrays are `units × draws` matrices. nalgebra stores them
/// column-major, so `as_slice()` yields all units of draw 0, then all units
/// of draw 1, and so on. Only margin units are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draws {
    /// μ₁ of each unit's cluster.
    pub mu1: DMatrix<f64>,
    /// μ₂ of each unit's cluster.
    pub mu2: DMatrix<f64>,
    /// Σ₁₁ of each unit's cluster.
    pub sigma11: DMatrix<f64>,
    /// Σ₁₂ of each unit's cluster.
    pub sigma12: DMatrix<f64>,
    /// Σ₂₂ of each unit's cluster.
    pub sigma22: DMatrix<f64>,
    /// Latent W1.
    pub w1: DMatrix<f64>,
    /// Latent W2.
    pub w2: DMatrix<f64>,
    /// Posterior-predictive W1, W2 and Y, when requested.
    pub prediction: Option<Prediction>,
    /// Drawn proportion of each homogeneous-area unit (known-W1 units first).
    pub homogeneous: DMatrix<f64>,
    /// Concentration α.
    pub alpha: Vec<f64>,
    /// Number of distinct clusters.
    pub nstar: Vec<usize>,
    /// Summed unit log-likelihood, when requested.
    pub log_likelihood: Option<Vec<f64>>,
}

/// Posterior-predictive draws for the margin units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted W1.
    pub w1: DMatrix<f64>,
    /// Predicted W2.
    pub w2: DMatrix<f64>,
    /// Predicted Y = X·W1 + (1 − X)·W2.
    pub y: DMatrix<f64>,
}

impl Draws {
    /// Number of stored draws.
    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    /// True if nothing was stored.
    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    /// Number of margin units per draw.
    pub fn units(&self) -> usize {
        self.w1.nrows()
    }

    /// Posterior mean of W1 per unit.
    pub fn mean_w1(&self) -> Vec<f64> {
        row_means(&self.w1)
    }

    /// Posterior mean of W2 per unit.
    pub fn mean_w2(&self) -> Vec<f64> {
        row_means(&self.w2)
    }
}

fn row_means(m: &DMatrix<f64>) -> Vec<f64> {
    if m.ncols() == 0 {
        return vec![f64::NAN; m.nrows()];
    }
    m.column_mean().iter().copied().collect()
}

/// Output of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    /// Stored draws.
    pub draws: Draws,
    /// Completed or interrupted.
    pub status: RunStatus,
    /// Number of non-fatal diagnostics raised.
    pub diagnostics: usize,
}

impl Posterior {
    /// True unless the run was interrupted.
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Accumulates draws column by column.
#[derive(Debug, Clone)]
pub(crate) struct DrawStore {
    units: usize,
    homogeneous_units: usize,
    mu1: Vec<f64>,
    mu2: Vec<f64>,
    sigma11: Vec<f64>,
    sigma12: Vec<f64>,
    sigma22: Vec<f64>,
    w1: Vec<f64>,
    w2: Vec<f64>,
    pred: Option<[Vec<f64>; 3]>,
    homogeneous: Vec<f64>,
    alpha: Vec<f64>,
    nstar: Vec<usize>,
    log_likelihood: Option<Vec<f64>>,
}

/// One unit's contribution to a stored draw.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnitDraw {
    pub mu: [f64; 2],
    pub sigma: [f64; 3],
    pub w: (f64, f64),
    pub predicted: Option<(f64, f64, f64)>,
}

impl DrawStore {
    pub(crate) fn new(
        units: usize,
        homogeneous_units: usize,
        capacity: usize,
        predict: bool,
        log_likelihood: bool,
    ) -> Self {
        let per_unit = || Vec::with_capacity(units * capacity);
        Self {
            units,
            homogeneous_units,
            mu1: per_unit(),
            mu2: per_unit(),
            sigma11: per_unit(),
            sigma12: per_unit(),
            sigma22: per_unit(),
            w1: per_unit(),
            w2: per_unit(),
            pred: predict.then(|| [per_unit(), per_unit(), per_unit()]),
            homogeneous: Vec::with_capacity(homogeneous_units * capacity),
            alpha: Vec::with_capacity(capacity),
            nstar: Vec::with_capacity(capacity),
            log_likelihood: log_likelihood.then(|| Vec::with_capacity(capacity)),
        }
    }

    pub(crate) fn push_unit(&mut self, d: UnitDraw) {
        self.mu1.push(d.mu[0]);
        self.mu2.push(d.mu[1]);
        self.sigma11.push(d.sigma[0]);
        self.sigma12.push(d.sigma[1]);
        self.sigma22.push(d.sigma[2]);
        self.w1.push(d.w.0);
        self.w2.push(d.w.1);
        if let (Some(pred), Some((w1, w2, y))) = (self.pred.as_mut(), d.predicted) {
            pred[0].push(w1);
            pred[1].push(w2);
            pred[2].push(y);
        }
    }

    pub(crate) fn push_homogeneous(&mut self, w: f64) {
        self.homogeneous.push(w);
    }

    pub(crate) fn push_globals(&mut self, alpha: f64, nstar: usize, log_likelihood: Option<f64>) {
        self.alpha.push(alpha);
        self.nstar.push(nstar);
        if let (Some(ll), Some(v)) = (self.log_likelihood.as_mut(), log_likelihood) {
            ll.push(v);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.alpha.len()
    }

    pub(crate) fn finish(self) -> Draws {
        let draws = self.alpha.len();
        let units = self.units;
        let matrix = |v: Vec<f64>| DMatrix::from_vec(units, draws, v);
        Draws {
            mu1: matrix(self.mu1),
            mu2: matrix(self.mu2),
            sigma11: matrix(self.sigma11),
            sigma12: matrix(self.sigma12),
            sigma22: matrix(self.sigma22),
            w1: matrix(self.w1),
            w2: matrix(self.w2),
            prediction: self.pred.map(|[w1, w2, y]| Prediction {
                w1: matrix(w1),
                w2: matrix(w2),
                y: matrix(y),
            }),
            homogeneous: DMatrix::from_vec(self.homogeneous_units, draws, self.homogeneous),
            alpha: self.alpha,
            nstar: self.nstar,
            log_likelihood: self.log_likelihood,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: f64) -> UnitDraw {
        UnitDraw {
            mu: [v, -v],
            sigma: [1.0, 0.0, 2.0],
            w: (v, 1.0 - v),
            predicted: Some((v, v, v)),
        }
    }

    #[test]
    fn test_store_is_draw_major() {
        let mut store = DrawStore::new(2, 1, 2, true, false);
        for draw in 0..2 {
            store.push_unit(unit(0.1 + draw as f64));
            store.push_unit(unit(0.2 + draw as f64));
            store.push_homogeneous(0.5);
            store.push_globals(1.0, 1, None);
        }
        let d = store.finish();
        assert_eq!(d.len(), 2);
        assert_eq!(d.units(), 2);
        assert_eq!(d.w1.as_slice(), &[0.1, 0.2, 1.1, 1.2]);
        assert_eq!(d.w1[(1, 0)], 0.2);
        let mean = d.mean_w1();
        assert!((mean[0] - 0.6).abs() < 1e-12 && (mean[1] - 0.7).abs() < 1e-12);
        assert!(d.prediction.is_some());
        assert!(d.log_likelihood.is_none());
        assert_eq!(d.homogeneous.shape(), (1, 2));
    }

    #[test]
    fn test_empty_store() {
        let d = DrawStore::new(3, 0, 0, false, true).finish();
        assert!(d.is_empty());
        assert_eq!(d.w1.shape(), (3, 0));
        assert_eq!(d.log_likelihood, Some(vec![]));
        assert!(d.mean_w1().iter().all(|m| m.is_nan()));
    }
}
