//! Tomography-line grid sampler.
//!
//! A unit's feasible W1 interval is discretized once into evenly spaced
//! points; every sweep re-weights those points by the density of the
//! transformed pair under the unit's current (μ, Σ), including the link
//! Jacobian, and draws one point by inverse CDF.

extern crate alloc;

use alloc::vec::Vec;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::bounds::UnitBounds;
use crate::density::mvn_ln_pdf;
use crate::link::Link;
use crate::math;
use crate::types::{ClusterParams, Margin, Vector2};

/// Cached grid of feasible points for one unit plus its weight buffer.
#[derive(Debug, Clone)]
pub struct TomographyGrid {
    w1: Vec<f64>,
    w2: Vec<f64>,
    cumulative: Vec<f64>,
}

impl TomographyGrid {
    /// Discretize the unit's feasible segment.
    ///
    /// Points are `1 / resolution` apart. The leftover length that does not
    /// fill a whole step is split so that no point sits on a bound. Intervals
    /// no longer than two steps get two probes at one and two thirds.
    ///
    /// Only points with both proportions strictly inside (0, 1) and a finite
    /// image under `link` are kept. Returns `None` when no point survives,
    /// which happens when rounding collapses the segment onto an edge of the
    /// unit square.
    pub fn build(
        margin: &Margin,
        bounds: &UnitBounds,
        resolution: usize,
        link: Link,
    ) -> Option<Self> {
        let lower = bounds.w1_lower;
        let upper = bounds.w1_upper;
        let width = bounds.width();
        let step = 1.0 / resolution as f64;

        let w1: Vec<f64> = if width > 2.0 * step {
            let n = math::floor(width * resolution as f64) as usize;
            let resid = width - n as f64 * step;
            (0..n)
                .map(|j| {
                    let mut w = lower + (j + 1) as f64 * step - (step + resid) / 2.0;
                    if w - lower < resid / 2.0 {
                        w += resid / 2.0;
                    }
                    if upper - w < resid / 2.0 {
                        w -= resid / 2.0;
                    }
                    w
                })
                .collect()
        } else {
            alloc::vec![lower + width / 3.0, lower + 2.0 * width / 3.0]
        };
        let (w1, w2): (Vec<f64>, Vec<f64>) = w1
            .into_iter()
            .map(|w| (w, margin.w2_from_w1(w)))
            .filter(|&(a, b)| is_feasible(a, link) && is_feasible(b, link))
            .unzip();
        if w1.is_empty() {
            return None;
        }
        let cumulative = alloc::vec![0.0; w1.len()];

        Some(Self { w1, w2, cumulative })
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.w1.len()
    }

    /// True if the grid has no points.
    pub fn is_empty(&self) -> bool {
        self.w1.is_empty()
    }

    /// Grid point `j` as (W1, W2).
    pub fn point(&self, j: usize) -> (f64, f64) {
        (self.w1[j], self.w2[j])
    }

    /// Normalized cumulative weights from the last call to [`update_weights`].
    ///
    /// [`update_weights`]: TomographyGrid::update_weights
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Recompute the cumulative distribution over grid points.
    ///
    /// The weight of a point is N(W*; μ, Σ)·|dW1*/dW1|·|dW2*/dW2|. Points whose
    /// weight is not finite contribute zero. Weights are exponentiated relative
    /// to their maximum so a far-away component does not underflow the whole
    /// grid. If no weight is finite (non-finite `params`) every point gets the
    /// same mass; all points are feasible by construction.
    pub fn update_weights(&mut self, params: &ClusterParams, link: Link) {
        let mut max = f64::NEG_INFINITY;
        for j in 0..self.w1.len() {
            let (w1, w2) = (self.w1[j], self.w2[j]);
            let star = Vector2::new(link.forward(w1), link.forward(w2));
            let lw = mvn_ln_pdf(&star, params) + link.log_jacobian(w1) + link.log_jacobian(w2);
            let lw = if lw.is_nan() || lw == f64::INFINITY {
                f64::NEG_INFINITY
            } else {
                lw
            };
            self.cumulative[j] = lw;
            max = max.max(lw);
        }

        let mut total = 0.0;
        for c in self.cumulative.iter_mut() {
            if max.is_finite() {
                total += math::exp(*c - max);
            } else {
                total += 1.0;
            }
            *c = total;
        }
        for c in self.cumulative.iter_mut() {
            *c /= total;
        }
        if let Some(last) = self.cumulative.last_mut() {
            *last = 1.0;
        }
    }

    /// First index whose cumulative weight exceeds `u`.
    ///
    /// Zero-weight points repeat the previous cumulative value and are never
    /// selected while some point has positive weight.
    pub fn select(&self, u: f64) -> usize {
        let j = self.cumulative.partition_point(|&c| c <= u);
        j.min(self.cumulative.len().saturating_sub(1))
    }

    /// Re-weight under `params` and draw one feasible point (W1, W2).
    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        params: &ClusterParams,
        link: Link,
        rng: &mut R,
    ) -> (f64, f64) {
        self.update_weights(params, link);
        let u: f64 = rng.random();
        self.point(self.select(u))
    }
}

/// A grid coordinate strictly inside (0, 1) with a finite link image.
#[inline]
fn is_feasible(w: f64, link: Link) -> bool {
    w > 0.0 && w < 1.0 && link.forward(w).is_finite()
}

/// Which coordinate of a homogeneous-area unit is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownCoordinate {
    /// W1 known (X = 1 areas), W2 drawn.
    W1,
    /// W2 known (X = 0 areas), W1 drawn.
    W2,
}

impl KnownCoordinate {
    #[inline]
    fn indices(self) -> (usize, usize) {
        match self {
            KnownCoordinate::W1 => (0, 1),
            KnownCoordinate::W2 => (1, 0),
        }
    }
}

/// Draw the unknown transformed coordinate from its Normal conditional.
///
/// With known index k and unknown u:
/// `W*_u | W*_k ~ N(μ_u + Σ_uk/Σ_kk (W*_k − μ_k), Σ_uu (1 − ρ²))`.
pub fn draw_conditional<R: Rng + ?Sized>(
    star_known: f64,
    known: KnownCoordinate,
    params: &ClusterParams,
    rng: &mut R,
) -> f64 {
    let (k, u) = known.indices();
    let s = &params.sigma;
    let mean = params.mu[u] + s[(u, k)] / s[(k, k)] * (star_known - params.mu[k]);
    let rho = params.correlation();
    let var = s[(u, u)] * (1.0 - rho * rho);
    let z: f64 = StandardNormal.sample(rng);
    mean + math::sqrt(var.max(0.0)) * z
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Matrix2;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn standard_params() -> ClusterParams {
        ClusterParams::from_covariance(Vector2::zeros(), Matrix2::identity()).unwrap()
    }

    #[test]
    fn test_grid_points_on_line_and_inside() {
        for &(x, y) in &[(0.3, 0.4), (0.7, 0.6), (0.55, 0.02), (0.1, 0.95)] {
            let m = Margin::new(x, y);
            let b = UnitBounds::from_margin(&m);
            let g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
            assert!(!g.is_empty());
            for j in 0..g.len() {
                let (w1, w2) = g.point(j);
                assert!(w1 > 0.0 && w1 < 1.0, "w1={w1}");
                assert!(w2 > 0.0 && w2 < 1.0, "w2={w2}");
                assert!(w1 > b.w1_lower && w1 < b.w1_upper);
                assert!((m.aggregate(w1, w2) - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_grid_size_follows_width() {
        let m = Margin::new(0.3, 0.4);
        let b = UnitBounds::from_margin(&m);
        let g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
        assert_eq!(g.len(), 1000);

        let m = Margin::new(0.7, 0.6);
        let b = UnitBounds::from_margin(&m);
        let g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
        assert_eq!(g.len(), (b.width() * 1000.0).floor() as usize);
    }

    #[test]
    fn test_collapsed_segment_has_no_grid() {
        // X one ulp below 1: the W1 interval rounds to a point and the
        // implied W2 is exactly 0 at both third-points.
        let m = Margin::new(1.0 - f64::EPSILON / 2.0, 0.5);
        let b = UnitBounds::from_margin(&m);
        assert_eq!(b.width(), 0.0);
        for link in [Link::Logit, Link::Probit, Link::CLogLog] {
            assert!(TomographyGrid::build(&m, &b, 1000, link).is_none(), "{link}");
        }
    }

    #[test]
    fn test_subnormal_outcome_keeps_finite_points() {
        let m = Margin::new(0.4, 5e-324);
        let b = UnitBounds::from_margin(&m);
        for link in [Link::Logit, Link::Probit, Link::CLogLog] {
            let Some(mut g) = TomographyGrid::build(&m, &b, 1000, link) else {
                continue;
            };
            g.update_weights(&standard_params(), link);
            for j in 0..g.len() {
                let (w1, w2) = g.point(j);
                assert!(w1 > 0.0 && w1 < 1.0 && w2 > 0.0 && w2 < 1.0);
                assert!(link.forward(w1).is_finite() && link.forward(w2).is_finite());
            }
            assert_eq!(g.cumulative()[g.len() - 1], 1.0);
        }
    }

    #[test]
    fn test_degenerate_interval_uses_third_points() {
        let m = Margin::new(0.999, 0.9995);
        let b = UnitBounds::from_margin(&m);
        let g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
        assert_eq!(g.len(), 2);
        let (a, _) = g.point(0);
        let (c, _) = g.point(1);
        assert!((a - (b.w1_lower + b.width() / 3.0)).abs() < 1e-15);
        assert!((c - (b.w1_lower + 2.0 * b.width() / 3.0)).abs() < 1e-15);
    }

    #[test]
    fn test_cumulative_weights_normalized() {
        for link in [Link::Logit, Link::Probit, Link::CLogLog] {
            let m = Margin::new(0.3, 0.4);
            let b = UnitBounds::from_margin(&m);
            let mut g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
            g.update_weights(&standard_params(), link);
            let cum = g.cumulative();
            for pair in cum.windows(2) {
                assert!(pair[1] >= pair[0]);
            }
            assert!((cum[cum.len() - 1] - 1.0).abs() < 1e-9);
            assert!(cum[0] >= 0.0);
        }
    }

    #[test]
    fn test_far_component_does_not_underflow() {
        let m = Margin::new(0.3, 0.4);
        let b = UnitBounds::from_margin(&m);
        let mut g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
        let sigma = Matrix2::identity() * 1e-4;
        let far = ClusterParams::from_covariance(Vector2::new(40.0, -40.0), sigma).unwrap();
        g.update_weights(&far, Link::Logit);
        let cum = g.cumulative();
        assert!(cum.iter().all(|c| c.is_finite()));
        assert_eq!(cum[cum.len() - 1], 1.0);
    }

    #[test]
    fn test_select_is_first_exceeding_index() {
        let m = Margin::new(0.999, 0.9995);
        let b = UnitBounds::from_margin(&m);
        let mut g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
        g.cumulative = vec![0.25, 1.0];
        assert_eq!(g.select(0.0), 0);
        assert_eq!(g.select(0.2499999), 0);
        assert_eq!(g.select(0.25), 1);
        assert_eq!(g.select(0.999), 1);

        // A leading zero-weight point is skipped even for u = 0.
        g.cumulative = vec![0.0, 1.0];
        assert_eq!(g.select(0.0), 1);
    }

    #[test]
    fn test_draw_concentrates_near_component_mean() {
        // Component centred at logit(0.8) for W1; the line for (0.5, 0.5)
        // ties W2 = 1 − W1, so W2* sits at logit(0.2).
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let m = Margin::new(0.5, 0.5);
        let b = UnitBounds::from_margin(&m);
        let mut g = TomographyGrid::build(&m, &b, 1000, Link::Logit).unwrap();
        let mu = Vector2::new(Link::Logit.forward(0.8), Link::Logit.forward(0.2));
        let p = ClusterParams::from_covariance(mu, Matrix2::identity() * 0.01).unwrap();
        let n = 400;
        let mean: f64 = (0..n).map(|_| g.draw(&p, Link::Logit, &mut rng).0).sum::<f64>() / n as f64;
        assert!((mean - 0.8).abs() < 0.03, "mean={mean}");
    }

    #[test]
    fn test_conditional_draw_moments() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let sigma = Matrix2::new(1.0, 0.8, 0.8, 1.0);
        let p = ClusterParams::from_covariance(Vector2::new(0.5, -0.5), sigma).unwrap();
        let n = 20_000;
        let draws: Vec<f64> = (0..n)
            .map(|_| draw_conditional(1.5, KnownCoordinate::W1, &p, &mut rng))
            .collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / (n - 1) as f64;
        // mean = −0.5 + 0.8·(1.5 − 0.5) = 0.3, var = 1 − 0.64 = 0.36
        assert!((mean - 0.3).abs() < 0.02, "mean={mean}");
        assert!((var - 0.36).abs() < 0.02, "var={var}");
    }

    #[test]
    fn test_conditional_draw_known_w2() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let sigma = Matrix2::new(4.0, 0.0, 0.0, 1.0);
        let p = ClusterParams::from_covariance(Vector2::new(2.0, 0.0), sigma).unwrap();
        let n = 20_000;
        let mean = (0..n)
            .map(|_| draw_conditional(-3.0, KnownCoordinate::W2, &p, &mut rng))
            .sum::<f64>()
            / n as f64;
        assert!((mean - 2.0).abs() < 0.05, "mean={mean}");
    }
}
