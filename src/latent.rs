//! Latent proportions of every unit taking part in the clustering.
//!
//! Units are laid out in one index space: margin units, then known-W1
//! homogeneous units, then known-W2 homogeneous units, then survey units.
//! `stars` holds the transformed pair of each unit and is what the
//! clustering engine sees.

use ecoinfer_core::bounds::{clamp_proportion, initial_w1, UnitKind};
use ecoinfer_core::grid::{draw_conditional, KnownCoordinate, TomographyGrid};
use ecoinfer_core::integrate::UnitIntegrand;
use ecoinfer_core::{ClusterState, Link, Margin, Vector2};
use rand::Rng;

use crate::data::Dataset;
use crate::error::{Error, Result};

/// How a margin unit's pair is refreshed each iteration.
#[derive(Debug, Clone)]
enum MarginUpdate {
    /// Interior unit: drawn on its tomography grid.
    Grid(TomographyGrid),
    /// Degenerate margins pin the pair.
    Fixed,
}

#[derive(Debug, Clone)]
pub(crate) struct LatentState {
    link: Link,
    margins: Vec<Margin>,
    kinds: Vec<UnitKind>,
    updates: Vec<MarginUpdate>,
    homogeneous: Vec<KnownCoordinate>,
    w: Vec<(f64, f64)>,
    stars: Vec<Vector2>,
}

impl LatentState {
    /// Starting values for every unit.
    ///
    /// Interior units draw W1 by rejection; units whose feasible interval is
    /// too short for a grid start at the first third-point instead. An
    /// interior unit with no usable grid point is pinned like a degenerate
    /// one.
    /// Homogeneous units start their unknown coordinate at W* = 0.
    pub(crate) fn initialize<R: Rng + ?Sized>(
        data: &Dataset,
        link: Link,
        resolution: usize,
        retry_cap: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let margins = data.margins().as_slice().to_vec();
        let total = data.effective_len();
        let mut kinds = Vec::with_capacity(margins.len());
        let mut updates = Vec::with_capacity(margins.len());
        let mut w = Vec::with_capacity(total);

        for (i, margin) in margins.iter().enumerate() {
            let (kind, update, pair) = match UnitKind::classify(margin) {
                UnitKind::Interior(bounds) => {
                    match TomographyGrid::build(margin, &bounds, resolution, link) {
                        Some(grid) => {
                            let w1 = if bounds.is_degenerate(resolution) {
                                grid.point(0).0
                            } else {
                                initial_w1(margin, &bounds, rng, retry_cap)
                                    .map_err(|e| Error::infeasible_start(i, e))?
                            };
                            let pair = (w1, margin.w2_from_w1(w1));
                            (UnitKind::Interior(bounds), MarginUpdate::Grid(grid), pair)
                        }
                        None => {
                            let (w1, w2) = bounds.clamped_midpoint(margin);
                            (UnitKind::Fixed { w1, w2 }, MarginUpdate::Fixed, (w1, w2))
                        }
                    }
                }
                kind @ UnitKind::Fixed { w1, w2 } => (kind, MarginUpdate::Fixed, (w1, w2)),
            };
            kinds.push(kind);
            updates.push(update);
            w.push(pair);
        }

        let unknown_start = link.inverse(0.0);
        let mut homogeneous = Vec::new();
        for block in [data.known_w1(), data.known_w2()] {
            for &v in block.values() {
                homogeneous.push(block.known());
                w.push(match block.known() {
                    KnownCoordinate::W1 => (v, unknown_start),
                    KnownCoordinate::W2 => (unknown_start, v),
                });
            }
        }
        w.extend_from_slice(data.survey().pairs());

        let stars = w
            .iter()
            .map(|&(w1, w2)| Vector2::new(link.forward(w1), link.forward(w2)))
            .collect();

        Ok(Self {
            link,
            margins,
            kinds,
            updates,
            homogeneous,
            w,
            stars,
        })
    }

    /// Redraw every unobserved proportion given the current cluster parameters.
    pub(crate) fn update<R: Rng + ?Sized>(&mut self, clusters: &ClusterState, rng: &mut R) {
        let link = self.link;
        for (i, update) in self.updates.iter_mut().enumerate() {
            if let MarginUpdate::Grid(grid) = update {
                let (w1, w2) = grid.draw(clusters.unit_params(i), link, rng);
                self.w[i] = (w1, w2);
                self.stars[i] = Vector2::new(link.forward(w1), link.forward(w2));
            }
        }

        let offset = self.margins.len();
        for (j, &known) in self.homogeneous.iter().enumerate() {
            let idx = offset + j;
            let params = clusters.unit_params(idx);
            let star = &mut self.stars[idx];
            let w = &mut self.w[idx];
            match known {
                KnownCoordinate::W1 => {
                    star[1] = draw_conditional(star[0], known, params, rng);
                    w.1 = clamp_proportion(link.inverse(star[1]));
                }
                KnownCoordinate::W2 => {
                    star[0] = draw_conditional(star[1], known, params, rng);
                    w.0 = clamp_proportion(link.inverse(star[0]));
                }
            }
        }
    }

    /// Transformed pairs of all units.
    pub(crate) fn stars(&self) -> &[Vector2] {
        &self.stars
    }

    /// Current (W1, W2) of unit `i`.
    pub(crate) fn w(&self, i: usize) -> (f64, f64) {
        self.w[i]
    }

    /// Margin units.
    pub(crate) fn margins(&self) -> &[Margin] {
        &self.margins
    }

    /// Number of units in the clustering.
    pub(crate) fn len(&self) -> usize {
        self.w.len()
    }

    /// Whether margin unit `i` is redrawn on a grid.
    pub(crate) fn is_grid_sampled(&self, i: usize) -> bool {
        matches!(self.updates[i], MarginUpdate::Grid(_))
    }

    /// Number of homogeneous-area units.
    pub(crate) fn homogeneous_len(&self) -> usize {
        self.homogeneous.len()
    }

    /// The drawn (unknown) proportion of homogeneous unit `j`.
    pub(crate) fn homogeneous_draw(&self, j: usize) -> f64 {
        let (w1, w2) = self.w[self.margins.len() + j];
        match self.homogeneous[j] {
            KnownCoordinate::W1 => w2,
            KnownCoordinate::W2 => w1,
        }
    }

    /// Integrands of the interior margin units under their current parameters.
    pub(crate) fn integrands<'a>(&self, clusters: &'a ClusterState) -> Vec<UnitIntegrand<'a>> {
        self.kinds
            .iter()
            .enumerate()
            .filter_map(|(i, kind)| {
                kind.bounds().map(|bounds| UnitIntegrand {
                    margin: self.margins[i],
                    bounds: *bounds,
                    params: clusters.unit_params(i),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Margins, Survey};
    use ecoinfer_core::constants::W_SENTINEL;
    use ecoinfer_core::dp::BaseMeasure;
    use ecoinfer_core::{Matrix2, NiwPrior};
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

    fn dataset() -> Dataset {
        let margins =
            Margins::from_columns(&[0.3, 0.0, 0.7, 0.999], &[0.4, 0.5, 0.6, 0.9995]).unwrap();
        Dataset::new(margins)
            .with_known_w1(vec![0.25])
            .unwrap()
            .with_known_w2(vec![0.75])
            .unwrap()
            .with_survey(Survey::new(vec![(0.2, 0.8)]).unwrap())
    }

    fn init(
        data: &Dataset,
        link: Link,
        retry_cap: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Result<LatentState> {
        LatentState::initialize(data, link, 1000, retry_cap, rng)
    }

    #[test]
    fn test_initial_values() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let state = init(&dataset(), Link::Logit, 100_000, &mut rng).unwrap();
        assert_eq!(state.len(), 7);
        assert!(state.is_grid_sampled(0));
        assert!(!state.is_grid_sampled(1));
        assert_eq!(state.w(1), (W_SENTINEL, 0.5));

        // Degenerate interval starts at the first third-point.
        let m = state.margins()[3];
        let (w1, w2) = state.w(3);
        assert!((m.aggregate(w1, w2) - m.y).abs() < 1e-9);

        assert_eq!(state.w(4), (0.25, 0.5));
        assert_eq!(state.stars()[4][1], 0.0);
        assert_eq!(state.w(5), (0.5, 0.75));
        assert_eq!(state.w(6), (0.2, 0.8));
    }

    #[test]
    fn test_update_keeps_identity_and_known_coordinates() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        let data = dataset();
        let mut state = init(&data, Link::Logit, 100_000, &mut rng).unwrap();
        let clusters = ClusterState::from_prior(state.len(), &base(), 1.0, &mut rng).unwrap();
        let known = state.stars()[4][0];
        for _ in 0..20 {
            state.update(&clusters, &mut rng);
            for (i, m) in state.margins().iter().enumerate() {
                let (w1, w2) = state.w(i);
                assert!(w1 > 0.0 && w1 < 1.0 && w2 > 0.0 && w2 < 1.0);
                if state.is_grid_sampled(i) {
                    assert!((m.aggregate(w1, w2) - m.y).abs() < 1e-6);
                }
            }
            assert_eq!(state.w(1), (W_SENTINEL, 0.5));
            assert_eq!(state.stars()[4][0], known);
            assert_eq!(state.w(6), (0.2, 0.8));
            let drawn = state.homogeneous_draw(0);
            assert!(drawn > 0.0 && drawn < 1.0);
        }
    }

    #[test]
    fn test_integrands_skip_fixed_units() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let state = init(&dataset(), Link::Logit, 100_000, &mut rng).unwrap();
        let clusters = ClusterState::from_prior(state.len(), &base(), 1.0, &mut rng).unwrap();
        assert_eq!(state.integrands(&clusters).len(), 3);
    }

    #[test]
    fn test_retry_cap_is_fatal() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let err = init(&dataset(), Link::Logit, 0, &mut rng).unwrap_err();
        assert_eq!(err, Error::InfeasibleStart { unit: 0, attempts: 0 });
    }

    #[test]
    fn test_collapsed_segment_is_pinned_inside_unit_square() {
        let margins = Margins::from_columns(&[1.0 - f64::EPSILON / 2.0, 0.4], &[0.5, 0.3]).unwrap();
        let data = Dataset::new(margins);
        for link in [Link::Logit, Link::Probit, Link::CLogLog] {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
            let mut state = init(&data, link, 100_000, &mut rng).unwrap();
            assert!(!state.is_grid_sampled(0));
            assert!(state.is_grid_sampled(1));
            let pinned = state.w(0);
            assert_eq!(pinned.1, W_SENTINEL);

            let clusters = ClusterState::from_prior(state.len(), &base(), 1.0, &mut rng).unwrap();
            state.update(&clusters, &mut rng);
            assert_eq!(state.w(0), pinned);
            assert!(state.stars().iter().all(|s| s[0].is_finite() && s[1].is_finite()));
            assert_eq!(state.integrands(&clusters).len(), 1);
        }
    }
}
