//! Feasible intervals of the latent pair implied by one unit's margins.
//!
//! For X ∈ (0, 1) the identity Y = X·W1 + (1 − X)·W2 confines W1 to
//! `[max(0, (X + Y − 1)/X), min(1, Y/X)]`; W2 moves in the opposite
//! direction along the same segment (the tomography line).

use core::fmt;

use rand::Rng;

use crate::constants::W_SENTINEL;
use crate::types::Margin;

/// Clamp a proportion into `[W_SENTINEL, 1 − W_SENTINEL]`.
#[inline]
pub fn clamp_proportion(w: f64) -> f64 {
    w.clamp(W_SENTINEL, 1.0 - W_SENTINEL)
}

/// Feasible rectangle corners of a unit's tomography line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitBounds {
    /// Lower bound of W1 (where W2 is at its upper bound).
    pub w1_lower: f64,
    /// Upper bound of W1 (where W2 is at its lower bound).
    pub w1_upper: f64,
    /// Lower bound of W2.
    pub w2_lower: f64,
    /// Upper bound of W2.
    pub w2_upper: f64,
}

impl UnitBounds {
    /// Derive the bounds for a unit with X ∈ (0, 1).
    pub fn from_margin(margin: &Margin) -> Self {
        let Margin { x, y } = *margin;
        let w1_lower = ((x + y - 1.0) / x).max(0.0);
        let w1_upper = (y / x).min(1.0);
        let w2_lower = ((y - x) / (1.0 - x)).max(0.0);
        let w2_upper = (y / (1.0 - x)).min(1.0);
        Self {
            w1_lower,
            w1_upper,
            w2_lower,
            w2_upper,
        }
    }

    /// Length of the feasible W1 interval.
    #[inline]
    pub fn width(&self) -> f64 {
        self.w1_upper - self.w1_lower
    }

    /// Whether the interval is too short for a grid at `resolution` points per unit length.
    #[inline]
    pub fn is_degenerate(&self, resolution: usize) -> bool {
        self.width() <= 2.0 / resolution as f64
    }

    /// W1 along the line parametrized by t ∈ [0, 1] (increasing).
    #[inline]
    pub fn w1_at(&self, t: f64) -> f64 {
        self.w1_lower + self.w1_slope() * t
    }

    /// W2 along the line parametrized by t ∈ [0, 1] (decreasing).
    #[inline]
    pub fn w2_at(&self, t: f64) -> f64 {
        self.w2_upper + self.w2_slope() * t
    }

    /// dW1/dt.
    #[inline]
    pub fn w1_slope(&self) -> f64 {
        self.w1_upper - self.w1_lower
    }

    /// dW2/dt.
    #[inline]
    pub fn w2_slope(&self) -> f64 {
        self.w2_lower - self.w2_upper
    }

    /// Midpoint of the segment, clamped into the open unit square.
    ///
    /// Pins a unit whose segment has no usable grid point.
    pub fn clamped_midpoint(&self, margin: &Margin) -> (f64, f64) {
        let w1 = self.w1_at(0.5);
        (clamp_proportion(w1), clamp_proportion(margin.w2_from_w1(w1)))
    }

    /// Whether `w1` lies inside the feasible interval.
    #[inline]
    pub fn contains_w1(&self, w1: f64) -> bool {
        w1 >= self.w1_lower && w1 <= self.w1_upper
    }
}

/// How a unit's latent pair is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitKind {
    /// Both margins interior: the pair is sampled on the tomography line.
    Interior(UnitBounds),
    /// The margins pin the pair; no sampling.
    Fixed {
        /// Pinned W1.
        w1: f64,
        /// Pinned W2.
        w2: f64,
    },
}

impl UnitKind {
    /// Classify a unit from its margins.
    ///
    /// X = 0 leaves W1 unidentified: it is pinned to the lower sentinel and
    /// W2 = Y. X = 1 mirrors this. Y ∈ {0, 1} forces both proportions to
    /// the matching sentinel.
    pub fn classify(margin: &Margin) -> Self {
        let Margin { x, y } = *margin;
        if x <= 0.0 {
            UnitKind::Fixed {
                w1: W_SENTINEL,
                w2: clamp_proportion(y),
            }
        } else if x >= 1.0 {
            UnitKind::Fixed {
                w1: clamp_proportion(y),
                w2: W_SENTINEL,
            }
        } else if y <= 0.0 {
            UnitKind::Fixed {
                w1: W_SENTINEL,
                w2: W_SENTINEL,
            }
        } else if y >= 1.0 {
            UnitKind::Fixed {
                w1: 1.0 - W_SENTINEL,
                w2: 1.0 - W_SENTINEL,
            }
        } else {
            UnitKind::Interior(UnitBounds::from_margin(margin))
        }
    }

    /// Bounds of an interior unit.
    pub fn bounds(&self) -> Option<&UnitBounds> {
        match self {
            UnitKind::Interior(b) => Some(b),
            UnitKind::Fixed { .. } => None,
        }
    }
}

/// The rejection initializer exhausted its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartError {
    /// Number of proposals drawn.
    pub attempts: usize,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gibbs sampler cannot start: no feasible latent pair after {} proposals, bounds are too tight",
            self.attempts
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StartError {}

/// Draw a starting W1 uniformly on (0, 1) until it lands on the feasible segment.
///
/// A proposal is accepted when W1 is inside the bounds and the implied W2 is
/// strictly inside (0, 1). Gives up after `cap` proposals.
pub fn initial_w1<R: Rng + ?Sized>(
    margin: &Margin,
    bounds: &UnitBounds,
    rng: &mut R,
    cap: usize,
) -> Result<f64, StartError> {
    for _ in 0..cap {
        let w1: f64 = rng.random();
        if w1 <= 0.0 || !bounds.contains_w1(w1) {
            continue;
        }
        let w2 = margin.w2_from_w1(w1);
        if w2 > 0.0 && w2 < 1.0 {
            return Ok(w1);
        }
    }
    Err(StartError { attempts: cap })
}
