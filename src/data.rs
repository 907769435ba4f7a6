//! Typed input data for a run.
//!
//! The sampler consumes three kinds of units, in this order:
//!
//! - margin units: observed (X, Y), latent pair on the tomography line;
//! - homogeneous-area units: one proportion known exactly (X = 1 areas know
//!   W1, X = 0 areas know W2), the other drawn from its conditional;
//! - survey units: both proportions known.
//!
//! All of them join the Dirichlet-process clustering; only margin units
//! appear in the stored draws.

use ecoinfer_core::bounds::clamp_proportion;
use ecoinfer_core::grid::KnownCoordinate;
use ecoinfer_core::Margin;

use crate::error::{Error, Result};

fn check_proportion(what: &str, index: usize, v: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(Error::InvalidInput(format!(
            "{what}[{index}] = {v} is not a proportion in [0, 1]"
        )));
    }
    Ok(())
}

fn split_columns<'a>(what: &str, flat: &'a [f64], columns: usize) -> Result<Vec<&'a [f64]>> {
    if flat.len() % columns != 0 {
        return Err(Error::InvalidInput(format!(
            "{what}: flat length {} is not a multiple of {columns}",
            flat.len()
        )));
    }
    Ok(flat.chunks(flat.len() / columns.max(1)).collect())
}

/// Observed margins of the units being estimated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Margins {
    units: Vec<Margin>,
}

impl Margins {
    /// Validate and wrap margin pairs.
    pub fn new(units: Vec<Margin>) -> Result<Self> {
        for (i, m) in units.iter().enumerate() {
            check_proportion("x", i, m.x)?;
            check_proportion("y", i, m.y)?;
        }
        Ok(Self { units })
    }

    /// Build from separate X and Y columns.
    pub fn from_columns(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "x has {} entries but y has {}",
                x.len(),
                y.len()
            )));
        }
        Self::new(x.iter().zip(y).map(|(&x, &y)| Margin::new(x, y)).collect())
    }

    /// Build from a column-major n×2 array: all X values, then all Y values.
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        if flat.is_empty() {
            return Self::new(Vec::new());
        }
        let cols = split_columns("margins", flat, 2)?;
        Self::from_columns(cols[0], cols[1])
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True if there are no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The margin pairs.
    pub fn as_slice(&self) -> &[Margin] {
        &self.units
    }
}

/// Survey units whose latent pair (W1, W2) is observed directly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Survey {
    pairs: Vec<(f64, f64)>,
}

impl Survey {
    /// Validate and wrap observed pairs. Values are clamped away from {0, 1}.
    pub fn new(pairs: Vec<(f64, f64)>) -> Result<Self> {
        for (i, &(w1, w2)) in pairs.iter().enumerate() {
            check_proportion("survey w1", i, w1)?;
            check_proportion("survey w2", i, w2)?;
        }
        let pairs = pairs
            .into_iter()
            .map(|(w1, w2)| (clamp_proportion(w1), clamp_proportion(w2)))
            .collect();
        Ok(Self { pairs })
    }

    /// Build from a column-major s×2 array: all W1 values, then all W2 values.
    pub fn from_flat(flat: &[f64]) -> Result<Self> {
        if flat.is_empty() {
            return Self::new(Vec::new());
        }
        let cols = split_columns("survey", flat, 2)?;
        Self::new(cols[0].iter().copied().zip(cols[1].iter().copied()).collect())
    }

    /// Number of survey units.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if there are no survey units.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Observed (W1, W2) pairs.
    pub fn pairs(&self) -> &[(f64, f64)] {
        &self.pairs
    }
}

/// Homogeneous-area units with one proportion observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Homogeneous {
    known: KnownCoordinate,
    values: Vec<f64>,
}

impl Homogeneous {
    /// Areas with X = 1: W1 equals their Y; W2 is unobserved.
    pub fn known_w1(values: Vec<f64>) -> Result<Self> {
        Self::new(KnownCoordinate::W1, values)
    }

    /// Areas with X = 0: W2 equals their Y; W1 is unobserved.
    pub fn known_w2(values: Vec<f64>) -> Result<Self> {
        Self::new(KnownCoordinate::W2, values)
    }

    fn new(known: KnownCoordinate, values: Vec<f64>) -> Result<Self> {
        for (i, &v) in values.iter().enumerate() {
            check_proportion("homogeneous", i, v)?;
        }
        Ok(Self {
            known,
            values: values.into_iter().map(clamp_proportion).collect(),
        })
    }

    /// Which proportion is observed.
    pub fn known(&self) -> KnownCoordinate {
        self.known
    }

    /// Observed proportions, clamped away from {0, 1}.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no units.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a run consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    margins: Margins,
    x1: Homogeneous,
    x0: Homogeneous,
    survey: Survey,
}

impl Dataset {
    /// Margin units only.
    pub fn new(margins: Margins) -> Self {
        Self {
            margins,
            x1: Homogeneous {
                known: KnownCoordinate::W1,
                values: Vec::new(),
            },
            x0: Homogeneous {
                known: KnownCoordinate::W2,
                values: Vec::new(),
            },
            survey: Survey::default(),
        }
    }

    /// Add homogeneous-area units with known W1 (X = 1 areas).
    pub fn with_known_w1(mut self, values: Vec<f64>) -> Result<Self> {
        self.x1 = Homogeneous::known_w1(values)?;
        Ok(self)
    }

    /// Add homogeneous-area units with known W2 (X = 0 areas).
    pub fn with_known_w2(mut self, values: Vec<f64>) -> Result<Self> {
        self.x0 = Homogeneous::known_w2(values)?;
        Ok(self)
    }

    /// Add survey units.
    pub fn with_survey(mut self, survey: Survey) -> Self {
        self.survey = survey;
        self
    }

    /// Margin units.
    pub fn margins(&self) -> &Margins {
        &self.margins
    }

    /// Homogeneous-area units with known W1.
    pub fn known_w1(&self) -> &Homogeneous {
        &self.x1
    }

    /// Homogeneous-area units with known W2.
    pub fn known_w2(&self) -> &Homogeneous {
        &self.x0
    }

    /// Survey units.
    pub fn survey(&self) -> &Survey {
        &self.survey
    }

    /// Effective sample size: every unit that joins the clustering.
    pub fn effective_len(&self) -> usize {
        self.margins.len() + self.x1.len() + self.x0.len() + self.survey.len()
    }
}

impl From<Margins> for Dataset {
    fn from(margins: Margins) -> Self {
        Dataset::new(margins)
    }
}
