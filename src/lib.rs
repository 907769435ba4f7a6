//! # ecoinfer
//!
//! Bayesian ecological inference for 2×2 tables with a Dirichlet-process
//! mixture prior.
//!
//! Each areal unit reports two margins: the share X of the first group and
//! the overall outcome share Y. The unobserved within-group proportions
//! (W1, W2) satisfy `Y = X·W1 + (1 − X)·W2`, which confines them to a line
//! segment inside the unit square (the tomography line). The sampler:
//!
//! - draws each unit's pair on its tomography line, weighted by a bivariate
//!   Normal on the link scale (logit, probit or complementary log-log);
//! - clusters the transformed pairs with a Polya-urn scheme, so units share
//!   (μ, Σ) with an unbounded, data-driven number of clusters;
//! - updates cluster parameters with Normal-Inverse-Wishart conjugate draws
//!   and the concentration α with an auxiliary-variable step.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ecoinfer::{Config, Dataset, DpSampler, Margins};
//!
//! let margins = Margins::from_columns(&[0.3, 0.7], &[0.4, 0.6])?;
//! let posterior = DpSampler::new(Config::quick())?.run(&Dataset::new(margins))?;
//!
//! for (i, w1) in posterior.draws.mean_w1().iter().enumerate() {
//!     println!("unit {i}: E[W1] = {w1:.3}");
//! }
//! ```
//!
//! Homogeneous areas (X ∈ {0, 1}) with a known proportion and survey units
//! with both proportions known can join the clustering through
//! [`Dataset::with_known_w1`], [`Dataset::with_known_w2`] and
//! [`Dataset::with_survey`].

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod latent;
mod result;

// Functional modules
pub mod data;
pub mod observer;
pub mod sampler;

// Re-exports for public API
pub use config::{Config, Prior};
pub use data::{Dataset, Homogeneous, Margins, Survey};
pub use error::{Error, Result};
pub use observer::{Interrupt, Never, Observer, Silent, TracingObserver};
pub use result::{Draws, Posterior, Prediction, RunStatus};
pub use sampler::DpSampler;

pub use ecoinfer_core::{Diagnostic, Link, Margin, Matrix2, Vector2};
