//! Numerical core of the Dirichlet-process ecological inference sampler.
//!
//! This crate holds every piece of the sampler that does not need the
//! standard library: feasible bounds of a unit's latent pair, the
//! tomography-line grid draw, bounded bivariate quadrature, the
//! Normal-Inverse-Wishart conjugate update and the Polya-urn clustering
//! state. It works in `no_std` environments with only an allocator.
//!
//! # Features
//!
//! - `std` (default): Enable standard library support for convenience
//! - `parallel`: Integrate per-unit likelihoods on the rayon pool (requires `std`)
//!
//! # Usage
//!
//! This crate is typically used through the main `ecoinfer` crate, which
//! drives the Gibbs iterations, stores draws and reports progress.
//!
//! ```ignore
//! use ecoinfer_core::{
//!     bounds::{UnitBounds, UnitKind},
//!     dp::{BaseMeasure, ClusterState},
//!     grid::TomographyGrid,
//!     types::{Margin, Vector2},
//! };
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bounds;
pub mod conjugate;
pub mod constants;
pub mod density;
pub mod diagnostics;
pub mod dp;
pub mod grid;
pub mod integrate;
pub mod link;
pub mod math;
pub mod types;

// Re-export commonly used items at crate root
pub use bounds::{UnitBounds, UnitKind};
pub use conjugate::{ClusterSummary, NiwPrior};
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use dp::{BaseMeasure, ClusterState, ConcentrationPrior};
pub use integrate::{Moment, TruncatedIntegrator};
pub use link::Link;
pub use types::{ClusterParams, Margin, Matrix2, Vector2};
