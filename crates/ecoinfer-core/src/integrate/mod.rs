//! Numerical integration of the bounded bivariate density.

mod quadrature;
mod truncated;

pub use quadrature::{AdaptiveQuadrature, QuadStatus, Quadrature};
pub use truncated::{
    log_likelihoods, Moment, SufficientStatistics, TruncatedIntegrator, UnitIntegrand,
};
