//! Error types for the sampler.

use ecoinfer_core::bounds::StartError;
use ecoinfer_core::conjugate::ConjugateError;
use ecoinfer_core::dp::ClusterError;
use thiserror::Error;

/// Fatal errors that stop a run.
///
/// Numerical trouble that the sampler can work around (quadrature that does
/// not converge, grid nodes off the unit square) is reported through the
/// [`Observer`](crate::Observer) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Run controls or prior hyperparameters are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input data has the wrong shape or values outside [0, 1].
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The rejection initializer found no feasible starting pair.
    #[error("Gibbs sampler cannot start: unit {unit} has no feasible latent pair after {attempts} proposals, bounds are too tight")]
    InfeasibleStart {
        /// Index of the unit.
        unit: usize,
        /// Number of proposals drawn.
        attempts: usize,
    },

    /// A non positive definite matrix reached a Wishart draw.
    #[error("Numerical error: {0}")]
    Numerical(String),
}

impl Error {
    pub(crate) fn infeasible_start(unit: usize, e: StartError) -> Self {
        Error::InfeasibleStart {
            unit,
            attempts: e.attempts,
        }
    }
}

impl From<ConjugateError> for Error {
    fn from(e: ConjugateError) -> Self {
        Error::Numerical(e.to_string())
    }
}

impl From<ClusterError> for Error {
    fn from(e: ClusterError) -> Self {
        Error::Numerical(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
