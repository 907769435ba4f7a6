//! Numerical constants shared by the sampler components.

/// Default deterministic seed for RNG operations.
///
/// Same seed + same data = same draws. The value `0x65636F6470` is "ecodp"
/// encoded in ASCII.
pub const DEFAULT_SEED: u64 = 0x65636F6470;

/// Natural log of 2π, used in multivariate normal log-pdf computation.
pub const LOG_2PI: f64 = 1.8378770664093453;

/// Distance kept between a latent proportion and the boundary {0, 1}.
///
/// Keeps every link transform finite.
pub const W_SENTINEL: f64 = 1e-6;

/// Default number of grid points per unit length of the feasible W1 interval.
pub const DEFAULT_GRID_RESOLUTION: usize = 1000;

// =============================================================================
// Quadrature
// =============================================================================

/// Absolute tolerance for the adaptive quadrature.
pub const QUAD_EPS_ABS: f64 = 1e-9;

/// Relative tolerance for the adaptive quadrature.
pub const QUAD_EPS_REL: f64 = 1e-9;

/// Maximum number of subintervals the adaptive quadrature may create.
pub const QUAD_SUBDIVISION_LIMIT: usize = 100;

/// Lower end of the integration domain on the reparametrized line.
///
/// The link Jacobian is singular at t ∈ {0, 1} when a bound touches 0 or 1.
pub const QUAD_T_LOWER: f64 = 1e-5;

/// Upper end of the integration domain on the reparametrized line.
pub const QUAD_T_UPPER: f64 = 1.0 - 1e-5;

// =============================================================================
// Sampler defaults
// =============================================================================

/// Maximum attempts of the rejection initializer before giving up.
pub const DEFAULT_START_RETRY_CAP: usize = 100_000;

/// Initial Dirichlet-process concentration.
pub const DEFAULT_ALPHA: f64 = 1.0;

/// Smallest concentration value a Gamma draw is allowed to return.
pub const ALPHA_MIN: f64 = f64::MIN_POSITIVE;
