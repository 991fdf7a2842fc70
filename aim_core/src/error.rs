//! Error types for the aiming core.
//!
//! Nothing here is fatal: every variant degrades to "no usable target" or
//! "no usable shot" and leaves the decision to the caller.

use thiserror::Error;

/// Configuration loading / validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

/// Numerical failures inside the armor EKF.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("innovation covariance is singular")]
    SingularInnovation,

    #[error("filter produced a non-finite state")]
    NonFinite,

    #[error("measurement has {rows} rows, expected a multiple of 4")]
    BadMeasurement { rows: usize },
}

/// Reasons a firing solution does not exist. Any `Err` means "unsolvable".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("invalid trajectory input (speed={speed}, distance={distance}, height={height})")]
    InvalidInput {
        speed: f64,
        distance: f64,
        height: f64,
    },

    #[error("target is not in front of the muzzle (distance={0})")]
    BehindMuzzle(f64),

    #[error("target is out of range for muzzle speed {speed} m/s")]
    OutOfRange { speed: f64 },

    #[error("pitch iteration did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// Failures of the lead-compensated aim computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AimError {
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),

    #[error("target has no plates to aim at")]
    NoPlates,

    #[error("lead time did not settle after {iterations} iterations")]
    LeadNotConverged { iterations: usize },
}
