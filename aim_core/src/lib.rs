//! `aim_core` - Armor tracking and ballistic aiming.
//!
//! # Module layout
//! - [`types`]          - Identities, observations, state vectors, plate poses
//! - [`error`]          - Error enums for config, filter, trajectory and aiming
//! - [`ekf`]            - Armor EKF (predict / plate assignment / stacked correction)
//! - [`target`]         - Target struct, status, plate pose extrapolation
//! - [`target_manager`] - Birth / confirmation / loss logic
//! - [`selection`]      - Ranking of usable targets
//! - [`tracker`]        - Per-frame tracker orchestrator
//! - [`trajectory`]     - Pitch and flight-time solver
//! - [`aimer`]          - Lead-compensated aim commands
//! - [`config`]         - YAML configuration
//! - [`metrics`]        - Center / yaw-rate / radius RMSE, precision/recall

pub mod aimer;
pub mod config;
pub mod ekf;
pub mod error;
pub mod metrics;
pub mod selection;
pub mod target;
pub mod target_manager;
pub mod tracker;
pub mod trajectory;
pub mod types;

pub use aimer::{AimCommand, Aimer, AimerConfig};
pub use config::AimConfig;
pub use error::{AimError, ConfigError, FilterError, TrajectoryError};
pub use selection::SelectionPolicy;
pub use target::{Target, TargetStatus};
pub use tracker::{Tracker, TrackerConfig, TrackerOutput};
pub use trajectory::{Trajectory, TrajectoryResult, TrajectorySolver};
pub use types::{ArmorName, ArmorObservation, ArmorPose, PlateCount, StateCov, StateVec};
