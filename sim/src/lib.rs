//! `sim` - Scenario simulator: spinning robots, camera observations, replay.

pub mod camera_sim;
pub mod replay;
pub mod robot;
pub mod runner;
pub mod scenarios;

pub use camera_sim::{CameraParams, CameraSimulator};
pub use replay::{load_replay, save_replay, Frame, ReplayLog};
pub use robot::{MotionSpec, SimRobot};
pub use runner::{evaluate, RunSummary};
pub use scenarios::{Scenario, ScenarioKind};
