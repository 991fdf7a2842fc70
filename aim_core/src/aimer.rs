//! Lead-compensated aiming at a tracked target.
//!
//! The projectile needs `fly_time` to arrive, during which the robot keeps
//! translating and spinning. The aimer iterates on the flight time:
//! extrapolate the plates to `now + shoot_delay + fly_time`, pick the plate
//! facing the gimbal, solve the trajectory to it, and repeat until the
//! flight time settles.

use crate::{
    error::AimError,
    target::Target,
    trajectory::TrajectorySolver,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimerConfig {
    /// Latency between the command and the projectile leaving the barrel (s)
    pub shoot_delay: f64,
    /// Flight-time change below which the lead has settled (s)
    pub lead_tolerance: f64,
    pub max_lead_iterations: usize,
}

impl Default for AimerConfig {
    fn default() -> Self {
        Self {
            shoot_delay: 0.05,
            lead_tolerance: 1e-4,
            max_lead_iterations: 10,
        }
    }
}

/// Gimbal command for one shot.
#[derive(Clone, Debug, PartialEq)]
pub struct AimCommand {
    /// Gimbal yaw toward the aim point (rad)
    pub yaw: f64,
    /// Barrel elevation (rad)
    pub pitch: f64,
    /// Projectile flight time (s)
    pub fly_time: f64,
    /// Index of the plate aimed at
    pub plate_index: usize,
    /// Predicted plate position at impact
    pub aim_point: Vector3<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct Aimer {
    pub config: AimerConfig,
    pub solver: TrajectorySolver,
}

impl Aimer {
    pub fn new(config: AimerConfig, solver: TrajectorySolver) -> Self {
        Self { config, solver }
    }

    pub fn aim(&self, target: &Target, now: f64, bullet_speed: f64) -> Result<AimCommand, AimError> {
        let mut fly_time = 0.0;

        for _ in 0..self.config.max_lead_iterations {
            let hit_time = now + self.config.shoot_delay + fly_time;
            let plate = target.facing_plate(hit_time).ok_or(AimError::NoPlates)?;
            let traj = self
                .solver
                .solve(bullet_speed, plate.horizontal_distance(), plate.position.z)?;

            let settled = (traj.fly_time - fly_time).abs() < self.config.lead_tolerance;
            fly_time = traj.fly_time;
            if settled {
                return Ok(AimCommand {
                    yaw: plate.position.y.atan2(plate.position.x),
                    pitch: traj.pitch,
                    fly_time,
                    plate_index: plate.index,
                    aim_point: plate.position,
                });
            }
        }

        tracing::debug!(name = %target.name, fly_time, "lead iteration did not settle");
        Err(AimError::LeadNotConverged {
            iterations: self.config.max_lead_iterations,
        })
    }
}
