//! Camera + detector + pose-solver simulator.
//!
//! Produces one frame of armor observations per call with:
//! - plates visible only when their normal faces the camera
//! - range limit
//! - miss probability (1 - P_D)
//! - Gaussian position and yaw noise

use crate::robot::SimRobot;
use aim_core::metrics::GroundTruth;
use aim_core::types::{wrap_angle, ArmorObservation};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Camera / detector parameters. The camera sits at the origin.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    /// Probability that a visible plate is detected
    pub p_detection: f64,
    /// Largest angle between a plate normal and the line of sight (rad)
    pub max_view_angle: f64,
    /// Horizontal detection range (m)
    pub max_range: f64,
    /// Per-axis position noise 1σ (m)
    pub position_noise_std: f64,
    /// Yaw noise 1σ (rad)
    pub yaw_noise_std: f64,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            p_detection: 0.95,
            max_view_angle: 1.05,
            max_range: 8.0,
            position_noise_std: 0.02,
            yaw_noise_std: 0.05,
        }
    }
}

/// Generates observation frames from a set of robots.
pub struct CameraSimulator {
    pub params: CameraParams,
    rng: ChaCha8Rng,
    position_noise: Normal<f64>,
    yaw_noise: Normal<f64>,
}

impl CameraSimulator {
    pub fn new(params: CameraParams, seed: u64) -> anyhow::Result<Self> {
        for (name, std) in [
            ("position_noise_std", params.position_noise_std),
            ("yaw_noise_std", params.yaw_noise_std),
        ] {
            anyhow::ensure!(std.is_finite() && std >= 0.0, "{name} must be finite and non-negative, got {std}");
        }
        anyhow::ensure!(
            (0.0..=1.0).contains(&params.p_detection),
            "p_detection must lie in [0, 1], got {}",
            params.p_detection
        );
        let position_noise = Normal::new(0.0, params.position_noise_std)?;
        let yaw_noise = Normal::new(0.0, params.yaw_noise_std)?;
        Ok(Self {
            params,
            rng: ChaCha8Rng::seed_from_u64(seed),
            position_noise,
            yaw_noise,
        })
    }

    /// Observe all robots at time `t`.
    /// Returns the frame's observations and the ground truth of every active robot.
    pub fn observe(&mut self, robots: &[SimRobot], t: f64) -> (Vec<ArmorObservation>, Vec<GroundTruth>) {
        let mut observations = Vec::new();
        let mut truth = Vec::new();

        for robot in robots {
            if !robot.is_active(t) {
                continue;
            }
            let before = observations.len();

            if !robot.is_occluded(t) {
                for pose in robot.plate_poses() {
                    let to_camera = (-pose.position.y).atan2(-pose.position.x);
                    if wrap_angle(pose.yaw - to_camera).abs() > self.params.max_view_angle {
                        continue;
                    }
                    if pose.horizontal_distance() > self.params.max_range {
                        continue;
                    }
                    // Miss detection?
                    if self.rng.gen::<f64>() > self.params.p_detection {
                        continue;
                    }

                    let position = [
                        pose.position.x + self.position_noise.sample(&mut self.rng),
                        pose.position.y + self.position_noise.sample(&mut self.rng),
                        pose.position.z + self.position_noise.sample(&mut self.rng),
                    ];
                    let yaw = wrap_angle(pose.yaw + self.yaw_noise.sample(&mut self.rng));
                    observations.push(ArmorObservation::new(robot.name, position, yaw, t));
                }
            }

            truth.push(robot.ground_truth(t, observations.len() > before));
        }

        (observations, truth)
    }
}
