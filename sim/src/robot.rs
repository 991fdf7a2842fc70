//! Spinning robot ground truth and motion models.
//!
//! Each robot has a rotation center, a linear velocity, a yaw spinning at a
//! constant rate and `n` armor plates on a circle of fixed radius around the
//! center. A `MotionSpec` decides how the center velocity evolves.

use aim_core::metrics::GroundTruth;
use aim_core::types::{wrap_angle, ArmorName, ArmorPose, PlateCount};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Describes how the robot center moves.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// Velocity never changes.
    ConstantVelocity,
    /// Side-to-side dodging: `speed` along `heading` (rad), direction
    /// flipping every half `period` (s).
    Strafe { speed: f64, period: f64, heading: f64 },
    /// Switch motion model at given sim times.
    /// `segments` is sorted by time ascending: [(t_start, MotionSpec), ...].
    /// The active motion is the last one whose t_start <= current_t.
    Segmented {
        segments: Vec<(f64, Box<MotionSpec>)>,
    },
}

impl MotionSpec {
    /// Velocity to apply over the step starting at `t`.
    fn velocity(&self, t: f64, current: [f64; 3]) -> [f64; 3] {
        match self {
            MotionSpec::ConstantVelocity => current,
            MotionSpec::Strafe { speed, period, heading } => {
                let half = (period / 2.0).max(1e-6);
                let sign = if (t / half).floor() as i64 % 2 == 0 { 1.0 } else { -1.0 };
                [sign * speed * heading.cos(), sign * speed * heading.sin(), 0.0]
            }
            MotionSpec::Segmented { segments } => segments
                .iter()
                .filter(|(t_start, _)| *t_start <= t)
                .last()
                .map_or(current, |(_, motion)| motion.velocity(t, current)),
        }
    }
}

/// A simulated robot with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimRobot {
    pub name: ArmorName,
    pub plates: PlateCount,
    pub center: [f64; 3],
    pub velocity: [f64; 3],
    pub yaw: f64,
    /// rad/s, positive counter-clockwise seen from above
    pub yaw_rate: f64,
    pub radius: f64,
    pub motion: MotionSpec,
    /// Optional: robot appears after this time (no observations before)
    pub appear_at: Option<f64>,
    /// Optional: robot disappears after this time
    pub disappear_at: Option<f64>,
    /// Time windows `[start, end)` during which every plate is hidden
    #[serde(default)]
    pub occlusions: Vec<[f64; 2]>,
}

impl SimRobot {
    /// Stationary, non-spinning four-plate robot.
    pub fn new(name: ArmorName, center: [f64; 3], radius: f64) -> Self {
        Self {
            name,
            plates: PlateCount::Four,
            center,
            velocity: [0.0; 3],
            yaw: 0.0,
            yaw_rate: 0.0,
            radius,
            motion: MotionSpec::ConstantVelocity,
            appear_at: None,
            disappear_at: None,
            occlusions: Vec::new(),
        }
    }

    pub fn spinning(mut self, yaw: f64, yaw_rate: f64) -> Self {
        self.yaw = yaw;
        self.yaw_rate = yaw_rate;
        self
    }

    pub fn moving(mut self, velocity: [f64; 3], motion: MotionSpec) -> Self {
        self.velocity = velocity;
        self.motion = motion;
        self
    }

    pub fn with_plates(mut self, plates: PlateCount) -> Self {
        self.plates = plates;
        self
    }

    /// Propagate the true state from `t` to `t + dt`.
    pub fn step(&mut self, t: f64, dt: f64) {
        self.velocity = self.motion.velocity(t, self.velocity);
        for (c, v) in self.center.iter_mut().zip(self.velocity) {
            *c += v * dt;
        }
        self.yaw = wrap_angle(self.yaw + self.yaw_rate * dt);
    }

    /// True if the robot exists at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        if let Some(appear) = self.appear_at {
            if t < appear {
                return false;
            }
        }
        if let Some(disappear) = self.disappear_at {
            if t >= disappear {
                return false;
            }
        }
        true
    }

    pub fn is_occluded(&self, t: f64) -> bool {
        self.occlusions.iter().any(|[start, end]| t >= *start && t < *end)
    }

    /// True pose of every plate, ordered by plate index.
    pub fn plate_poses(&self) -> Vec<ArmorPose> {
        let spacing = self.plates.spacing();
        (0..self.plates.get())
            .map(|k| {
                let phase = self.yaw + k as f64 * spacing;
                ArmorPose {
                    index: k,
                    position: Vector3::new(
                        self.center[0] + self.radius * phase.cos(),
                        self.center[1] + self.radius * phase.sin(),
                        self.center[2],
                    ),
                    yaw: wrap_angle(phase),
                }
            })
            .collect()
    }

    pub fn ground_truth(&self, time: f64, visible: bool) -> GroundTruth {
        GroundTruth {
            name: self.name,
            time,
            center: self.center,
            velocity: self.velocity,
            yaw: self.yaw,
            yaw_rate: self.yaw_rate,
            radius: self.radius,
            visible,
        }
    }
}
