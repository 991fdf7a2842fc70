//! Target: fused motion estimate of one robot, lifecycle status, plate poses.

use crate::types::{idx, wrap_angle, ArmorName, ArmorPose, PlateCount, StateCov, StateVec};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Seen recently, not yet confirmed
    Detecting,
    /// Confirmed and observed on the last frame
    Tracking,
    /// Confirmed but missing from the most recent frame(s)
    TempLost,
    /// Marked for removal
    Lost,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Detecting => "detecting",
            TargetStatus::Tracking => "tracking",
            TargetStatus::TempLost => "temp_lost",
            TargetStatus::Lost => "lost",
        }
    }
}

/// One tracked robot.
#[derive(Clone, Debug)]
pub struct Target {
    /// Robot identity, fixed for the lifetime of the target
    pub name: ArmorName,
    /// Plate layout, fixed at creation
    pub plates: PlateCount,
    /// [cx, cy, cz, vx, vy, vz, yaw, yaw_rate, radius]
    pub state: StateVec,
    pub cov: StateCov,
    pub status: TargetStatus,
    /// Consecutive frames with at least one observation
    pub hit_count: u32,
    /// Consecutive frames without any observation
    pub miss_count: u32,
    pub total_hits: u32,
    /// Number of successful filter corrections
    pub update_count: u32,
    /// Timestamp the state is predicted to
    pub last_update: f64,
    /// Timestamp of the last frame with an observation
    pub last_seen: f64,
    pub born_at: f64,
}

impl Target {
    /// Create a new detecting target from an initial estimate.
    pub fn new(
        name: ArmorName,
        plates: PlateCount,
        state: StateVec,
        cov: StateCov,
        birth_time: f64,
    ) -> Self {
        Self {
            name,
            plates,
            state,
            cov,
            status: TargetStatus::Detecting,
            hit_count: 1,
            miss_count: 0,
            total_hits: 1,
            update_count: 0,
            last_update: birth_time,
            last_seen: birth_time,
            born_at: birth_time,
        }
    }

    pub fn center(&self) -> Vector3<f64> {
        Vector3::new(self.state[idx::CX], self.state[idx::CY], self.state[idx::CZ])
    }

    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.state[idx::VX], self.state[idx::VY], self.state[idx::VZ])
    }

    pub fn yaw(&self) -> f64 {
        self.state[idx::YAW]
    }

    pub fn yaw_rate(&self) -> f64 {
        self.state[idx::YAW_RATE]
    }

    pub fn radius(&self) -> f64 {
        self.state[idx::RADIUS]
    }

    /// Distance of the rotation axis from the gimbal in the ground plane.
    pub fn horizontal_distance(&self) -> f64 {
        self.state[idx::CX].hypot(self.state[idx::CY])
    }

    /// True for targets a caller may aim at.
    pub fn is_usable(&self) -> bool {
        matches!(self.status, TargetStatus::Tracking | TargetStatus::TempLost)
    }

    /// 1.0 while tracking, decaying with each missed frame while temporarily lost.
    pub fn confidence(&self) -> f64 {
        match self.status {
            TargetStatus::Tracking => 1.0,
            TargetStatus::TempLost => 1.0 / (1.0 + self.miss_count as f64),
            TargetStatus::Detecting | TargetStatus::Lost => 0.0,
        }
    }

    /// Center extrapolated to `at_time` under constant velocity.
    pub fn center_at(&self, at_time: f64) -> Vector3<f64> {
        let dt = at_time - self.last_update;
        self.center() + self.velocity() * dt
    }

    /// Yaw extrapolated to `at_time` under constant angular velocity.
    pub fn yaw_at(&self, at_time: f64) -> f64 {
        self.yaw() + self.yaw_rate() * (at_time - self.last_update)
    }

    /// Pose of every plate at `at_time`, ordered by plate index.
    pub fn armor_poses(&self, at_time: f64) -> Vec<ArmorPose> {
        let center = self.center_at(at_time);
        let yaw = self.yaw_at(at_time);
        let r = self.radius();
        let spacing = self.plates.spacing();

        (0..self.plates.get())
            .map(|k| {
                let phase = yaw + k as f64 * spacing;
                ArmorPose {
                    index: k,
                    position: Vector3::new(
                        center.x + r * phase.cos(),
                        center.y + r * phase.sin(),
                        center.z,
                    ),
                    yaw: phase,
                }
            })
            .collect()
    }

    /// The plate whose outward normal points most directly at the gimbal.
    pub fn facing_plate(&self, at_time: f64) -> Option<ArmorPose> {
        self.armor_poses(at_time).into_iter().min_by(|a, b| {
            facing_error(a).total_cmp(&facing_error(b))
        })
    }

    pub(crate) fn clamp_radius(&mut self, min: f64, max: f64) {
        self.state[idx::RADIUS] = self.state[idx::RADIUS].clamp(min, max);
    }
}

/// Angle between a plate's normal and the direction from the plate to the gimbal.
fn facing_error(pose: &ArmorPose) -> f64 {
    let to_gimbal = (-pose.position.y).atan2(-pose.position.x);
    wrap_angle(pose.yaw - to_gimbal).abs()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn spinning(plates: PlateCount) -> Target {
        let state = StateVec::from_column_slice(&[3.0, 1.0, 0.15, 0.5, 0.0, 0.0, 0.3, 4.0, 0.25]);
        Target::new(ArmorName::Four, plates, state, StateCov::identity(), 10.0)
    }

    #[test]
    fn four_plates_are_a_quarter_turn_apart() {
        let t = spinning(PlateCount::Four);
        for at in [10.0, 10.05, 10.5] {
            let poses = t.armor_poses(at);
            assert_eq!(poses.len(), 4);
            for pair in poses.windows(2) {
                assert_abs_diff_eq!(pair[1].yaw - pair[0].yaw, FRAC_PI_2, epsilon = 1e-12);
            }
            for (k, p) in poses.iter().enumerate() {
                assert_eq!(p.index, k);
            }
        }
    }

    #[test]
    fn two_plates_are_opposite() {
        let t = spinning(PlateCount::Two);
        let poses = t.armor_poses(10.0);
        assert_eq!(poses.len(), 2);
        assert_abs_diff_eq!(poses[1].yaw - poses[0].yaw, PI, epsilon = 1e-12);
        let mid = (poses[0].position + poses[1].position) / 2.0;
        assert_abs_diff_eq!(mid, t.center(), epsilon = 1e-12);
    }

    #[test]
    fn poses_extrapolate_center_and_yaw() {
        let t = spinning(PlateCount::Four);
        let poses = t.armor_poses(10.1);
        let phase = 0.3 + 4.0 * 0.1;
        assert_abs_diff_eq!(poses[0].yaw, phase, epsilon = 1e-12);
        assert_abs_diff_eq!(poses[0].position.x, 3.05 + 0.25 * phase.cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(poses[0].position.y, 1.0 + 0.25 * phase.sin(), epsilon = 1e-12);
        assert_abs_diff_eq!(poses[0].position.z, 0.15, epsilon = 1e-12);
        let [x, y, z, yaw] = poses[0].xyza();
        assert_eq!([x, y, z], [poses[0].position.x, poses[0].position.y, 0.15]);
        assert_eq!(yaw, poses[0].yaw);
    }

    #[test]
    fn facing_plate_points_back_at_gimbal() {
        let mut t = spinning(PlateCount::Four);
        t.state[idx::CY] = 0.0;
        t.state[idx::YAW] = PI - 0.1;
        let front = t.facing_plate(10.0).unwrap();
        assert_eq!(front.index, 0);
        assert!(wrap_angle(front.yaw - PI).abs() < 0.2);
        assert!(front.horizontal_distance() < t.horizontal_distance());
    }

    #[test]
    fn confidence_decays_while_temp_lost() {
        let mut t = spinning(PlateCount::Four);
        assert_eq!(t.confidence(), 0.0);
        t.status = TargetStatus::Tracking;
        assert_eq!(t.confidence(), 1.0);
        t.status = TargetStatus::TempLost;
        t.miss_count = 1;
        let one = t.confidence();
        t.miss_count = 3;
        assert!(t.confidence() < one);
        assert!(t.is_usable());
    }
}
