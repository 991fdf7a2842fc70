//! Tracking metrics: center / yaw-rate / radius RMSE, precision/recall, recreations.
//!
//! Targets and ground truth are matched by identity, so there is no
//! assignment step: a reported target either has a ground-truth robot of the
//! same name or it is a false positive.

use crate::{target::Target, types::ArmorName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ground-truth state of one robot at a given time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub name: ArmorName,
    pub time: f64,
    pub center: [f64; 3],
    pub velocity: [f64; 3],
    pub yaw: f64,
    pub yaw_rate: f64,
    pub radius: f64,
    /// At least one plate of the robot was detected this frame
    pub visible: bool,
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackingMetrics {
    /// Number of frames evaluated
    pub n_frames: u64,
    /// Reported targets matched to a ground-truth robot
    pub n_matched: u64,
    pub sum_sq_center_err: f64,
    pub sum_sq_yaw_rate_err: f64,
    pub sum_sq_radius_err: f64,
    pub true_positives: u64,
    /// Reported targets with no robot of that identity
    pub false_positives: u64,
    /// Visible robots with no reported target
    pub false_negatives: u64,
    /// Targets re-created for an identity that was already being reported
    pub recreations: u64,
    #[serde(skip)]
    births: BTreeMap<ArmorName, f64>,
}

impl TrackingMetrics {
    /// Root-mean-square error of the rotation center (m, 3D).
    pub fn rmse_center(&self) -> f64 {
        self.rmse(self.sum_sq_center_err)
    }

    /// Root-mean-square error of the yaw rate (rad/s).
    pub fn rmse_yaw_rate(&self) -> f64 {
        self.rmse(self.sum_sq_yaw_rate_err)
    }

    pub fn rmse_radius(&self) -> f64 {
        self.rmse(self.sum_sq_radius_err)
    }

    fn rmse(&self, sum_sq: f64) -> f64 {
        if self.n_matched == 0 {
            return 0.0;
        }
        (sum_sq / self.n_matched as f64).sqrt()
    }

    /// Precision = TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = (self.true_positives + self.false_positives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Recall = TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = (self.true_positives + self.false_negatives) as f64;
        if denom == 0.0 { 1.0 } else { self.true_positives as f64 / denom }
    }

    /// Accumulate one frame of reported targets against ground truth.
    pub fn accumulate(&mut self, targets: &[Target], ground_truths: &[GroundTruth]) {
        self.n_frames += 1;

        for target in targets {
            if let Some(&born) = self.births.get(&target.name) {
                if born != target.born_at {
                    self.recreations += 1;
                }
            }
            self.births.insert(target.name, target.born_at);

            let Some(gt) = ground_truths.iter().find(|g| g.name == target.name) else {
                self.false_positives += 1;
                continue;
            };
            let c = target.center();
            let dx = c.x - gt.center[0];
            let dy = c.y - gt.center[1];
            let dz = c.z - gt.center[2];
            let dw = target.yaw_rate() - gt.yaw_rate;
            let dr = target.radius() - gt.radius;
            self.sum_sq_center_err += dx * dx + dy * dy + dz * dz;
            self.sum_sq_yaw_rate_err += dw * dw;
            self.sum_sq_radius_err += dr * dr;
            self.n_matched += 1;
            self.true_positives += 1;
        }

        self.false_negatives += ground_truths
            .iter()
            .filter(|g| g.visible && !targets.iter().any(|t| t.name == g.name))
            .count() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        target::TargetStatus,
        types::{PlateCount, StateCov, StateVec},
    };
    use approx::assert_abs_diff_eq;

    fn target(name: ArmorName, x: f64, born_at: f64) -> Target {
        let state = StateVec::from_column_slice(&[x, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.2]);
        Target {
            status: TargetStatus::Tracking,
            ..Target::new(name, PlateCount::Four, state, StateCov::identity(), born_at)
        }
    }

    fn truth(name: ArmorName, x: f64, visible: bool) -> GroundTruth {
        GroundTruth {
            name,
            time: 0.0,
            center: [x, 0.0, 0.0],
            velocity: [0.0; 3],
            yaw: 0.0,
            yaw_rate: 3.0,
            radius: 0.25,
            visible,
        }
    }

    #[test]
    fn errors_accumulate_per_matched_target() {
        let mut m = TrackingMetrics::default();
        m.accumulate(&[target(ArmorName::One, 3.1, 0.0)], &[truth(ArmorName::One, 3.0, true)]);
        m.accumulate(&[target(ArmorName::One, 2.9, 0.0)], &[truth(ArmorName::One, 3.0, true)]);
        assert_eq!(m.n_frames, 2);
        assert_eq!(m.n_matched, 2);
        assert_abs_diff_eq!(m.rmse_center(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(m.rmse_yaw_rate(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.rmse_radius(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn counts_false_positives_and_negatives() {
        let mut m = TrackingMetrics::default();
        m.accumulate(
            &[target(ArmorName::Two, 3.0, 0.0)],
            &[truth(ArmorName::One, 3.0, true), truth(ArmorName::Four, 5.0, false)],
        );
        assert_eq!(m.false_positives, 1);
        // hidden robots are not misses
        assert_eq!(m.false_negatives, 1);
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
    }

    #[test]
    fn detects_recreated_targets() {
        let mut m = TrackingMetrics::default();
        let gt = [truth(ArmorName::One, 3.0, true)];
        m.accumulate(&[target(ArmorName::One, 3.0, 0.0)], &gt);
        m.accumulate(&[target(ArmorName::One, 3.0, 0.0)], &gt);
        assert_eq!(m.recreations, 0);
        m.accumulate(&[target(ArmorName::One, 3.0, 1.5)], &gt);
        assert_eq!(m.recreations, 1);
    }

    #[test]
    fn empty_metrics_are_neutral() {
        let m = TrackingMetrics::default();
        assert_eq!(m.rmse_center(), 0.0);
        assert_eq!(m.precision(), 1.0);
        assert_eq!(m.recall(), 1.0);
    }
}
