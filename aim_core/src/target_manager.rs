//! Target lifecycle management: birth, confirmation, temporary loss, removal.
//!
//! # Lifecycle policy
//! - **Birth**: the first observation of an unseen identity creates a
//!   DETECTING target.
//! - **Confirmation**: DETECTING → TRACKING after `confirm_frames`
//!   consecutive frames with an observation (the birth frame counts).
//!   A DETECTING target that misses a frame is removed.
//! - **Temporary loss**: TRACKING → TEMP_LOST on the first missed frame,
//!   back to TRACKING as soon as the identity reappears.
//! - **Removal**: TEMP_LOST → LOST once `miss_count >= lost_after_misses`
//!   or, when `lost_timeout` is set, once the target has been unseen for
//!   longer than that many seconds.

use crate::{
    ekf::ArmorEkf,
    target::{Target, TargetStatus},
    types::{ArmorName, ArmorObservation, PlateCount},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for target lifecycle policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Consecutive observed frames required for confirmation
    pub confirm_frames: u32,
    /// Consecutive missed frames after which a target is dropped
    pub lost_after_misses: u32,
    /// Optional unseen-time limit (seconds)
    pub lost_timeout: Option<f64>,
    /// Identities carrying two plates instead of four
    pub two_plate_identities: Vec<ArmorName>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            confirm_frames: 3,
            lost_after_misses: 10,
            lost_timeout: None,
            two_plate_identities: Vec::new(),
        }
    }
}

/// Applies the lifecycle policy to targets.
#[derive(Clone, Debug)]
pub struct TargetManager {
    pub config: LifecycleConfig,
}

impl TargetManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    pub fn plate_count(&self, name: ArmorName) -> PlateCount {
        if self.config.two_plate_identities.contains(&name) {
            PlateCount::Two
        } else {
            PlateCount::Four
        }
    }

    /// Create a new detecting target from the first observation of `name`.
    pub fn birth_target(&self, obs: &ArmorObservation, ekf: &ArmorEkf, current_time: f64) -> Target {
        let (state, cov) = ekf.initial_state(obs);
        let mut target = Target::new(obs.name, self.plate_count(obs.name), state, cov, current_time);
        if self.config.confirm_frames <= 1 {
            target.status = TargetStatus::Tracking;
        }
        tracing::debug!(name = %obs.name, plates = target.plates.get(), "target created");
        target
    }

    /// Call after a target received observations this frame.
    /// Returns true when the target was confirmed by this hit.
    pub fn register_hit(&self, target: &mut Target, timestamp: f64) -> bool {
        target.miss_count = 0;
        target.hit_count = target.hit_count.saturating_add(1);
        target.total_hits = target.total_hits.saturating_add(1);
        target.last_seen = timestamp;

        let prev = target.status;
        target.status = match prev {
            TargetStatus::Detecting if target.hit_count >= self.config.confirm_frames => {
                TargetStatus::Tracking
            }
            TargetStatus::TempLost => TargetStatus::Tracking,
            other => other,
        };
        if prev != target.status {
            tracing::debug!(name = %target.name, from = prev.as_str(), to = target.status.as_str(), "status change");
        }
        prev == TargetStatus::Detecting && target.status == TargetStatus::Tracking
    }

    /// Call after a target received no observation this frame.
    pub fn register_miss(&self, target: &mut Target, timestamp: f64) {
        target.miss_count = target.miss_count.saturating_add(1);
        target.hit_count = 0;

        let prev = target.status;
        target.status = match prev {
            TargetStatus::Detecting | TargetStatus::Lost => TargetStatus::Lost,
            TargetStatus::Tracking | TargetStatus::TempLost => {
                if self.is_expired(target, timestamp) {
                    TargetStatus::Lost
                } else {
                    TargetStatus::TempLost
                }
            }
        };
        if prev != target.status {
            tracing::debug!(name = %target.name, from = prev.as_str(), to = target.status.as_str(), misses = target.miss_count, "status change");
        }
    }

    fn is_expired(&self, target: &Target, timestamp: f64) -> bool {
        if target.miss_count >= self.config.lost_after_misses {
            return true;
        }
        self.config
            .lost_timeout
            .is_some_and(|limit| timestamp - target.last_seen > limit)
    }

    /// Remove all lost targets. Returns the removed identities.
    pub fn prune_lost(targets: &mut BTreeMap<ArmorName, Target>) -> Vec<ArmorName> {
        let lost: Vec<ArmorName> = targets
            .iter()
            .filter(|(_, t)| t.status == TargetStatus::Lost)
            .map(|(name, _)| *name)
            .collect();
        for name in &lost {
            targets.remove(name);
        }
        lost
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
