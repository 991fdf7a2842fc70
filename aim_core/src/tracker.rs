//! Tracker: the per-frame update over all tracked robots.
//!
//! # Processing steps per frame
//! 1. Drop malformed observations, group the rest by identity
//! 2. Predict every live target to the frame timestamp
//! 3. Correct each observed target with all of its plates at once
//! 4. Register hits / misses on the lifecycle manager
//! 5. Birth detecting targets for unseen identities
//! 6. Prune lost targets
//! 7. Rank usable targets with the selection policy

use crate::{
    ekf::{ArmorEkf, FilterConfig},
    selection::{rank, SelectionPolicy},
    target::{Target, TargetStatus},
    target_manager::{LifecycleConfig, TargetManager},
    types::{ArmorName, ArmorObservation},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the tracker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub lifecycle: LifecycleConfig,
    pub filter: FilterConfig,
    /// Ordering of the returned targets
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub selection: SelectionPolicy,
    /// Return TEMP_LOST targets (after all TRACKING ones)
    pub report_temp_lost: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            filter: FilterConfig::default(),
            selection: SelectionPolicy::default(),
            report_temp_lost: true,
        }
    }
}

/// Outputs of one tracker update.
#[derive(Clone, Debug, Default)]
pub struct TrackerOutput {
    /// Usable targets, best first
    pub targets: Vec<Target>,
    /// Targets created this frame
    pub created: usize,
    /// Targets confirmed this frame
    pub confirmed: usize,
    /// Identities removed this frame
    pub removed: Vec<ArmorName>,
    /// Observations dropped as malformed
    pub rejected_observations: usize,
    /// Corrections that failed numerically and reset a covariance
    pub filter_resets: usize,
    /// Targets re-initialized after their estimate diverged
    pub reinitialized: usize,
}

impl TrackerOutput {
    pub fn primary(&self) -> Option<&Target> {
        self.targets.first()
    }

    fn record(&mut self, correction: Correction) {
        match correction {
            Correction::Updated => {}
            Correction::Reset => self.filter_resets += 1,
            Correction::Reinitialized => self.reinitialized += 1,
        }
    }
}

enum Correction {
    Updated,
    Reset,
    Reinitialized,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Holds one target per live identity. Not meant for concurrent updates:
/// callers feed frames one at a time, in capture order.
pub struct Tracker {
    pub config: TrackerConfig,
    targets: BTreeMap<ArmorName, Target>,
    manager: TargetManager,
    ekf: ArmorEkf,
    last_timestamp: Option<f64>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        let manager = TargetManager::new(config.lifecycle.clone());
        let ekf = ArmorEkf::new(config.filter.clone());
        Self {
            config,
            targets: BTreeMap::new(),
            manager,
            ekf,
            last_timestamp: None,
        }
    }

    /// Process the observations of one frame captured at `timestamp`.
    pub fn update(&mut self, observations: &[ArmorObservation], timestamp: f64) -> TrackerOutput {
        let mut out = TrackerOutput::default();

        let Some(now) = self.frame_time(timestamp) else {
            warn!(timestamp, "non-finite frame timestamp, frame skipped");
            out.rejected_observations = observations.len();
            out.targets = self.usable_targets();
            return out;
        };

        // ----------------------------------------------------------------
        // Step 1: validate + group by identity
        // ----------------------------------------------------------------
        let mut groups: BTreeMap<ArmorName, Vec<&ArmorObservation>> = BTreeMap::new();
        for obs in observations {
            if obs.is_finite() {
                groups.entry(obs.name).or_default().push(obs);
            } else {
                out.rejected_observations += 1;
            }
        }
        if out.rejected_observations > 0 {
            warn!(count = out.rejected_observations, "dropped non-finite observations");
        }

        // ----------------------------------------------------------------
        // Step 2: predict every target to the frame time
        // ----------------------------------------------------------------
        for target in self.targets.values_mut() {
            let dt = (now - target.last_update).max(0.0);
            let (state, cov) = self.ekf.predict(&target.state, &target.cov, dt);
            target.state = state;
            target.cov = cov;
            target.last_update = now;
        }

        // ----------------------------------------------------------------
        // Step 3-4: correct observed targets, register hits / misses
        // ----------------------------------------------------------------
        for (name, target) in self.targets.iter_mut() {
            match groups.remove(name) {
                Some(obs) => {
                    out.record(correct_target(&self.ekf, target, &obs));
                    if self.manager.register_hit(target, now) {
                        out.confirmed += 1;
                    }
                }
                None => self.manager.register_miss(target, now),
            }
        }

        // ----------------------------------------------------------------
        // Step 5: birth targets for identities seen for the first time
        // ----------------------------------------------------------------
        for (name, obs) in groups {
            let Some((first, rest)) = split_nearest(&obs) else {
                continue;
            };
            let mut target = self.manager.birth_target(first, &self.ekf, now);
            if !rest.is_empty() {
                out.record(correct_target(&self.ekf, &mut target, &rest));
            }
            self.targets.insert(name, target);
            out.created += 1;
        }

        // ----------------------------------------------------------------
        // Step 6: prune lost targets
        // ----------------------------------------------------------------
        out.removed = TargetManager::prune_lost(&mut self.targets);
        if !out.removed.is_empty() {
            debug!(removed = ?out.removed, "targets lost");
        }

        // ----------------------------------------------------------------
        // Step 7: rank
        // ----------------------------------------------------------------
        out.targets = self.usable_targets();
        out
    }

    /// All live targets, including ones still detecting.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn get(&self, name: ArmorName) -> Option<&Target> {
        self.targets.get(&name)
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Reset: clear all targets and forget the frame clock.
    pub fn reset(&mut self) {
        self.targets.clear();
        self.last_timestamp = None;
    }

    /// Monotonic frame time; a timestamp older than the previous frame is
    /// clamped so no target is ever predicted backwards.
    fn frame_time(&mut self, timestamp: f64) -> Option<f64> {
        if !timestamp.is_finite() {
            return None;
        }
        let now = match self.last_timestamp {
            Some(prev) if timestamp <= prev => {
                warn!(timestamp, previous = prev, "non-increasing frame timestamp, dt clamped to 0");
                prev
            }
            _ => timestamp,
        };
        self.last_timestamp = Some(now);
        Some(now)
    }

    fn usable_targets(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self
            .targets
            .values()
            .filter(|t| match t.status {
                TargetStatus::Tracking => true,
                TargetStatus::TempLost => self.config.report_temp_lost,
                TargetStatus::Detecting | TargetStatus::Lost => false,
            })
            .cloned()
            .collect();
        rank(&mut targets, &self.config.selection);
        targets
    }
}

/// Split off the observation closest to the gimbal; it seeds a new target.
fn split_nearest<'a>(obs: &[&'a ArmorObservation]) -> Option<(&'a ArmorObservation, Vec<&'a ArmorObservation>)> {
    fn dist(o: &ArmorObservation) -> f64 {
        o.position_vec().norm()
    }
    let (nearest, _) = obs
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| dist(a).total_cmp(&dist(b)))?;
    let rest = obs
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != nearest)
        .map(|(_, o)| *o)
        .collect();
    Some((obs[nearest], rest))
}

/// Fuse all plates seen for one target this frame.
fn correct_target(ekf: &ArmorEkf, target: &mut Target, obs: &[&ArmorObservation]) -> Correction {
    let Some(seed) = obs.first() else {
        return Correction::Updated;
    };

    if is_diverged(ekf, target) {
        warn!(name = %target.name, "state diverged before correction, re-initializing");
        reinitialize(ekf, target, seed);
        return Correction::Reinitialized;
    }

    let matches = ekf.assign_plates(&target.state, target.plates, obs);
    let meas = ekf.stack(&target.state, target.plates, &matches);
    match ekf.correct(&target.state, &target.cov, &meas) {
        Ok(res) => {
            target.state = res.state;
            target.cov = res.cov;
            target.update_count += 1;
            target.clamp_radius(ekf.config.radius_min, ekf.config.radius_max);
            if is_diverged(ekf, target) {
                warn!(name = %target.name, "state diverged after correction, re-initializing");
                reinitialize(ekf, target, seed);
                Correction::Reinitialized
            } else {
                Correction::Updated
            }
        }
        Err(e) => {
            warn!(name = %target.name, error = %e, "filter correction failed, covariance reset");
            target.cov = ekf.prior_cov();
            Correction::Reset
        }
    }
}

fn is_diverged(ekf: &ArmorEkf, target: &Target) -> bool {
    target.state.iter().any(|v| !v.is_finite())
        || target.velocity().norm() > ekf.config.max_speed
}

fn reinitialize(ekf: &ArmorEkf, target: &mut Target, obs: &ArmorObservation) {
    let (state, cov) = ekf.initial_state(obs);
    target.state = state;
    target.cov = cov;
    target.update_count = 0;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
