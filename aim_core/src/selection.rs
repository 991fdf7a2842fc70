//! Target selection: which tracked robot to aim at.
//!
//! Pure functions over a slice of targets. TRACKING targets always rank
//! ahead of TEMP_LOST ones; the policy orders targets within each group.

use crate::{
    target::{Target, TargetStatus},
    types::ArmorName,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordering key applied among usable targets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Smallest horizontal distance from the gimbal first
    #[default]
    Nearest,
    /// Highest confidence first, then nearest
    HighestConfidence,
    /// Listed identities in list order, unlisted last, then nearest
    Priority(Vec<ArmorName>),
}

fn status_rank(status: TargetStatus) -> u8 {
    match status {
        TargetStatus::Tracking => 0,
        TargetStatus::TempLost => 1,
        TargetStatus::Detecting => 2,
        TargetStatus::Lost => 3,
    }
}

fn by_distance(a: &Target, b: &Target) -> Ordering {
    a.horizontal_distance().total_cmp(&b.horizontal_distance())
}

/// Comparison used by [`rank`].
pub fn compare(a: &Target, b: &Target, policy: &SelectionPolicy) -> Ordering {
    let status = status_rank(a.status).cmp(&status_rank(b.status));
    if status != Ordering::Equal {
        return status;
    }
    match policy {
        SelectionPolicy::Nearest => by_distance(a, b),
        SelectionPolicy::HighestConfidence => b
            .confidence()
            .total_cmp(&a.confidence())
            .then_with(|| by_distance(a, b)),
        SelectionPolicy::Priority(order) => {
            let pos = |t: &Target| order.iter().position(|n| *n == t.name).unwrap_or(order.len());
            pos(a).cmp(&pos(b)).then_with(|| by_distance(a, b))
        }
    }
}

/// Sort targets best-first.
pub fn rank(targets: &mut [Target], policy: &SelectionPolicy) {
    targets.sort_by(|a, b| compare(a, b, policy));
}

/// Best usable target, if any.
pub fn select<'a>(targets: &'a [Target], policy: &SelectionPolicy) -> Option<&'a Target> {
    targets
        .iter()
        .filter(|t| t.is_usable())
        .min_by(|a, b| compare(a, b, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlateCount, StateCov, StateVec};

    fn target(name: ArmorName, x: f64, status: TargetStatus, misses: u32) -> Target {
        let state = StateVec::from_column_slice(&[x, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.2]);
        Target {
            status,
            miss_count: misses,
            ..Target::new(name, PlateCount::Four, state, StateCov::identity(), 0.0)
        }
    }

    #[test]
    fn nearest_puts_tracking_first() {
        let mut ts = vec![
            target(ArmorName::One, 2.0, TargetStatus::TempLost, 1),
            target(ArmorName::Two, 5.0, TargetStatus::Tracking, 0),
            target(ArmorName::Three, 3.0, TargetStatus::Tracking, 0),
        ];
        rank(&mut ts, &SelectionPolicy::Nearest);
        let names: Vec<_> = ts.iter().map(|t| t.name).collect();
        assert_eq!(names, vec![ArmorName::Three, ArmorName::Two, ArmorName::One]);
    }

    #[test]
    fn priority_overrides_distance() {
        let ts = vec![
            target(ArmorName::One, 2.0, TargetStatus::Tracking, 0),
            target(ArmorName::Sentry, 6.0, TargetStatus::Tracking, 0),
            target(ArmorName::Four, 1.0, TargetStatus::Tracking, 0),
        ];
        let policy = SelectionPolicy::Priority(vec![ArmorName::Sentry, ArmorName::One]);
        assert_eq!(select(&ts, &policy).map(|t| t.name), Some(ArmorName::Sentry));
    }

    #[test]
    fn confidence_prefers_fewer_misses() {
        let ts = vec![
            target(ArmorName::One, 1.0, TargetStatus::TempLost, 4),
            target(ArmorName::Two, 4.0, TargetStatus::TempLost, 1),
        ];
        let best = select(&ts, &SelectionPolicy::HighestConfidence).unwrap();
        assert_eq!(best.name, ArmorName::Two);
    }

    #[test]
    fn select_skips_unusable() {
        let ts = vec![target(ArmorName::One, 1.0, TargetStatus::Detecting, 0)];
        assert!(select(&ts, &SelectionPolicy::Nearest).is_none());
    }

    #[test]
    fn policy_parses_from_yaml() {
        use serde_yaml::with::singleton_map;
        let parse = |yaml: &str| -> SelectionPolicy {
            singleton_map::deserialize(serde_yaml::Deserializer::from_str(yaml)).unwrap()
        };
        assert_eq!(parse("nearest"), SelectionPolicy::Nearest);
        assert_eq!(
            parse("priority: [sentry, three]"),
            SelectionPolicy::Priority(vec![ArmorName::Sentry, ArmorName::Three])
        );
    }
}
