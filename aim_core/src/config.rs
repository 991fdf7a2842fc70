//! YAML configuration for the tracker, trajectory solver and aimer.
//!
//! Every field has a default, so an empty file (or a partial one) is valid:
//!
//! ```yaml
//! tracker:
//!   lifecycle:
//!     confirm_frames: 3
//!     lost_after_misses: 10
//!     two_plate_identities: [three]
//!   filter:
//!     measurement_position_std: 0.03
//!   selection: nearest
//! trajectory:
//!   drag_coefficient: 0.019
//! aimer:
//!   shoot_delay: 0.05
//! ```

use crate::{
    aimer::{Aimer, AimerConfig},
    error::ConfigError,
    tracker::TrackerConfig,
    trajectory::TrajectorySolver,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AimConfig {
    pub tracker: TrackerConfig,
    pub trajectory: TrajectorySolver,
    pub aimer: AimerConfig,
}

impl AimConfig {
    /// Parse and validate a YAML document.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lifecycle = &self.tracker.lifecycle;
        let filter = &self.tracker.filter;
        let traj = &self.trajectory;

        if lifecycle.confirm_frames == 0 {
            return invalid("tracker.lifecycle.confirm_frames must be at least 1");
        }
        if lifecycle.lost_after_misses == 0 {
            return invalid("tracker.lifecycle.lost_after_misses must be at least 1");
        }
        if lifecycle.lost_timeout.is_some_and(|t| !(t > 0.0)) {
            return invalid("tracker.lifecycle.lost_timeout must be positive");
        }
        if !(filter.radius_min > 0.0 && filter.radius_min <= filter.radius_max) {
            return invalid("tracker.filter radius bounds must satisfy 0 < radius_min <= radius_max");
        }
        if !(filter.radius_min..=filter.radius_max).contains(&filter.initial_radius) {
            return invalid("tracker.filter.initial_radius must lie within the radius bounds");
        }
        let stds = [
            filter.init_center_std,
            filter.init_velocity_std,
            filter.init_yaw_std,
            filter.init_yaw_rate_std,
            filter.init_radius_std,
            filter.measurement_position_std,
            filter.measurement_yaw_std,
        ];
        if stds.iter().any(|s| !(*s > 0.0)) {
            return invalid("tracker.filter prior and measurement deviations must be positive");
        }
        let process = [
            filter.process_accel_std,
            filter.process_yaw_accel_std,
            filter.process_radius_std,
        ];
        if process.iter().any(|s| !(*s >= 0.0)) {
            return invalid("tracker.filter process noise must be non-negative");
        }
        if !(filter.max_speed > 0.0) {
            return invalid("tracker.filter.max_speed must be positive");
        }

        if !(traj.gravity > 0.0) {
            return invalid("trajectory.gravity must be positive");
        }
        if !(traj.drag_coefficient >= 0.0) {
            return invalid("trajectory.drag_coefficient must be non-negative");
        }
        if !(traj.tolerance > 0.0) {
            return invalid("trajectory.tolerance must be positive");
        }
        if !(traj.integration_step > 0.0 && traj.max_fly_time > traj.integration_step) {
            return invalid("trajectory.integration_step must be positive and below max_fly_time");
        }

        if !(self.aimer.shoot_delay >= 0.0) {
            return invalid("aimer.shoot_delay must be non-negative");
        }
        if !(self.aimer.lead_tolerance > 0.0) || self.aimer.max_lead_iterations == 0 {
            return invalid("aimer needs a positive lead_tolerance and at least one iteration");
        }
        Ok(())
    }

    pub fn build_aimer(&self) -> Aimer {
        Aimer::new(self.aimer.clone(), self.trajectory.clone())
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Validation(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{selection::SelectionPolicy, trajectory::STANDARD_GRAVITY, types::ArmorName};

    #[test]
    fn empty_document_gives_defaults() {
        let config = AimConfig::parse("{}").unwrap();
        assert_eq!(config.tracker.lifecycle.confirm_frames, 3);
        assert_eq!(config.trajectory.gravity, STANDARD_GRAVITY);
        assert_eq!(config.trajectory.drag_coefficient, 0.0);
        assert!(config.tracker.report_temp_lost);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let yaml = r#"
tracker:
  lifecycle:
    confirm_frames: 5
    lost_timeout: 0.3
    two_plate_identities: [three, four]
  filter:
    radius_max: 0.35
  selection:
    priority: [sentry]
trajectory:
  drag_coefficient: 0.019
aimer:
  shoot_delay: 0.1
"#;
        let config = AimConfig::parse(yaml).unwrap();
        assert_eq!(config.tracker.lifecycle.confirm_frames, 5);
        assert_eq!(config.tracker.lifecycle.lost_timeout, Some(0.3));
        assert_eq!(
            config.tracker.lifecycle.two_plate_identities,
            vec![ArmorName::Three, ArmorName::Four]
        );
        assert_eq!(config.tracker.filter.radius_max, 0.35);
        assert_eq!(config.tracker.filter.radius_min, 0.12);
        assert_eq!(
            config.tracker.selection,
            SelectionPolicy::Priority(vec![ArmorName::Sentry])
        );
        assert_eq!(config.trajectory.drag_coefficient, 0.019);
        assert_eq!(config.aimer.shoot_delay, 0.1);
        assert_eq!(config.aimer.max_lead_iterations, 10);
    }

    #[test]
    fn rejects_invalid_values() {
        for yaml in [
            "tracker: { lifecycle: { confirm_frames: 0 } }",
            "tracker: { filter: { radius_min: 0.5, radius_max: 0.2 } }",
            "trajectory: { drag_coefficient: -0.1 }",
            "trajectory: { gravity: 0.0 }",
            "trajectory: { tolerance: 0.0 }",
            "aimer: { max_lead_iterations: 0 }",
        ] {
            assert!(
                matches!(AimConfig::parse(yaml), Err(ConfigError::Validation(_))),
                "accepted: {yaml}"
            );
        }
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        assert!(matches!(
            AimConfig::parse("tracker: [not, a, map]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = AimConfig::load_from(Path::new("/nonexistent/autoaim.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn default_round_trips_through_yaml() {
        let yaml = AimConfig::default().to_yaml().unwrap();
        let back = AimConfig::parse(&yaml).unwrap();
        assert_eq!(back.trajectory, TrajectorySolver::default());
        assert_eq!(back.aimer, AimerConfig::default());
    }
}
