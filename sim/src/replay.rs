//! Replay: serialize/deserialize observation logs for offline analysis.

use aim_core::metrics::GroundTruth;
use aim_core::tracker::TrackerConfig;
use aim_core::types::{ArmorName, ArmorObservation};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A full recorded simulation log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    pub frame_dt: f64,
    pub duration: f64,
    /// Identities the scenario built with two plates
    #[serde(default)]
    pub two_plate_identities: Vec<ArmorName>,
    /// All frames in chronological order
    pub frames: Vec<Frame>,
}

/// One camera frame: what the detector reported and what was really there.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    pub timestamp: f64,
    pub observations: Vec<ArmorObservation>,
    #[serde(default)]
    pub ground_truth: Vec<GroundTruth>,
}

impl ReplayLog {
    /// `base` with the log's two-plate identities added.
    pub fn tracker_config(&self, base: &TrackerConfig) -> TrackerConfig {
        let mut config = base.clone();
        for name in &self.two_plate_identities {
            if !config.lifecycle.two_plate_identities.contains(name) {
                config.lifecycle.two_plate_identities.push(*name);
            }
        }
        config
    }

    pub fn observation_count(&self) -> usize {
        self.frames.iter().map(|f| f.observations.len()).sum()
    }
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> ReplayLog {
        ReplayLog {
            scenario_name: "test".into(),
            seed: 3,
            frame_dt: 0.01,
            duration: 0.02,
            two_plate_identities: vec![ArmorName::Four],
            frames: vec![Frame {
                timestamp: 0.01,
                observations: vec![ArmorObservation::new(ArmorName::Four, [3.0, 0.1, 0.1], 2.9, 0.01)],
                ground_truth: Vec::new(),
            }],
        }
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir().join(format!("autoaim_replay_{}.json", std::process::id()));
        save_replay(&log(), &path).unwrap();
        let loaded = load_replay(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.scenario_name, "test");
        assert_eq!(loaded.observation_count(), 1);
        assert_eq!(loaded.frames[0].observations, log().frames[0].observations);
    }

    #[test]
    fn tracker_config_adds_two_plate_identities_once() {
        let mut base = TrackerConfig::default();
        base.lifecycle.two_plate_identities = vec![ArmorName::Four];
        let config = log().tracker_config(&base);
        assert_eq!(config.lifecycle.two_plate_identities, vec![ArmorName::Four]);

        let config = log().tracker_config(&TrackerConfig::default());
        assert_eq!(config.lifecycle.two_plate_identities, vec![ArmorName::Four]);
    }
}
