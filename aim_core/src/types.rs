//! Fundamental types used across the entire workspace.

use nalgebra::{DMatrix, DVector, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: f64 throughout for numerical precision in the filter.
// ---------------------------------------------------------------------------

/// Dimension of the target state vector.
pub const STATE_DIM: usize = 9;

/// Rows contributed to the stacked measurement by one observed plate.
pub const MEAS_DIM: usize = 4;

/// Target state: [cx, cy, cz, vx, vy, vz, yaw, yaw_rate, radius]
pub type StateVec = SVector<f64, STATE_DIM>;

/// 9×9 state covariance matrix
pub type StateCov = SMatrix<f64, STATE_DIM, STATE_DIM>;

/// Dynamic-size vector (stacked multi-plate measurement)
pub type DVec = DVector<f64>;

/// Dynamic-size matrix (stacked H, R, S)
pub type DMat = DMatrix<f64>;

/// Index of each component inside [`StateVec`].
pub mod idx {
    pub const CX: usize = 0;
    pub const CY: usize = 1;
    pub const CZ: usize = 2;
    pub const VX: usize = 3;
    pub const VY: usize = 4;
    pub const VZ: usize = 5;
    pub const YAW: usize = 6;
    pub const YAW_RATE: usize = 7;
    pub const RADIUS: usize = 8;
}

/// Wrap an angle into (-π, π].
pub fn wrap_angle(a: f64) -> f64 {
    let w = (a + PI).rem_euclid(TAU) - PI;
    if w <= -PI {
        w + TAU
    } else {
        w
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Robot class an armor plate is attributed to by the detector.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ArmorName {
    One,
    Two,
    Three,
    Four,
    Five,
    Sentry,
    Outpost,
    Base,
}

impl ArmorName {
    pub const ALL: [ArmorName; 8] = [
        ArmorName::One,
        ArmorName::Two,
        ArmorName::Three,
        ArmorName::Four,
        ArmorName::Five,
        ArmorName::Sentry,
        ArmorName::Outpost,
        ArmorName::Base,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArmorName::One => "one",
            ArmorName::Two => "two",
            ArmorName::Three => "three",
            ArmorName::Four => "four",
            ArmorName::Five => "five",
            ArmorName::Sentry => "sentry",
            ArmorName::Outpost => "outpost",
            ArmorName::Base => "base",
        }
    }
}

impl fmt::Display for ArmorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of armor plates mounted around a robot's rotation axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateCount {
    Two,
    Four,
}

impl PlateCount {
    pub fn get(self) -> usize {
        match self {
            PlateCount::Two => 2,
            PlateCount::Four => 4,
        }
    }

    /// Angular spacing between adjacent plates (radians).
    pub fn spacing(self) -> f64 {
        TAU / self.get() as f64
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One detected armor plate with its solved 3D pose, in the gimbal frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArmorObservation {
    pub name: ArmorName,
    /// Plate center (meters), z up
    pub position: [f64; 3],
    /// Yaw of the plate's outward face normal (radians)
    pub yaw: f64,
    /// Capture time of the frame (seconds, monotonic)
    pub timestamp: f64,
}

impl ArmorObservation {
    pub fn new(name: ArmorName, position: [f64; 3], yaw: f64, timestamp: f64) -> Self {
        Self {
            name,
            position,
            yaw,
            timestamp,
        }
    }

    pub fn position_vec(&self) -> Vector3<f64> {
        Vector3::new(self.position[0], self.position[1], self.position[2])
    }

    /// False when any component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite()) && self.yaw.is_finite()
    }
}

/// Instantaneous pose of one plate, extrapolated from a target's state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArmorPose {
    /// Stable plate index in `[0, plate_count)`
    pub index: usize,
    pub position: Vector3<f64>,
    /// Plate phase (face normal yaw), not wrapped
    pub yaw: f64,
}

impl ArmorPose {
    /// `(x, y, z, yaw)` tuple.
    pub fn xyza(&self) -> [f64; 4] {
        [self.position.x, self.position.y, self.position.z, self.yaw]
    }

    /// Horizontal distance from the gimbal.
    pub fn horizontal_distance(&self) -> f64 {
        self.position.x.hypot(self.position.y)
    }
}
