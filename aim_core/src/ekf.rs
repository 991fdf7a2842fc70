//! Extended Kalman filter for a rotating armor array.
//!
//! # State vector
//! x = [cx, cy, cz, vx, vy, vz, yaw, yaw_rate, radius]ᵀ
//!
//! # Motion model (linear)
//! Constant velocity for the rotation axis, constant angular velocity for
//! the armor array, random walk on the radius:
//! c += v·dt,  yaw += ω·dt
//!
//! # Measurement model (non-linear)
//! For plate `k` of `n`, with phase φ = yaw + k·2π/n:
//! h(x) = [cx + r·cos φ, cy + r·sin φ, cz, φ]
//!
//! Several plates seen in the same frame are stacked into one measurement
//! vector and fused in a single correction.
//!
//! `predict`, `measure`, `measurement_jacobian` and `correct` are free
//! functions over explicit state/covariance so they can be exercised on
//! their own; [`ArmorEkf`] binds them to a [`FilterConfig`].

use crate::{
    error::FilterError,
    types::{
        idx, wrap_angle, ArmorObservation, DMat, DVec, PlateCount, StateCov, StateVec, MEAS_DIM,
        STATE_DIM,
    },
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Noise and geometry parameters of the armor filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Radius assigned to a freshly created target (m)
    pub initial_radius: f64,
    /// Plausible radius bounds (m)
    pub radius_min: f64,
    pub radius_max: f64,
    /// Linear speed above which the estimate is considered diverged (m/s)
    pub max_speed: f64,

    /// Prior 1σ of the center position (m)
    pub init_center_std: f64,
    /// Prior 1σ of the center velocity (m/s)
    pub init_velocity_std: f64,
    /// Prior 1σ of the yaw (rad)
    pub init_yaw_std: f64,
    /// Prior 1σ of the yaw rate (rad/s)
    pub init_yaw_rate_std: f64,
    /// Prior 1σ of the radius (m)
    pub init_radius_std: f64,

    /// Linear acceleration noise (m/s²)
    pub process_accel_std: f64,
    /// Angular acceleration noise (rad/s²)
    pub process_yaw_accel_std: f64,
    /// Radius random-walk density (m/√s)
    pub process_radius_std: f64,

    /// Plate position measurement noise, per axis (m)
    pub measurement_position_std: f64,
    /// Plate yaw measurement noise (rad)
    pub measurement_yaw_std: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            initial_radius: 0.2,
            radius_min: 0.12,
            radius_max: 0.4,
            max_speed: 8.0,
            init_center_std: 0.2,
            init_velocity_std: 3.0,
            init_yaw_std: 0.4,
            init_yaw_rate_std: 8.0,
            init_radius_std: 0.08,
            process_accel_std: 4.0,
            process_yaw_accel_std: 20.0,
            process_radius_std: 0.01,
            measurement_position_std: 0.03,
            measurement_yaw_std: 0.08,
        }
    }
}

/// Process noise densities used by [`predict`].
#[derive(Clone, Copy, Debug)]
pub struct ProcessNoise {
    pub accel_std: f64,
    pub yaw_accel_std: f64,
    pub radius_std: f64,
}

impl From<&FilterConfig> for ProcessNoise {
    fn from(c: &FilterConfig) -> Self {
        Self {
            accel_std: c.process_accel_std,
            yaw_accel_std: c.process_yaw_accel_std,
            radius_std: c.process_radius_std,
        }
    }
}

/// Result of a correction step, exposed for debugging.
#[derive(Clone, Debug)]
pub struct KfUpdateResult {
    pub state: StateVec,
    pub cov: StateCov,
    /// Innovation ν = z − h(x), yaw rows wrapped
    pub innovation: DVec,
    /// Innovation covariance S = H·P·Hᵀ + R
    pub innovation_cov: DMat,
    /// Kalman gain K
    pub kalman_gain: DMat,
}

// ---------------------------------------------------------------------------
// Pure filter functions
// ---------------------------------------------------------------------------

/// State transition matrix F for timestep dt.
pub fn transition_matrix(dt: f64) -> StateCov {
    let mut f = StateCov::identity();
    f[(idx::CX, idx::VX)] = dt;
    f[(idx::CY, idx::VY)] = dt;
    f[(idx::CZ, idx::VZ)] = dt;
    f[(idx::YAW, idx::YAW_RATE)] = dt;
    f
}

/// Discrete white-noise acceleration on each (pos, vel) pair, random walk
/// on the radius.
pub fn process_noise(dt: f64, noise: &ProcessNoise) -> StateCov {
    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;

    let mut q = StateCov::zeros();
    let mut block = |p: usize, v: usize, var: f64| {
        q[(p, p)] = var * dt4 / 4.0;
        q[(p, v)] = var * dt3 / 2.0;
        q[(v, p)] = var * dt3 / 2.0;
        q[(v, v)] = var * dt2;
    };
    let a = noise.accel_std * noise.accel_std;
    block(idx::CX, idx::VX, a);
    block(idx::CY, idx::VY, a);
    block(idx::CZ, idx::VZ, a);
    block(idx::YAW, idx::YAW_RATE, noise.yaw_accel_std * noise.yaw_accel_std);
    q[(idx::RADIUS, idx::RADIUS)] = noise.radius_std * noise.radius_std * dt;
    q
}

/// Propagate state and covariance forward by `dt` seconds.
/// Negative `dt` is treated as zero.
pub fn predict(state: &StateVec, cov: &StateCov, dt: f64, noise: &ProcessNoise) -> (StateVec, StateCov) {
    let dt = dt.max(0.0);
    let f = transition_matrix(dt);
    let mut x = f * state;
    x[idx::YAW] = wrap_angle(x[idx::YAW]);
    let p = f * cov * f.transpose() + process_noise(dt, noise);
    (x, p)
}

/// Phase of plate `index` for the given state.
pub fn plate_phase(state: &StateVec, index: usize, plates: PlateCount) -> f64 {
    state[idx::YAW] + index as f64 * plates.spacing()
}

/// Expected measurement `[x, y, z, yaw]` of plate `index`.
pub fn measure(state: &StateVec, index: usize, plates: PlateCount) -> [f64; MEAS_DIM] {
    let phase = plate_phase(state, index, plates);
    let r = state[idx::RADIUS];
    [
        state[idx::CX] + r * phase.cos(),
        state[idx::CY] + r * phase.sin(),
        state[idx::CZ],
        phase,
    ]
}

/// Jacobian ∂h/∂x of [`measure`], a 4×9 block.
pub fn measurement_jacobian(state: &StateVec, index: usize, plates: PlateCount) -> DMat {
    let phase = plate_phase(state, index, plates);
    let r = state[idx::RADIUS];
    let (s, c) = phase.sin_cos();

    let mut h = DMat::zeros(MEAS_DIM, STATE_DIM);
    h[(0, idx::CX)] = 1.0;
    h[(0, idx::YAW)] = -r * s;
    h[(0, idx::RADIUS)] = c;
    h[(1, idx::CY)] = 1.0;
    h[(1, idx::YAW)] = r * c;
    h[(1, idx::RADIUS)] = s;
    h[(2, idx::CZ)] = 1.0;
    h[(3, idx::YAW)] = 1.0;
    h
}

/// EKF correction for a stacked measurement of one or more plates.
///
/// `z` and `z_hat` are laid out as consecutive `[x, y, z, yaw]` groups; the
/// yaw row of each group is wrapped before it enters the gain.
pub fn correct(
    state: &StateVec,
    cov: &StateCov,
    z: &DVec,
    z_hat: &DVec,
    h: &DMat,
    r: &DMat,
) -> Result<KfUpdateResult, FilterError> {
    let rows = z.len();
    if rows == 0
        || rows % MEAS_DIM != 0
        || z_hat.len() != rows
        || h.nrows() != rows
        || h.ncols() != STATE_DIM
        || r.nrows() != rows
        || r.ncols() != rows
    {
        return Err(FilterError::BadMeasurement { rows });
    }

    let p_dyn = DMat::from_iterator(STATE_DIM, STATE_DIM, cov.iter().copied());

    // Innovation: ν = z − h(x)
    let mut innovation = z - z_hat;
    for g in 0..rows / MEAS_DIM {
        let i = g * MEAS_DIM + 3;
        innovation[i] = wrap_angle(innovation[i]);
    }

    // Innovation covariance: S = H·P·Hᵀ + R
    let s = h * &p_dyn * h.transpose() + r;

    // Kalman gain: K = P·Hᵀ·S⁻¹
    let s_inv = s
        .clone()
        .lu()
        .try_inverse()
        .ok_or(FilterError::SingularInnovation)?;
    let k = &p_dyn * h.transpose() * &s_inv;

    let state_update = &k * &innovation;
    let mut new_state = StateVec::from_fn(|r, _| state[r] + state_update[r]);
    new_state[idx::YAW] = wrap_angle(new_state[idx::YAW]);

    // Joseph form: P' = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
    let i_kh = DMat::identity(STATE_DIM, STATE_DIM) - &k * h;
    let new_p_dyn = &i_kh * &p_dyn * i_kh.transpose() + &k * r * k.transpose();
    let new_cov = StateCov::from_iterator(new_p_dyn.iter().copied());

    if new_state.iter().any(|v| !v.is_finite()) || new_cov.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::NonFinite);
    }

    Ok(KfUpdateResult {
        state: new_state,
        cov: new_cov,
        innovation,
        innovation_cov: s,
        kalman_gain: k,
    })
}

// ---------------------------------------------------------------------------
// Filter bound to a configuration
// ---------------------------------------------------------------------------

/// An observation paired with the plate index it was attributed to.
#[derive(Clone, Copy, Debug)]
pub struct PlateMatch<'a> {
    pub index: usize,
    pub observation: &'a ArmorObservation,
    /// Wrapped angle between observed yaw and predicted phase
    pub yaw_error: f64,
}

/// Stacked measurement ready for [`correct`].
#[derive(Clone, Debug)]
pub struct StackedMeasurement {
    pub z: DVec,
    pub z_hat: DVec,
    pub h: DMat,
    pub r: DMat,
}

/// Armor EKF with its noise configuration.
#[derive(Clone, Debug)]
pub struct ArmorEkf {
    pub config: FilterConfig,
    noise: ProcessNoise,
}

impl ArmorEkf {
    pub fn new(config: FilterConfig) -> Self {
        let noise = ProcessNoise::from(&config);
        Self { config, noise }
    }

    /// Diagonal prior covariance used at creation and after a numeric reset.
    pub fn prior_cov(&self) -> StateCov {
        let c = &self.config;
        let p = c.init_center_std.powi(2);
        let v = c.init_velocity_std.powi(2);
        StateCov::from_diagonal(&StateVec::from_column_slice(&[
            p,
            p,
            p,
            v,
            v,
            v,
            c.init_yaw_std.powi(2),
            c.init_yaw_rate_std.powi(2),
            c.init_radius_std.powi(2),
        ]))
    }

    /// Initial estimate from a single plate: that plate becomes index 0 and
    /// the axis is placed `initial_radius` behind it along its normal.
    pub fn initial_state(&self, obs: &ArmorObservation) -> (StateVec, StateCov) {
        let r = self.config.initial_radius;
        let yaw = wrap_angle(obs.yaw);
        let mut x = StateVec::zeros();
        x[idx::CX] = obs.position[0] - r * yaw.cos();
        x[idx::CY] = obs.position[1] - r * yaw.sin();
        x[idx::CZ] = obs.position[2];
        x[idx::YAW] = yaw;
        x[idx::RADIUS] = r;
        (x, self.prior_cov())
    }

    pub fn predict(&self, state: &StateVec, cov: &StateCov, dt: f64) -> (StateVec, StateCov) {
        predict(state, cov, dt, &self.noise)
    }

    /// Attribute each observation to the plate whose predicted phase is
    /// closest to its yaw. When two observations claim the same plate the
    /// one with the smaller yaw error is kept.
    pub fn assign_plates<'a>(
        &self,
        state: &StateVec,
        plates: PlateCount,
        observations: &[&'a ArmorObservation],
    ) -> Vec<PlateMatch<'a>> {
        let mut candidates: Vec<PlateMatch<'a>> = observations
            .iter()
            .filter_map(|obs| {
                (0..plates.get())
                    .map(|k| PlateMatch {
                        index: k,
                        observation: *obs,
                        yaw_error: wrap_angle(obs.yaw - plate_phase(state, k, plates)),
                    })
                    .min_by(|a, b| a.yaw_error.abs().total_cmp(&b.yaw_error.abs()))
            })
            .collect();

        candidates.sort_by(|a, b| a.yaw_error.abs().total_cmp(&b.yaw_error.abs()));
        let mut used = [false; 4];
        candidates.retain(|m| {
            if used[m.index] {
                tracing::debug!(
                    name = %m.observation.name,
                    plate = m.index,
                    "two observations claim the same plate, dropping the farther one"
                );
                false
            } else {
                used[m.index] = true;
                true
            }
        });
        candidates.sort_by_key(|m| m.index);
        candidates
    }

    /// Stack the matched plates into one measurement.
    pub fn stack(&self, state: &StateVec, plates: PlateCount, matches: &[PlateMatch<'_>]) -> StackedMeasurement {
        let rows = matches.len() * MEAS_DIM;
        let mut z = DVec::zeros(rows);
        let mut z_hat = DVec::zeros(rows);
        let mut h = DMat::zeros(rows, STATE_DIM);
        let mut r = DMat::zeros(rows, rows);

        let pos_var = self.config.measurement_position_std.powi(2);
        let yaw_var = self.config.measurement_yaw_std.powi(2);

        for (g, m) in matches.iter().enumerate() {
            let row = g * MEAS_DIM;
            let expected = measure(state, m.index, plates);
            let obs = m.observation;
            let observed = [obs.position[0], obs.position[1], obs.position[2], obs.yaw];
            for i in 0..MEAS_DIM {
                z[row + i] = observed[i];
                z_hat[row + i] = expected[i];
            }
            h.view_mut((row, 0), (MEAS_DIM, STATE_DIM))
                .copy_from(&measurement_jacobian(state, m.index, plates));
            r[(row, row)] = pos_var;
            r[(row + 1, row + 1)] = pos_var;
            r[(row + 2, row + 2)] = pos_var;
            r[(row + 3, row + 3)] = yaw_var;
        }

        StackedMeasurement { z, z_hat, h, r }
    }

    pub fn correct(
        &self,
        state: &StateVec,
        cov: &StateCov,
        meas: &StackedMeasurement,
    ) -> Result<KfUpdateResult, FilterError> {
        correct(state, cov, &meas.z, &meas.z_hat, &meas.h, &meas.r)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArmorName;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn state(c: [f64; 3], v: [f64; 3], yaw: f64, w: f64, r: f64) -> StateVec {
        StateVec::from_column_slice(&[c[0], c[1], c[2], v[0], v[1], v[2], yaw, w, r])
    }

    fn noise() -> ProcessNoise {
        ProcessNoise::from(&FilterConfig::default())
    }

    #[test]
    fn predict_constant_velocity_and_rotation() {
        let x = state([1.0, 2.0, 0.1], [0.5, -1.0, 0.0], 0.2, 3.0, 0.25);
        let (xp, _) = predict(&x, &StateCov::identity(), 0.1, &noise());
        assert_abs_diff_eq!(xp[idx::CX], 1.05, epsilon = 1e-12);
        assert_abs_diff_eq!(xp[idx::CY], 1.9, epsilon = 1e-12);
        assert_abs_diff_eq!(xp[idx::YAW], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(xp[idx::YAW_RATE], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(xp[idx::RADIUS], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn predict_clamps_negative_dt() {
        let x = state([1.0, 0.0, 0.0], [2.0, 0.0, 0.0], 0.0, 1.0, 0.2);
        let p = StateCov::identity();
        let (xp, pp) = predict(&x, &p, -0.5, &noise());
        assert_eq!(xp, x);
        assert_eq!(pp, p);
    }

    #[test]
    fn predict_wraps_yaw() {
        let x = state([0.0; 3], [0.0; 3], PI - 0.05, 1.0, 0.2);
        let (xp, _) = predict(&x, &StateCov::identity(), 0.1, &noise());
        assert_abs_diff_eq!(xp[idx::YAW], -PI + 0.05, epsilon = 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let x = state([3.0, 1.0, 0.2], [0.3, 0.1, 0.0], 0.7, 2.0, 0.22);
        let plates = PlateCount::Four;
        for k in 0..4 {
            let h = measurement_jacobian(&x, k, plates);
            let eps = 1e-7;
            for j in 0..STATE_DIM {
                let mut xp = x;
                xp[j] += eps;
                let a = measure(&xp, k, plates);
                let b = measure(&x, k, plates);
                for i in 0..MEAS_DIM {
                    let numeric = (a[i] - b[i]) / eps;
                    assert_abs_diff_eq!(h[(i, j)], numeric, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn correct_reduces_uncertainty() {
        let ekf = ArmorEkf::new(FilterConfig::default());
        let x = state([3.0, 0.0, 0.1], [0.0; 3], PI, 0.0, 0.2);
        let p = ekf.prior_cov();
        let obs = ArmorObservation::new(ArmorName::Three, [2.78, 0.02, 0.11], PI - 0.02, 0.0);
        let matches = ekf.assign_plates(&x, PlateCount::Four, &[&obs]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].index, 0);

        let meas = ekf.stack(&x, PlateCount::Four, &matches);
        let res = ekf.correct(&x, &p, &meas).unwrap();
        assert!(res.cov.trace() < p.trace(), "update should reduce uncertainty");
    }

    #[test]
    fn yaw_innovation_is_wrapped() {
        let ekf = ArmorEkf::new(FilterConfig::default());
        let x = state([0.0; 3], [0.0; 3], PI - 0.01, 0.0, 0.2);
        let p = ekf.prior_cov();
        // Observed just across the ±π seam
        let obs = ArmorObservation::new(
            ArmorName::One,
            [0.2 * (-PI + 0.01).cos(), 0.2 * (-PI + 0.01).sin(), 0.0],
            -PI + 0.01,
            0.0,
        );
        let matches = ekf.assign_plates(&x, PlateCount::Four, &[&obs]);
        let meas = ekf.stack(&x, PlateCount::Four, &matches);
        let res = ekf.correct(&x, &p, &meas).unwrap();
        assert_abs_diff_eq!(res.innovation[3], 0.02, epsilon = 1e-9);
        assert!(wrap_angle(res.state[idx::YAW] - PI).abs() < 0.03);
    }

    #[test]
    fn two_plates_claiming_same_index_keep_closer() {
        let ekf = ArmorEkf::new(FilterConfig::default());
        let x = state([0.0; 3], [0.0; 3], 0.0, 0.0, 0.2);
        let near = ArmorObservation::new(ArmorName::Two, [0.2, 0.0, 0.0], 0.05, 0.0);
        let far = ArmorObservation::new(ArmorName::Two, [0.2, 0.0, 0.0], -0.3, 0.0);
        let side = ArmorObservation::new(ArmorName::Two, [0.0, 0.2, 0.0], FRAC_PI_2, 0.0);
        let matches = ekf.assign_plates(&x, PlateCount::Four, &[&far, &side, &near]);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].index, 0);
        assert_abs_diff_eq!(matches[0].observation.yaw, 0.05);
        assert_eq!(matches[1].index, 1);
    }

    #[test]
    fn singular_innovation_is_an_error() {
        let x = state([0.0; 3], [0.0; 3], 0.0, 0.0, 0.2);
        let z = DVec::from_vec(vec![0.2, 0.0, 0.0, 0.0]);
        let h = measurement_jacobian(&x, 0, PlateCount::Two);
        let r = DMat::zeros(4, 4);
        let res = correct(&x, &StateCov::zeros(), &z, &z, &h, &r);
        assert_eq!(res.unwrap_err(), FilterError::SingularInnovation);
    }

    #[test]
    fn malformed_measurement_is_rejected() {
        let x = state([0.0; 3], [0.0; 3], 0.0, 0.0, 0.2);
        let z = DVec::zeros(3);
        let res = correct(&x, &StateCov::identity(), &z, &z, &DMat::zeros(3, 9), &DMat::identity(3, 3));
        assert_eq!(res.unwrap_err(), FilterError::BadMeasurement { rows: 3 });
    }

    #[test]
    fn mismatched_jacobian_or_noise_is_rejected() {
        let x = state([0.0; 3], [0.0; 3], 0.0, 0.0, 0.2);
        let p = StateCov::identity();
        let z = DVec::zeros(4);

        // Jacobian with too few state columns
        let res = correct(&x, &p, &z, &z, &DMat::zeros(4, 5), &DMat::identity(4, 4));
        assert_eq!(res.unwrap_err(), FilterError::BadMeasurement { rows: 4 });

        // Noise sized for two plates against a one-plate measurement
        let h = measurement_jacobian(&x, 0, PlateCount::Four);
        let res = correct(&x, &p, &z, &z, &h, &DMat::identity(8, 8));
        assert_eq!(res.unwrap_err(), FilterError::BadMeasurement { rows: 4 });

        // Non-square noise
        let res = correct(&x, &p, &z, &z, &h, &DMat::identity(4, 8));
        assert_eq!(res.unwrap_err(), FilterError::BadMeasurement { rows: 4 });
    }
}
