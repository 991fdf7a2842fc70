//! Ballistic trajectory solver: barrel pitch and flight time to a point.
//!
//! # Model
//! Point-mass projectile under gravity with optional quadratic drag:
//! a = −k·|v|·v − g·ẑ
//!
//! # Method
//! - k = 0: closed form. With u = tan θ the hit condition
//!   h = d·u − g·d²·(1 + u²) / (2v²) is quadratic in u; the root with the
//!   shorter flight time (low arc) is returned.
//! - k > 0: start from the closed-form pitch, integrate the trajectory
//!   (RK4) to the target plane, and correct the pitch with Newton steps on
//!   the height error until it is within `tolerance`, or fail after
//!   `max_iterations`.
//!
//! The solver holds no mutable state and can be shared across threads.

use crate::error::TrajectoryError;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Gravitational acceleration used by default (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.7833;

/// Pitch step used for the finite-difference slope (rad).
const SLOPE_STEP: f64 = 1e-6;

/// Pitch is kept strictly inside (−π/2, π/2).
const MAX_PITCH: f64 = FRAC_PI_2 - 1e-3;

/// A solvable firing solution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trajectory {
    /// Barrel elevation above horizontal (rad)
    pub pitch: f64,
    /// Time of flight to the aim point (s)
    pub fly_time: f64,
}

/// `Err` is the unsolvable case; pitch and fly time only exist on `Ok`.
pub type TrajectoryResult = Result<Trajectory, TrajectoryError>;

/// Solver parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectorySolver {
    /// m/s²
    pub gravity: f64,
    /// Quadratic drag coefficient k (1/m); 0 disables drag
    pub drag_coefficient: f64,
    /// Accepted height error at the target (m)
    pub tolerance: f64,
    /// Newton iteration cap (drag only)
    pub max_iterations: usize,
    /// RK4 step (s)
    pub integration_step: f64,
    /// Flights longer than this are treated as never arriving (s)
    pub max_fly_time: f64,
}

impl Default for TrajectorySolver {
    fn default() -> Self {
        Self {
            gravity: STANDARD_GRAVITY,
            drag_coefficient: 0.0,
            tolerance: 1e-4,
            max_iterations: 20,
            integration_step: 1e-3,
            max_fly_time: 3.0,
        }
    }
}

/// Solve with the default drag-free solver.
pub fn solve(muzzle_speed: f64, distance: f64, height: f64) -> TrajectoryResult {
    TrajectorySolver::default().solve(muzzle_speed, distance, height)
}

#[derive(Clone, Copy, Debug)]
struct Projectile {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

impl TrajectorySolver {
    pub fn with_drag(drag_coefficient: f64) -> Self {
        Self {
            drag_coefficient,
            ..Default::default()
        }
    }

    /// Pitch and flight time needed to hit a point `distance` meters away
    /// horizontally and `height` meters above the muzzle.
    pub fn solve(&self, muzzle_speed: f64, distance: f64, height: f64) -> TrajectoryResult {
        let valid = muzzle_speed.is_finite()
            && distance.is_finite()
            && height.is_finite()
            && muzzle_speed > 0.0
            && self.gravity > 0.0;
        if !valid {
            return Err(TrajectoryError::InvalidInput {
                speed: muzzle_speed,
                distance,
                height,
            });
        }
        if distance <= 0.0 {
            return Err(TrajectoryError::BehindMuzzle(distance));
        }

        let vacuum = self.solve_vacuum(muzzle_speed, distance, height)?;
        if self.drag_coefficient <= 0.0 {
            return Ok(vacuum);
        }
        self.refine_with_drag(muzzle_speed, distance, height, vacuum.pitch)
    }

    fn solve_vacuum(&self, v: f64, d: f64, h: f64) -> TrajectoryResult {
        let a = self.gravity * d * d / (2.0 * v * v);
        let b = -d;
        let c = a + h;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return Err(TrajectoryError::OutOfRange { speed: v });
        }

        // Smaller tan gives the flatter arc and the shorter flight.
        let tan_pitch = (-b - disc.sqrt()) / (2.0 * a);
        let pitch = tan_pitch.atan();
        Ok(Trajectory {
            pitch,
            fly_time: d / (v * pitch.cos()),
        })
    }

    fn refine_with_drag(&self, v: f64, d: f64, h: f64, start: f64) -> TrajectoryResult {
        let out_of_range = TrajectoryError::OutOfRange { speed: v };
        let mut pitch = start;

        for _ in 0..self.max_iterations {
            let (y, t) = self.height_at(v, pitch, d).ok_or_else(|| out_of_range.clone())?;
            let err = h - y;
            if err.abs() < self.tolerance {
                return Ok(Trajectory { pitch, fly_time: t });
            }

            let (y_up, _) = self
                .height_at(v, pitch + SLOPE_STEP, d)
                .ok_or_else(|| out_of_range.clone())?;
            let slope = (y_up - y) / SLOPE_STEP;
            if slope <= 0.0 {
                // past the maximum-range elevation
                return Err(out_of_range);
            }
            pitch = (pitch + err / slope).clamp(-MAX_PITCH, MAX_PITCH);
        }

        Err(TrajectoryError::NotConverged {
            iterations: self.max_iterations,
        })
    }

    /// Integrate a shot fired at `pitch` until it crosses `distance`.
    /// Returns `(height, time)` at the crossing, or `None` if the projectile
    /// stalls or takes longer than `max_fly_time`.
    pub fn height_at(&self, muzzle_speed: f64, pitch: f64, distance: f64) -> Option<(f64, f64)> {
        let (s, c) = pitch.sin_cos();
        let mut p = Projectile {
            x: 0.0,
            y: 0.0,
            vx: muzzle_speed * c,
            vy: muzzle_speed * s,
        };
        let mut t = 0.0;
        let step = self.integration_step.max(1e-6);
        let max_steps = (self.max_fly_time / step).ceil() as usize + 16;

        for _ in 0..max_steps {
            let remaining = distance - p.x;
            if remaining <= 1e-9 {
                return Some((p.y, t));
            }
            if p.vx <= 0.0 || t > self.max_fly_time {
                return None;
            }
            let h = step.min(remaining / p.vx);
            p = self.rk4(p, h);
            t += h;
        }
        None
    }

    fn derivative(&self, p: &Projectile) -> Projectile {
        let speed = p.vx.hypot(p.vy);
        let k = self.drag_coefficient;
        Projectile {
            x: p.vx,
            y: p.vy,
            vx: -k * speed * p.vx,
            vy: -self.gravity - k * speed * p.vy,
        }
    }

    fn rk4(&self, p: Projectile, h: f64) -> Projectile {
        let add = |a: &Projectile, d: &Projectile, s: f64| Projectile {
            x: a.x + d.x * s,
            y: a.y + d.y * s,
            vx: a.vx + d.vx * s,
            vy: a.vy + d.vy * s,
        };
        let k1 = self.derivative(&p);
        let k2 = self.derivative(&add(&p, &k1, h / 2.0));
        let k3 = self.derivative(&add(&p, &k2, h / 2.0));
        let k4 = self.derivative(&add(&p, &k3, h));
        Projectile {
            x: p.x + h / 6.0 * (k1.x + 2.0 * k2.x + 2.0 * k3.x + k4.x),
            y: p.y + h / 6.0 * (k1.y + 2.0 * k2.y + 2.0 * k3.y + k4.y),
            vx: p.vx + h / 6.0 * (k1.vx + 2.0 * k2.vx + 2.0 * k3.vx + k4.vx),
            vy: p.vy + h / 6.0 * (k1.vy + 2.0 * k2.vy + 2.0 * k3.vy + k4.vy),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
