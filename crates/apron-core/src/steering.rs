//! Heading-hold steering and the taxi speed governor.
//!
//! The steering loop is an incremental (velocity-form) PID that keeps the
//! unclamped output between ticks and feeds the clamped value to the nose
//! wheel. Speed is not a PID: the governor toggles between throttle-up and
//! braking around a target taken from a small table.

use crate::config::SimConfig;
use crate::dynamics::FlightDynamics;
use crate::geometry::signed_angle_deg;
use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 40.0,
            ki: 0.0,
            kd: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SteeringPid {
    gains: PidGains,
    output: f64,
    last_error: f64,
    last_last_error: f64,
}

impl SteeringPid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            ..Self::default()
        }
    }

    /// Forget accumulated output and error history.
    pub fn reset(&mut self) {
        self.output = 0.0;
        self.last_error = 0.0;
        self.last_last_error = 0.0;
    }

    /// Unclamped accumulated output.
    pub fn raw_output(&self) -> f64 {
        self.output
    }

    /// Advance the recurrence with a new error sample and return the
    /// actuator command in `[-1, 1]`.
    ///
    /// `u[t] = u[t-1] + (Kp + Ki*dt + Kd/dt) e[t] - (Kp + 2Kd/dt) e[t-1] + (Kd/dt) e[t-2]`
    ///
    /// With `dt <= 0` the integral and derivative terms drop out.
    pub fn update(&mut self, error: f64, dt: f64) -> f64 {
        let PidGains { kp, ki, kd } = self.gains;
        let (ki_dt, kd_over_dt) = if dt > 0.0 { (ki * dt, kd / dt) } else { (0.0, 0.0) };

        self.output += (kp + ki_dt + kd_over_dt) * error
            - (kp + 2.0 * kd_over_dt) * self.last_error
            + kd_over_dt * self.last_last_error;

        self.last_last_error = self.last_error;
        self.last_error = error;
        self.output.clamp(-1.0, 1.0)
    }

    /// Steer from `position` along `forward` toward `target`.
    pub fn steer_toward(
        &mut self,
        forward: DVec3,
        position: DVec3,
        target: DVec3,
        dt: f64,
    ) -> SteerCommand {
        let error_deg = heading_error(forward, position, target);
        let steer = self.update(error_deg, dt);
        SteerCommand { error_deg, steer }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerCommand {
    /// Heading error fed to the loop; negative when the target is to the right
    pub error_deg: f64,
    /// Clamped steering input
    pub steer: f64,
}

/// Heading error toward `target` on the ground plane.
///
/// A target to the right of the current heading gives a negative error, one
/// to the left a positive error.
pub fn heading_error(forward: DVec3, position: DVec3, target: DVec3) -> f64 {
    -signed_angle_deg(forward, target - position)
}

/// Taxi speed in knots for the distance to the next waypoint and the
/// current heading error.
pub fn target_taxi_speed(distance_m: f64, error_deg: f64, config: &SimConfig) -> f64 {
    let misaligned = error_deg.abs() > config.misalignment_deg;
    match (distance_m < config.slow_zone_m, misaligned) {
        (true, true) => 2.0,
        (true, false) => 4.0,
        (false, true) => 3.0,
        (false, false) => 15.0,
    }
}

/// Bang-bang speed governor: throttle up below `target_kt`, brake otherwise.
pub fn govern_speed(dynamics: &mut dyn FlightDynamics, target_kt: f64, dt: f64) {
    if dynamics.speed() < target_kt {
        dynamics.throttle_up(dt / 3.0);
        dynamics.release_brake();
    } else {
        dynamics.throttle_down(dt);
        dynamics.apply_brake();
    }
}
