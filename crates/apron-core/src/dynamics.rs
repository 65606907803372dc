//! Flight dynamics collaborator interface.
//!
//! The core never integrates physics. It reads sensed state and writes
//! actuator commands through [`FlightDynamics`]; the simulator binary or a
//! test double supplies the implementation.
//!
//! Units: altitude in feet, speed in knots, vertical rate in feet per
//! minute, positions in meters.

use crate::geometry::direction_from_heading;
use glam::DVec3;
use serde::{Deserialize, Serialize};

pub trait FlightDynamics: Send {
    fn altitude(&self) -> f64;
    fn heading(&self) -> f64;
    fn speed(&self) -> f64;
    fn vertical_rate(&self) -> f64;
    fn is_grounded(&self) -> bool;
    fn position(&self) -> DVec3;
    fn thrust_input(&self) -> f64;
    fn flap_setting(&self) -> u8;
    fn trim(&self) -> f64;
    fn engine_running(&self) -> bool;

    /// Unit ground vector along the current heading.
    fn forward(&self) -> DVec3 {
        direction_from_heading(self.heading())
    }

    fn set_steer_input(&mut self, steer: f64);
    fn set_pitch_input(&mut self, pitch: f64);
    fn set_thrust_input(&mut self, thrust: f64);
    fn throttle_up(&mut self, amount: f64);
    fn throttle_down(&mut self, amount: f64);
    fn apply_brake(&mut self);
    fn release_brake(&mut self);

    fn set_auto_heading(&mut self, heading_deg: i32);
    fn set_auto_altitude(&mut self, altitude_ft: i32);
    fn set_auto_vertical_rate(&mut self, rate_fpm: i32);
    fn set_auto_heading_switch(&mut self, on: bool);
    fn set_auto_altitude_switch(&mut self, on: bool);
    fn set_auto_vertical_rate_switch(&mut self, on: bool);
    fn set_autopilot_switch(&mut self, on: bool);

    fn toggle_engine(&mut self);
    /// Extend one flap notch; returns the new setting.
    fn extend_flap(&mut self) -> u8;
    /// Retract one flap notch; returns the new setting.
    fn retract_flap(&mut self) -> u8;
    fn trim_increase(&mut self, dt: f64);
    fn trim_decrease(&mut self, dt: f64);

    /// Move the airframe directly. Used by scripted ground maneuvers.
    fn place(&mut self, position: DVec3, heading_deg: f64);
    /// Zero all velocity.
    fn stop(&mut self);
}

/// Builds dynamics for a newly spawned aircraft.
pub trait DynamicsFactory {
    fn create(&mut self, position: DVec3, heading_deg: f64, speed_kt: f64) -> Box<dyn FlightDynamics>;
}

/// Snapshot of the sensed state at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensedState {
    pub position: DVec3,
    pub heading_deg: f64,
    pub altitude_ft: f64,
    pub speed_kt: f64,
    pub vertical_rate_fpm: f64,
    pub grounded: bool,
}

impl SensedState {
    pub fn sense(dynamics: &dyn FlightDynamics) -> Self {
        Self {
            position: dynamics.position(),
            heading_deg: dynamics.heading(),
            altitude_ft: dynamics.altitude(),
            speed_kt: dynamics.speed(),
            vertical_rate_fpm: dynamics.vertical_rate(),
            grounded: dynamics.is_grounded(),
        }
    }

    pub fn forward(&self) -> DVec3 {
        direction_from_heading(self.heading_deg)
    }
}
