//! Point-mass airframe for headless runs.
//!
//! Enough to follow the scripted ground maneuvers and the autopilot, not an
//! aerodynamic model. Bodies are shared between the fleet
//! (through [`FlightDynamics`]) and the factory, which integrates every live
//! body once per frame.

use apron_core::geometry::{direction_from_heading, normalize_heading, METERS_PER_FOOT, MPS_PER_KNOT};
use apron_core::{DynamicsFactory, FlightDynamics};
use glam::DVec3;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Ground acceleration at full thrust, knots per second.
const GROUND_ACCEL_KTPS: f64 = 4.0;
const ROLL_DRAG_KTPS: f64 = 0.4;
const BRAKE_KTPS: f64 = 6.0;
const TAXI_YAW_RATE_DEG: f64 = 20.0;
const ROTATE_SPEED_KT: f64 = 55.0;
const LIFTOFF_RATE_FPM: f64 = 500.0;
/// Standard-rate turn.
const TURN_RATE_DEG: f64 = 3.0;
const DEFAULT_CLIMB_FPM: f64 = 700.0;
const MAX_FLAPS: u8 = 3;
const TRIM_RATE: f64 = 1.0;

#[derive(Debug, Clone, Default)]
struct Autopilot {
    heading: i32,
    altitude: i32,
    vertical_rate: i32,
    heading_on: bool,
    altitude_on: bool,
    vertical_rate_on: bool,
    master: bool,
}

#[derive(Debug, Clone)]
pub struct PointMass {
    position: DVec3,
    heading: f64,
    speed_kt: f64,
    vertical_rate_fpm: f64,
    grounded: bool,
    ground_ft: f64,

    thrust: f64,
    flaps: u8,
    trim: f64,
    engine: bool,
    brake: bool,
    steer: f64,
    pitch: f64,
    autopilot: Autopilot,
}

impl PointMass {
    pub fn new(position: DVec3, heading_deg: f64, speed_kt: f64, ground_ft: f64) -> Self {
        Self {
            position,
            heading: normalize_heading(heading_deg),
            speed_kt,
            vertical_rate_fpm: 0.0,
            grounded: position.y / METERS_PER_FOOT <= ground_ft + 1.0,
            ground_ft,
            thrust: 0.0,
            flaps: 0,
            trim: 0.0,
            engine: speed_kt > 0.0,
            brake: false,
            steer: 0.0,
            pitch: 0.0,
            autopilot: Autopilot::default(),
        }
    }

    fn altitude_ft(&self) -> f64 {
        self.position.y / METERS_PER_FOOT
    }

    /// Integrate one frame.
    pub fn step(&mut self, dt: f64) {
        if self.grounded {
            self.roll(dt);
        } else {
            self.fly(dt);
        }

        let travel = direction_from_heading(self.heading) * self.speed_kt * MPS_PER_KNOT * dt;
        self.position += travel;
        if !self.grounded {
            self.position.y += self.vertical_rate_fpm / 60.0 * METERS_PER_FOOT * dt;
            if self.altitude_ft() <= self.ground_ft {
                self.position.y = self.ground_ft * METERS_PER_FOOT;
                self.vertical_rate_fpm = 0.0;
                self.grounded = true;
            }
        }
    }

    fn roll(&mut self, dt: f64) {
        let push = if self.engine {
            self.thrust * GROUND_ACCEL_KTPS
        } else {
            0.0
        };
        let drag = ROLL_DRAG_KTPS + if self.brake { BRAKE_KTPS } else { 0.0 };
        self.speed_kt = (self.speed_kt + (push - drag) * dt).max(0.0);

        // Nose wheel authority fades in over the first few knots
        let authority = (self.speed_kt / 5.0).min(1.0);
        self.heading = normalize_heading(self.heading - self.steer * TAXI_YAW_RATE_DEG * authority * dt);

        if self.speed_kt >= ROTATE_SPEED_KT && self.thrust > 0.9 && !self.brake {
            self.grounded = false;
            self.vertical_rate_fpm = LIFTOFF_RATE_FPM;
        }
    }

    fn fly(&mut self, dt: f64) {
        let ap = &self.autopilot;
        if ap.master && ap.heading_on {
            let error = signed_turn(self.heading, f64::from(ap.heading));
            let turn = error.clamp(-TURN_RATE_DEG * dt, TURN_RATE_DEG * dt);
            self.heading = normalize_heading(self.heading + turn);
        }

        let target_rate = if ap.master && ap.altitude_on {
            let limit = if ap.vertical_rate_on {
                f64::from(ap.vertical_rate.abs())
            } else {
                DEFAULT_CLIMB_FPM
            };
            ((f64::from(ap.altitude) - self.altitude_ft()) * 5.0).clamp(-limit, limit)
        } else {
            (self.thrust - 0.55) * 1500.0 - self.pitch * 10_000.0 + self.trim * 30.0
        };
        self.vertical_rate_fpm += (target_rate - self.vertical_rate_fpm) * (dt / 2.0).min(1.0);

        let engine = if self.engine { self.thrust } else { 0.0 };
        let target_speed = 45.0 + 45.0 * engine - 2.0 * f64::from(self.flaps);
        self.speed_kt += (target_speed - self.speed_kt) * (dt / 8.0).min(1.0);
    }
}

/// Shortest signed turn from `from` to `to`, positive clockwise.
fn signed_turn(from: f64, to: f64) -> f64 {
    (to - from + 540.0).rem_euclid(360.0) - 180.0
}

/// Handle the fleet owns; the factory keeps a weak reference to integrate it.
#[derive(Debug, Clone)]
pub struct SharedBody(Arc<Mutex<PointMass>>);

impl SharedBody {
    fn body(&self) -> MutexGuard<'_, PointMass> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FlightDynamics for SharedBody {
    fn altitude(&self) -> f64 {
        self.body().altitude_ft()
    }
    fn heading(&self) -> f64 {
        self.body().heading
    }
    fn speed(&self) -> f64 {
        self.body().speed_kt
    }
    fn vertical_rate(&self) -> f64 {
        self.body().vertical_rate_fpm
    }
    fn is_grounded(&self) -> bool {
        self.body().grounded
    }
    fn position(&self) -> DVec3 {
        self.body().position
    }
    fn thrust_input(&self) -> f64 {
        self.body().thrust
    }
    fn flap_setting(&self) -> u8 {
        self.body().flaps
    }
    fn trim(&self) -> f64 {
        self.body().trim
    }
    fn engine_running(&self) -> bool {
        self.body().engine
    }

    fn set_steer_input(&mut self, steer: f64) {
        self.body().steer = steer.clamp(-1.0, 1.0);
    }
    fn set_pitch_input(&mut self, pitch: f64) {
        self.body().pitch = pitch;
    }
    fn set_thrust_input(&mut self, thrust: f64) {
        self.body().thrust = thrust.clamp(0.0, 1.0);
    }
    fn throttle_up(&mut self, amount: f64) {
        let mut body = self.body();
        body.thrust = (body.thrust + amount).min(1.0);
    }
    fn throttle_down(&mut self, amount: f64) {
        let mut body = self.body();
        body.thrust = (body.thrust - amount).max(0.0);
    }
    fn apply_brake(&mut self) {
        self.body().brake = true;
    }
    fn release_brake(&mut self) {
        self.body().brake = false;
    }

    fn set_auto_heading(&mut self, heading_deg: i32) {
        self.body().autopilot.heading = heading_deg;
    }
    fn set_auto_altitude(&mut self, altitude_ft: i32) {
        self.body().autopilot.altitude = altitude_ft;
    }
    fn set_auto_vertical_rate(&mut self, rate_fpm: i32) {
        self.body().autopilot.vertical_rate = rate_fpm;
    }
    fn set_auto_heading_switch(&mut self, on: bool) {
        self.body().autopilot.heading_on = on;
    }
    fn set_auto_altitude_switch(&mut self, on: bool) {
        self.body().autopilot.altitude_on = on;
    }
    fn set_auto_vertical_rate_switch(&mut self, on: bool) {
        self.body().autopilot.vertical_rate_on = on;
    }
    fn set_autopilot_switch(&mut self, on: bool) {
        self.body().autopilot.master = on;
    }

    fn toggle_engine(&mut self) {
        let mut body = self.body();
        body.engine = !body.engine;
    }
    fn extend_flap(&mut self) -> u8 {
        let mut body = self.body();
        body.flaps = (body.flaps + 1).min(MAX_FLAPS);
        body.flaps
    }
    fn retract_flap(&mut self) -> u8 {
        let mut body = self.body();
        body.flaps = body.flaps.saturating_sub(1);
        body.flaps
    }
    fn trim_increase(&mut self, dt: f64) {
        self.body().trim += TRIM_RATE * dt;
    }
    fn trim_decrease(&mut self, dt: f64) {
        self.body().trim -= TRIM_RATE * dt;
    }

    fn place(&mut self, position: DVec3, heading_deg: f64) {
        let mut body = self.body();
        body.position = position;
        body.heading = normalize_heading(heading_deg);
    }
    fn stop(&mut self) {
        let mut body = self.body();
        body.speed_kt = 0.0;
        body.vertical_rate_fpm = 0.0;
    }
}

/// Creates point-mass bodies and steps the ones still alive.
#[derive(Debug, Default)]
pub struct KinematicFactory {
    ground_ft: f64,
    bodies: Vec<Weak<Mutex<PointMass>>>,
}

impl KinematicFactory {
    pub fn new(ground_ft: f64) -> Self {
        Self {
            ground_ft,
            bodies: Vec::new(),
        }
    }

    /// Integrate every body whose aircraft still exists.
    pub fn advance(&mut self, dt: f64) {
        self.bodies.retain(|weak| weak.strong_count() > 0);
        for body in self.bodies.iter().filter_map(Weak::upgrade) {
            if let Ok(mut body) = body.lock() {
                body.step(dt);
            }
        }
    }

    pub fn live_bodies(&self) -> usize {
        self.bodies.iter().filter(|weak| weak.strong_count() > 0).count()
    }
}

impl DynamicsFactory for KinematicFactory {
    fn create(&mut self, position: DVec3, heading_deg: f64, speed_kt: f64) -> Box<dyn FlightDynamics> {
        let body = Arc::new(Mutex::new(PointMass::new(
            position,
            heading_deg,
            speed_kt,
            self.ground_ft,
        )));
        self.bodies.push(Arc::downgrade(&body));
        Box::new(SharedBody(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parked() -> PointMass {
        PointMass::new(DVec3::new(0.0, 11.0 * METERS_PER_FOOT, 0.0), 0.0, 0.0, 11.0)
    }

    #[test]
    fn test_brake_holds_and_thrust_rolls() {
        let mut body = parked();
        assert!(body.grounded);
        body.engine = true;
        body.thrust = 0.5;
        body.brake = true;
        body.step(1.0);
        assert_eq!(body.speed_kt, 0.0);

        body.brake = false;
        for _ in 0..10 {
            body.step(0.5);
        }
        assert!(body.speed_kt > 5.0);
        assert!(body.position.z > 0.0);
    }

    #[test]
    fn test_positive_steer_turns_left() {
        let mut body = parked();
        body.speed_kt = 10.0;
        body.steer = 1.0;
        body.step(0.5);
        assert!(body.heading > 180.0);
    }

    #[test]
    fn test_takeoff_and_autopilot_climb() {
        let mut body = parked();
        body.engine = true;
        body.thrust = 1.0;
        for _ in 0..400 {
            body.step(0.1);
        }
        assert!(!body.grounded);

        body.autopilot = Autopilot {
            heading: 90,
            altitude: 1148,
            vertical_rate: 1000,
            heading_on: true,
            altitude_on: true,
            vertical_rate_on: true,
            master: true,
        };
        for _ in 0..2000 {
            body.step(0.1);
        }
        assert!((body.altitude_ft() - 1148.0).abs() < 20.0);
        assert!((body.heading - 90.0).abs() < 1.0);
    }

    #[test]
    fn test_touchdown_clamps_to_ground() {
        let mut body = PointMass::new(DVec3::new(0.0, 30.0 * METERS_PER_FOOT, 0.0), 0.0, 55.0, 11.0);
        assert!(!body.grounded);
        body.vertical_rate_fpm = -600.0;
        for _ in 0..100 {
            body.step(0.1);
        }
        assert!(body.grounded);
        assert_eq!(body.vertical_rate_fpm, 0.0);
        assert!((body.altitude_ft() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_factory_drops_dead_bodies() {
        let mut factory = KinematicFactory::new(11.0);
        let first = factory.create(DVec3::ZERO, 0.0, 0.0);
        let _second = factory.create(DVec3::ZERO, 90.0, 0.0);
        assert_eq!(factory.live_bodies(), 2);
        drop(first);
        factory.advance(0.1);
        assert_eq!(factory.live_bodies(), 1);
    }

    #[test]
    fn test_signed_turn_takes_short_way() {
        assert_eq!(signed_turn(350.0, 10.0), 20.0);
        assert_eq!(signed_turn(10.0, 350.0), -20.0);
    }
}
