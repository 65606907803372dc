//! Final-approach decision controller.
//!
//! Each tick the aircraft is compared with an ideal 3-degree glide path and
//! quantized into four categories. The 4-tuple selects a throttle delta
//! from a fixed table at a limited rate; pitch comes from vertical-rate
//! bands and heading from the extended centerline with a cross-track
//! correction.

use crate::dynamics::{FlightDynamics, SensedState};
use crate::geometry::{
    flatten, heading_of, normalize_heading, signed_angle_deg, METERS_PER_FOOT, MPS_PER_KNOT,
};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Assumed approach ground speed in knots.
pub const APPROACH_SPEED_KT: f64 = 57.0;
pub const GLIDE_SLOPE_DEG: f64 = 3.0;
/// tan(3 deg)
const GLIDE_GRADIENT: f64 = 0.052_407_779_28;
const GLIDE_OFFSET_FT: f64 = 5.0;
const FEET_PER_METER: f64 = 3.280_84;
/// Below this distance to the glide-path origin the heading is left alone.
const HEADING_HOLD_MIN_DISTANCE_M: f64 = 30.0;
const MAX_HEADING_CORRECTION_DEG: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Elevation {
    TooHigh,
    TooLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerticalTrend {
    Descending,
    Ascending,
}

/// Time needed to regain the glide path at the current rate difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrectionTime {
    /// Within 10 s
    Fast,
    /// Between 10 and 20 s
    Ok,
    /// Beyond 20 s
    Slow,
    /// Diverging from the glide path
    Impossible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateChange {
    /// Descent rate growing
    SpeedingUp,
    Steady,
    /// Descent rate shrinking
    SlowingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApproachCategory {
    pub elevation: Elevation,
    pub trend: VerticalTrend,
    pub correction: CorrectionTime,
    pub rate_change: RateChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ThrottleDecision {
    Adjust(f64),
    /// The category cannot be corrected with throttle
    Impossible,
}

/// Throttle delta for a category. Covers all 48 combinations.
pub fn throttle_lookup(category: ApproachCategory) -> ThrottleDecision {
    use CorrectionTime::*;
    use Elevation::*;
    use VerticalTrend::*;

    let row = match (category.elevation, category.trend, category.correction) {
        (TooHigh, Descending, Fast) => Some([1.0, 0.5, 0.0]),
        (TooHigh, Descending, Ok) => Some([0.5, 0.0, -0.5]),
        (TooHigh, Descending, Slow) => Some([-0.5, -1.0, -1.0]),
        (TooHigh, Descending, Impossible) => Some([-0.5, -1.0, -1.0]),
        (TooHigh, Ascending, Fast | Ok | Slow) => None,
        (TooHigh, Ascending, Impossible) => Some([-0.5, -1.0, -1.0]),
        (TooLow, Descending, Fast) => Some([0.5, 0.0, -0.5]),
        (TooLow, Descending, Ok) => Some([0.5, 0.0, -0.5]),
        (TooLow, Descending, Slow) => Some([1.0, 1.0, 0.5]),
        (TooLow, Descending, Impossible) => Some([1.0, 1.0, 2.0]),
        (TooLow, Ascending, Fast) => Some([-0.5, -0.5, -1.0]),
        (TooLow, Ascending, Ok) => Some([0.0, -0.5, -1.0]),
        (TooLow, Ascending, Slow) => Some([0.5, 0.5, 0.0]),
        (TooLow, Ascending, Impossible) => None,
    };

    match row {
        Some(row) => {
            let column = match category.rate_change {
                RateChange::SpeedingUp => 0,
                RateChange::Steady => 1,
                RateChange::SlowingDown => 2,
            };
            ThrottleDecision::Adjust(row[column])
        }
        None => ThrottleDecision::Impossible,
    }
}

/// Ideal altitude in feet at `distance_m` from the glide-path origin.
pub fn ideal_altitude_ft(distance_m: f64) -> f64 {
    GLIDE_GRADIENT * distance_m / METERS_PER_FOOT + GLIDE_OFFSET_FT
}

/// Ideal vertical rate in feet per minute (negative is descending).
pub fn ideal_vertical_rate_fpm() -> f64 {
    -APPROACH_SPEED_KT * 60.0 * MPS_PER_KNOT * GLIDE_SLOPE_DEG.to_radians().sin() * FEET_PER_METER
}

pub fn classify_correction(seconds: f64) -> CorrectionTime {
    if seconds > 0.0 && seconds <= 10.0 {
        CorrectionTime::Fast
    } else if seconds > 20.0 {
        CorrectionTime::Slow
    } else if seconds <= 0.0 {
        CorrectionTime::Impossible
    } else {
        CorrectionTime::Ok
    }
}

pub fn classify_rate_change(d_rate: f64) -> RateChange {
    if d_rate < -10.0 {
        RateChange::SpeedingUp
    } else if d_rate > 10.0 {
        RateChange::SlowingDown
    } else {
        RateChange::Steady
    }
}

/// Pitch input from the vertical-rate bands.
pub fn pitch_for(elevation: Elevation, vertical_rate_fpm: f64) -> f64 {
    match elevation {
        Elevation::TooHigh => {
            if vertical_rate_fpm > -250.0 {
                0.02
            } else if vertical_rate_fpm > -350.0 {
                0.01
            } else if vertical_rate_fpm > -450.0 {
                0.0
            } else {
                -0.02
            }
        }
        Elevation::TooLow => {
            if vertical_rate_fpm < -330.0 {
                -0.04
            } else if vertical_rate_fpm < -250.0 {
                -0.03
            } else if vertical_rate_fpm < -150.0 {
                -0.02
            } else {
                -0.01
            }
        }
    }
}

/// Fixed landing references for one runway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalApproachGeometry {
    /// Glide-path origin
    pub descending_target: DVec3,
    pub runway_end: DVec3,
    pub runway_width_m: f64,
}

impl FinalApproachGeometry {
    /// Heading toward the glide-path origin, bent toward the extended
    /// centerline by up to ten degrees.
    pub fn corrected_heading(&self, position: DVec3) -> f64 {
        let runway_dir = flatten(self.runway_end - self.descending_target);
        let to_target = flatten(self.descending_target - position);
        let approach_angle = signed_angle_deg(runway_dir, to_target);
        let bearing = heading_of(to_target);

        let cross_track = to_target.length() * approach_angle.to_radians().sin().abs();
        if cross_track <= 0.0 || self.runway_width_m <= 0.0 {
            return bearing;
        }
        let extra = (cross_track / self.runway_width_m * 10.0).clamp(0.0, MAX_HEADING_CORRECTION_DEG);
        if approach_angle > 0.0 {
            normalize_heading(bearing + extra)
        } else if approach_angle < 0.0 {
            normalize_heading(bearing - extra)
        } else {
            bearing
        }
    }
}

/// Everything the controller wants applied this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalApproachCommand {
    pub distance_m: f64,
    pub ideal_altitude_ft: f64,
    pub category: ApproachCategory,
    pub pitch: f64,
    /// Speed guard throttle amount; positive up, negative down
    pub speed_guard: f64,
    /// Rate-limited table decision, present only on decision ticks
    pub decision: Option<ThrottleDecision>,
    /// Table throttle amount; positive up, negative down
    pub table_throttle: f64,
    pub auto_heading: Option<f64>,
}

impl FinalApproachCommand {
    pub fn apply(&self, dynamics: &mut dyn FlightDynamics) {
        dynamics.set_pitch_input(self.pitch);
        throttle_by(dynamics, self.speed_guard);
        throttle_by(dynamics, self.table_throttle);
        if let Some(heading) = self.auto_heading {
            dynamics.set_auto_heading(heading as i32);
        }
    }
}

fn throttle_by(dynamics: &mut dyn FlightDynamics, amount: f64) {
    if amount > 0.0 {
        dynamics.throttle_up(amount);
    } else if amount < 0.0 {
        dynamics.throttle_down(-amount);
    }
}

#[derive(Debug, Clone)]
pub struct FinalApproachController {
    geometry: FinalApproachGeometry,
    interval: f64,
    timer: f64,
    last_rate: f64,
}

impl FinalApproachController {
    pub fn new(geometry: FinalApproachGeometry, interval: f64) -> Self {
        Self {
            geometry,
            interval,
            timer: 0.0,
            last_rate: 0.0,
        }
    }

    pub fn update(&mut self, sensed: &SensedState, entered_runway: bool, dt: f64) -> FinalApproachCommand {
        self.timer += dt;

        let distance_m = flatten(sensed.position - self.geometry.descending_target).length();
        let ideal_altitude_ft = ideal_altitude_ft(distance_m);
        let rate = sensed.vertical_rate_fpm;

        let alt_diff = sensed.altitude_ft - ideal_altitude_ft;
        let rate_diff = rate - ideal_vertical_rate_fpm();
        // First sample compares against level flight
        let d_rate = if dt > 0.0 { (rate - self.last_rate) / dt } else { 0.0 };
        self.last_rate = rate;
        // ft over ft/min, in seconds
        let correction_secs = alt_diff / (-rate_diff) * 60.0;

        let elevation = if sensed.altitude_ft >= ideal_altitude_ft {
            Elevation::TooHigh
        } else {
            Elevation::TooLow
        };
        let trend = if rate < 0.0 {
            VerticalTrend::Descending
        } else {
            VerticalTrend::Ascending
        };
        let category = ApproachCategory {
            elevation,
            trend,
            correction: classify_correction(correction_secs),
            rate_change: classify_rate_change(d_rate),
        };

        let speed_guard = if sensed.speed_kt > 58.0 {
            -0.2 * dt
        } else if sensed.speed_kt < 54.0 {
            0.15 * dt
        } else {
            0.0
        };

        let mut decision = None;
        let mut table_throttle = 0.0;
        if self.timer > self.interval {
            let looked_up = throttle_lookup(category);
            if let ThrottleDecision::Adjust(delta) = looked_up {
                table_throttle = 5.0 * self.interval * delta * dt;
            }
            decision = Some(looked_up);
            self.timer -= self.interval;
        }

        let auto_heading = if entered_runway {
            Some(heading_of(flatten(self.geometry.runway_end - sensed.position)))
        } else if distance_m > HEADING_HOLD_MIN_DISTANCE_M {
            Some(self.geometry.corrected_heading(sensed.position))
        } else {
            None
        };

        FinalApproachCommand {
            distance_m,
            ideal_altitude_ft,
            category,
            pitch: pitch_for(elevation, rate),
            speed_guard,
            decision,
            table_throttle,
            auto_heading,
        }
    }
}
