//! Simulation tuning and environment overrides.

use serde::{Deserialize, Serialize};
use std::env;

/// Tunables for the fleet, the traffic sensor and the ground maneuvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of aircraft slots in the pool
    pub pool_capacity: usize,
    /// Seconds between inbound spawn attempts
    pub inbound_interval_secs: f64,
    /// Maximum number of simultaneously active arrivals
    pub max_inbound: usize,
    /// Forward range of the proximity sensor in meters
    pub radar_range_m: f64,
    /// Half-angle of the forward sensor cone in degrees
    pub radar_half_angle_deg: f64,
    /// Extra distance beyond radar range before a traffic hold releases
    pub traffic_release_margin_m: f64,
    /// Time spent boarding before the first clearance request
    pub loading_secs: f64,
    /// Distance at which a taxi waypoint counts as reached
    pub waypoint_capture_m: f64,
    /// Distance under which taxi speed drops to the slow table
    pub slow_zone_m: f64,
    /// Heading error beyond which the taxi speed table picks the slow entry
    pub misalignment_deg: f64,
    /// Ground speed under which an aircraft counts as stopped
    pub stopped_speed_kt: f64,
    /// Interval of the final-approach throttle decision
    pub final_interval_secs: f64,
    /// Capture radius for approach fixes
    pub approach_capture_m: f64,
    /// Time without progress before an approach fix is skipped
    pub approach_stuck_secs: f64,
    /// Parked arrivals become departures instead of leaving the pool
    pub turnaround_parked_arrivals: bool,
    /// Seed for tail names and voices; random when absent
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 20,
            inbound_interval_secs: 90.0,
            max_inbound: 1,
            radar_range_m: 40.0,
            radar_half_angle_deg: 30.0,
            traffic_release_margin_m: 5.0,
            loading_secs: 5.0,
            waypoint_capture_m: 5.0,
            slow_zone_m: 10.0,
            misalignment_deg: 2.0,
            stopped_speed_kt: 0.001,
            final_interval_secs: 0.5,
            approach_capture_m: 300.0,
            approach_stuck_secs: 30.0,
            turnaround_parked_arrivals: false,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Defaults overlaid with `APRON_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pool_capacity: env_or("APRON_POOL_CAPACITY", defaults.pool_capacity),
            inbound_interval_secs: env_or("APRON_INBOUND_INTERVAL", defaults.inbound_interval_secs),
            max_inbound: env_or("APRON_MAX_INBOUND", defaults.max_inbound),
            radar_range_m: env_or("APRON_RADAR_RANGE", defaults.radar_range_m),
            radar_half_angle_deg: env_or("APRON_RADAR_HALF_ANGLE", defaults.radar_half_angle_deg),
            traffic_release_margin_m: env_or(
                "APRON_TRAFFIC_RELEASE_MARGIN",
                defaults.traffic_release_margin_m,
            ),
            loading_secs: env_or("APRON_LOADING_SECS", defaults.loading_secs),
            turnaround_parked_arrivals: env_or(
                "APRON_TURNAROUND",
                defaults.turnaround_parked_arrivals,
            ),
            seed: env::var("APRON_SEED").ok().and_then(|s| s.parse().ok()),
            ..defaults
        }
    }

    /// Distance a traffic blocker must open up before a hold releases.
    pub fn traffic_release_distance(&self) -> f64 {
        self.radar_range_m + self.traffic_release_margin_m
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
