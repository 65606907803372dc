//! Core data models for the apron simulation.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to an aircraft slot in the fleet arena.
///
/// The generation is bumped every time a slot is recycled, so a handle kept
/// across a recycle no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AircraftId {
    pub index: u32,
    pub generation: u32,
}

impl AircraftId {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for AircraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Occupied,
    Reserved,
    #[default]
    Empty,
}

/// A parking gate and the taxi geometry around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub name: String,
    #[serde(default)]
    pub status: GateStatus,
    /// Parked position
    pub position: DVec3,
    /// Parked heading in degrees
    pub heading_deg: f64,
    /// Point on the apron lane where the straight push or pull starts
    pub entry: DVec3,
    /// Waypoint where the pushback turn ends
    pub pushback_target: String,
    /// First waypoint of the departure taxi
    pub taxi_out: String,
    /// Apron waypoint that ends the taxi-in route, if any
    #[serde(default)]
    pub taxi_in: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runway {
    pub name: String,
    pub width_m: f64,
    pub length_m: f64,
}

/// A published arrival procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approach {
    pub name: String,
    /// Approach fixes flown in order
    pub waypoints: Vec<String>,
    /// Initial autopilot altitude in feet
    pub target_altitude_ft: f64,
    pub runway: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub wind_direction_deg: f64,
    pub runways_in_use: Vec<String>,
}

/// A runway exit in roll order, with the path that leaves the runway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunwayExit {
    /// Runway waypoint where the exit starts
    pub name: String,
    /// Waypoints from the runway to the parallel taxiway
    pub route: Vec<String>,
    /// Parallel-taxiway waypoint the taxi-in joins at
    pub join: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "exit")]
pub enum ZoneKind {
    /// Crossing the landing threshold
    RunwayEntry,
    /// Rolling past the named runway exit
    ExitPassed(String),
}

/// A trigger volume that flips per-aircraft detection flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionZone {
    pub kind: ZoneKind,
    pub center: DVec3,
    pub radius_m: f64,
    /// Only aircraft below this height (meters) trigger the zone
    pub max_height_m: f64,
}

impl DetectionZone {
    pub fn contains(&self, position: DVec3) -> bool {
        position.y <= self.max_height_m
            && crate::geometry::ground_distance(position, self.center) <= self.radius_m
    }
}

/// Departure taxi and climb-out parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartureProcedure {
    pub runway: String,
    /// Waypoints after the gate's taxi-out point, ending at the takeoff point
    pub trunk: Vec<String>,
    /// Reaching this waypoint raises the enter-runway hold
    pub hold_short: String,
    /// Reaching this waypoint ends the taxi
    pub takeoff_position: String,
    /// Takeoff roll steers toward this waypoint
    pub takeoff_aim: String,
    pub climb_heading_deg: f64,
    pub climb_altitude_ft: f64,
    pub climb_vertical_rate_fpm: f64,
    pub flap_retract_altitude_ft: f64,
}

/// Where and how arrivals appear on radar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArrivalEntry {
    pub position: DVec3,
    pub heading_deg: f64,
    pub speed_kt: f64,
    pub altitude_ft: f64,
}

/// Landing references for the final approach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalApproach {
    /// Glide-path origin used for the ideal altitude
    pub descending_target: String,
    /// Far end of the runway; heading target after the threshold
    pub runway_end: String,
    /// Landing threshold; the extended centerline runs from here
    pub threshold: String,
}

/// Airport identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportInfo {
    pub name: String,
    pub field_elevation_ft: f64,
}

impl AirportInfo {
    /// How the ground controller is addressed on the channel.
    pub fn ground_controller(&self) -> String {
        format!("{} ground", self.name)
    }
}
