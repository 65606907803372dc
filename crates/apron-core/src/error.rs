//! Error types for the apron core.
//!
//! Configuration problems (bad names in the airport tables, unknown states)
//! are the only errors the core surfaces. Protocol glitches on the ground
//! channel and transient traffic conditions are handled in place.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown lifecycle state: {0}")]
    UnknownState(String),

    #[error("unknown waypoint: {0}")]
    UnknownWaypoint(String),

    #[error("unknown gate: {0}")]
    UnknownGate(String),

    #[error("unknown approach: {0}")]
    UnknownApproach(String),

    #[error("unknown runway: {0}")]
    UnknownRunway(String),

    #[error("unknown runway exit: {0}")]
    UnknownExit(String),

    #[error("malformed airport data: {0}")]
    MalformedAirport(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
