//! Apron traffic simulation core.
//!
//! Aircraft move through a fixed lifecycle from gate to departure and from
//! radar contact to parking, sharing one ground frequency and watching for
//! traffic while they taxi. Flight physics, speech playback and the user
//! interface are collaborators behind traits.

pub mod aircraft;
pub mod airport;
pub mod approach;
pub mod channel;
pub mod config;
pub mod dynamics;
pub mod error;
pub mod fleet;
pub mod geometry;
pub mod lifecycle;
pub mod models;
pub mod phraseology;
pub mod presentation;
pub mod steering;
pub mod traffic;

pub use aircraft::{Aircraft, HoldFlags};
pub use airport::Airport;
pub use approach::{
    throttle_lookup, ApproachCategory, CorrectionTime, Elevation, FinalApproachCommand,
    FinalApproachController, FinalApproachGeometry, RateChange, ThrottleDecision, VerticalTrend,
};
pub use channel::{
    Delivery, GroundChannel, RequestDraft, RequestId, RequestKind, SpeechSynthesizer, Spoken,
    UtteranceId, Voice,
};
pub use config::SimConfig;
pub use dynamics::{DynamicsFactory, FlightDynamics, SensedState};
pub use error::{ConfigError, Result};
pub use fleet::{Fleet, TickReport};
pub use lifecycle::{LifecycleState, TickContext};
pub use models::{AircraftId, GateStatus, Role};
pub use presentation::{AircraftEvent, Headless, Presentation, Prompt, PromptKind, Telemetry};
pub use steering::{PidGains, SteeringPid};
pub use traffic::{ConeRadar, ProximitySensor, RadarMode, TrafficSnapshot, TrafficTracker};
