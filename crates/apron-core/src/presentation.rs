//! Presentation collaborator and the events it sends back.
//!
//! The core never waits on a widget. It asks for a choice with
//! [`Presentation::request_choice`] and later finds the answer as an
//! [`AircraftEvent`] in the aircraft's inbox.

use crate::channel::RequestId;
use crate::lifecycle::LifecycleState;
use crate::models::AircraftId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PromptKind {
    DepartureRunway,
    ArrivalRunway,
    Approach,
    Taxiway,
    Exit,
    ParkingGate,
    PushbackApproval,
    /// Hold / resume buttons, shown while taxiing
    HoldControl,
    Takeoff,
    Align,
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PromptKind::DepartureRunway => "departure runway",
            PromptKind::ArrivalRunway => "arrival runway",
            PromptKind::Approach => "approach",
            PromptKind::Taxiway => "taxiway",
            PromptKind::Exit => "exit",
            PromptKind::ParkingGate => "parking gate",
            PromptKind::PushbackApproval => "pushback approval",
            PromptKind::HoldControl => "hold control",
            PromptKind::Takeoff => "takeoff",
            PromptKind::Align => "line up",
        };
        f.write_str(label)
    }
}

/// A choice offered to whoever plays the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub kind: PromptKind,
    pub options: Vec<String>,
}

impl Prompt {
    pub fn new(kind: PromptKind, options: Vec<String>) -> Self {
        Self { kind, options }
    }

    /// A prompt with a single implicit option, such as a clearance button.
    pub fn button(kind: PromptKind) -> Self {
        Self {
            kind,
            options: Vec::new(),
        }
    }
}

/// Taxiway selection for a departure.
pub const TAXIWAY_AUTOMATIC: &str = "automatic";
pub const TAXIWAY_MANUAL: &str = "manual";

/// Everything that can be posted to an aircraft's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AircraftEvent {
    DepartureRunwayChosen(String),
    ArrivalRunwayChosen(String),
    ApproachChosen(String),
    TaxiwayChosen { automatic: bool },
    ExitChosen(String),
    GateChosen(String),
    PushbackApproved,
    HoldCommanded,
    ResumeCommanded,
    TakeoffApproved,
    AlignApproved,
    /// The aircraft's own request finished playing
    RequestSpoken { request_id: RequestId },
    /// The controller's answer finished playing
    ResponseSpoken {
        request_id: RequestId,
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// Display and choice collaborator.
pub trait Presentation {
    fn open_card(&mut self, aircraft: AircraftId, tail: &str);
    fn close_card(&mut self, aircraft: AircraftId);
    fn set_state_name(&mut self, aircraft: AircraftId, state: LifecycleState);
    fn set_info(&mut self, aircraft: AircraftId, info: &str);
    fn set_tail_name(&mut self, aircraft: AircraftId, tail: &str);
    fn set_telemetry(&mut self, aircraft: AircraftId, telemetry: &Telemetry);

    /// Offer a choice. The answer arrives later as exactly one event.
    fn request_choice(&mut self, aircraft: AircraftId, prompt: Prompt);
    /// Take a pending prompt off the card.
    fn withdraw(&mut self, aircraft: AircraftId, kind: PromptKind);
    /// Grey out one option of a pending prompt.
    fn disable_option(&mut self, aircraft: AircraftId, kind: PromptKind, option: &str);
}

/// Per-tick readout shown on the aircraft card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub altitude_ft: f64,
    pub speed_kt: f64,
    pub heading_deg: f64,
    pub vertical_rate_fpm: f64,
}

/// Presentation that shows nothing and never answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl Presentation for Headless {
    fn open_card(&mut self, _aircraft: AircraftId, _tail: &str) {}
    fn close_card(&mut self, _aircraft: AircraftId) {}
    fn set_state_name(&mut self, _aircraft: AircraftId, _state: LifecycleState) {}
    fn set_info(&mut self, _aircraft: AircraftId, _info: &str) {}
    fn set_tail_name(&mut self, _aircraft: AircraftId, _tail: &str) {}
    fn set_telemetry(&mut self, _aircraft: AircraftId, _telemetry: &Telemetry) {}
    fn request_choice(&mut self, _aircraft: AircraftId, _prompt: Prompt) {}
    fn withdraw(&mut self, _aircraft: AircraftId, _kind: PromptKind) {}
    fn disable_option(&mut self, _aircraft: AircraftId, _kind: PromptKind, _option: &str) {}
}
