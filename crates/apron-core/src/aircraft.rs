//! One simulated flight and the memory its lifecycle states keep.

use crate::approach::FinalApproachController;
use crate::channel::{RequestId, Voice};
use crate::dynamics::FlightDynamics;
use crate::lifecycle::LifecycleState;
use crate::models::{AircraftId, ArrivalEntry, Role};
use crate::presentation::AircraftEvent;
use crate::steering::SteeringPid;
use crate::traffic::{RadarMode, TrafficSnapshot, TrafficTracker};
use glam::DVec3;
use rand::Rng;
use std::collections::{BTreeSet, VecDeque};

/// Random US-style tail: "N", two letters, two digits.
pub fn generate_tail<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut tail = String::from("N");
    for _ in 0..2 {
        tail.push(char::from(b'A' + rng.random_range(0..26u8)));
    }
    for _ in 0..2 {
        tail.push(char::from(b'0' + rng.random_range(0..10u8)));
    }
    tail
}

/// Conditions that stop taxiing once the aircraft has come to rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldFlags {
    pub command: bool,
    pub traffic: bool,
    pub enter_runway: bool,
}

impl HoldFlags {
    pub fn any(&self) -> bool {
        self.command || self.traffic || self.enter_runway
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PushbackProgress {
    pub straight_done: bool,
    pub last_distance: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ApproachProgress {
    pub fixes: VecDeque<String>,
    pub timer: f64,
    pub best_distance: f64,
}

/// Circular arc from the end of the taxi route into the gate entry, then a
/// straight roll into the parking spot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GateTurn {
    pub start: DVec3,
    pub start_heading: f64,
    pub center: DVec3,
    /// +1 for a right turn, -1 for a left turn
    pub side: f64,
    /// Degrees turned so far
    pub turned: f64,
    /// Degrees to turn in total
    pub sweep: f64,
    pub entry: DVec3,
    pub gate: DVec3,
    pub gate_heading: f64,
    pub on_entry: bool,
}

/// Per-state scratch memory. Reset by the owning state's entry.
#[derive(Debug, Default)]
pub(crate) struct StateMemory {
    pub pid: SteeringPid,
    pub loading_timer: f64,
    pub pushback: PushbackProgress,
    pub approach: ApproachProgress,
    pub final_approach: Option<FinalApproachController>,
    pub live_exits: Vec<String>,
    pub gate_turn: Option<GateTurn>,
}

pub struct Aircraft {
    id: AircraftId,
    pub tail: String,
    pub role: Role,
    state: LifecycleState,
    previous: LifecycleState,

    pub gate: Option<String>,
    pub departure_runway: Option<String>,
    pub arrival_runway: Option<String>,
    pub approach: Option<String>,
    pub exit: Option<String>,
    /// Waypoint names still to be reached, head first
    pub route: VecDeque<String>,

    pub outstanding_request: Option<RequestId>,
    /// Aircraft the current traffic hold waits for
    pub holding_for: Option<AircraftId>,
    pub takeoff_approved: bool,
    pub holds: HoldFlags,
    /// State a hold returns to
    pub hold_origin: Option<LifecycleState>,

    pub radar: Option<RadarMode>,
    pub tracker: TrafficTracker,
    pub entered_runway: bool,
    pub passed_exits: BTreeSet<String>,

    pub(crate) memory: StateMemory,
    pub(crate) dynamics: Box<dyn FlightDynamics>,
    pub voice: Voice,
    pub(crate) inbox: VecDeque<AircraftEvent>,
    pub(crate) arrival: Option<ArrivalEntry>,
    retired: bool,
}

impl std::fmt::Debug for Aircraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aircraft")
            .field("id", &self.id)
            .field("tail", &self.tail)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("gate", &self.gate)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

impl Aircraft {
    pub fn new(
        id: AircraftId,
        tail: impl Into<String>,
        role: Role,
        dynamics: Box<dyn FlightDynamics>,
        voice: Voice,
    ) -> Self {
        Self {
            id,
            tail: tail.into(),
            role,
            state: LifecycleState::Inactive,
            previous: LifecycleState::Inactive,
            gate: None,
            departure_runway: None,
            arrival_runway: None,
            approach: None,
            exit: None,
            route: VecDeque::new(),
            outstanding_request: None,
            holding_for: None,
            takeoff_approved: false,
            holds: HoldFlags::default(),
            hold_origin: None,
            radar: None,
            tracker: TrafficTracker::new(),
            entered_runway: false,
            passed_exits: BTreeSet::new(),
            memory: StateMemory::default(),
            dynamics,
            voice,
            inbox: VecDeque::new(),
            arrival: None,
            retired: false,
        }
    }

    /// Parked departure at `gate`.
    pub fn outbound(
        id: AircraftId,
        tail: impl Into<String>,
        gate: impl Into<String>,
        dynamics: Box<dyn FlightDynamics>,
        voice: Voice,
    ) -> Self {
        let mut aircraft = Self::new(id, tail, Role::Outbound, dynamics, voice);
        aircraft.gate = Some(gate.into());
        aircraft
    }

    /// Arrival entering radar coverage with `arrival` as initial conditions.
    pub fn inbound(
        id: AircraftId,
        tail: impl Into<String>,
        arrival: ArrivalEntry,
        dynamics: Box<dyn FlightDynamics>,
        voice: Voice,
    ) -> Self {
        let mut aircraft = Self::new(id, tail, Role::Inbound, dynamics, voice);
        aircraft.arrival = Some(arrival);
        aircraft
    }

    pub fn id(&self) -> AircraftId {
        self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn previous(&self) -> LifecycleState {
        self.previous
    }

    pub(crate) fn set_state(&mut self, to: LifecycleState) {
        self.previous = self.state;
        self.state = to;
    }

    pub fn is_inbound(&self) -> bool {
        self.role == Role::Inbound
    }

    /// Finished its life; the slot is recycled after this tick.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    pub fn dynamics(&self) -> &dyn FlightDynamics {
        self.dynamics.as_ref()
    }

    pub fn post(&mut self, event: AircraftEvent) {
        self.inbox.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.inbox.len()
    }

    /// Switch the taxi radar. Turning it off forgets all tracked traffic.
    pub fn set_radar(&mut self, mode: Option<RadarMode>) {
        if mode.is_none() {
            self.tracker.clear();
        }
        self.radar = mode;
    }

    /// Forget runway detections; done once per landing or departure.
    pub fn reset_detection(&mut self) {
        self.entered_runway = false;
        self.passed_exits.clear();
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        TrafficSnapshot {
            id: self.id,
            tail: self.tail.clone(),
            state: self.state,
            position: self.dynamics.position(),
            heading_deg: self.dynamics.heading(),
            radar: self.radar,
        }
    }
}
