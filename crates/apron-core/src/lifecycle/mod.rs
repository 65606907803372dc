//! Aircraft lifecycle state machine.
//!
//! Every aircraft is in exactly one [`LifecycleState`]. A tick first drains
//! the aircraft's inbox, then runs the current state's update. States never
//! assign the state field themselves: they return the next state and
//! [`transition`] runs the old state's exit, switches, and runs the new
//! state's entry with the origin passed in.
//!
//! State behaviour lives in the submodules, grouped by where the aircraft is:
//! at the gate, taxiing, holding, or flying.

mod flight;
mod gate;
mod holds;
mod taxi;

use crate::aircraft::Aircraft;
use crate::airport::Airport;
use crate::channel::GroundChannel;
use crate::config::SimConfig;
use crate::error::{ConfigError, Result};
use crate::models::{AircraftId, GateStatus, Role};
use crate::presentation::{AircraftEvent, Presentation, PromptKind};
use crate::traffic::TrafficSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleState {
    Inactive,
    Loading,
    DepartureRunwayRequest,
    TaxiwayRequest,
    PushbackRequest,
    Pushback,
    TaxiToRunway,
    HoldOnCommand,
    HoldOnTraffic,
    HoldOnCrossing,
    HoldOnEnterRunway,
    HoldOnTakeoff,
    Takeoff,
    Climb,
    OnRadar,
    ArrivalRunwayRequest,
    ApproachRequest,
    ToFinal,
    OnFinal,
    TenAboveGround,
    TouchDown,
    ExitRunway,
    HoldOnParkingSelection,
    TaxiToGate,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 24] = [
        LifecycleState::Inactive,
        LifecycleState::Loading,
        LifecycleState::DepartureRunwayRequest,
        LifecycleState::TaxiwayRequest,
        LifecycleState::PushbackRequest,
        LifecycleState::Pushback,
        LifecycleState::TaxiToRunway,
        LifecycleState::HoldOnCommand,
        LifecycleState::HoldOnTraffic,
        LifecycleState::HoldOnCrossing,
        LifecycleState::HoldOnEnterRunway,
        LifecycleState::HoldOnTakeoff,
        LifecycleState::Takeoff,
        LifecycleState::Climb,
        LifecycleState::OnRadar,
        LifecycleState::ArrivalRunwayRequest,
        LifecycleState::ApproachRequest,
        LifecycleState::ToFinal,
        LifecycleState::OnFinal,
        LifecycleState::TenAboveGround,
        LifecycleState::TouchDown,
        LifecycleState::ExitRunway,
        LifecycleState::HoldOnParkingSelection,
        LifecycleState::TaxiToGate,
    ];

    /// Stable numeric id, 0 through 23.
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            LifecycleState::Inactive => "Inactive",
            LifecycleState::Loading => "Loading",
            LifecycleState::DepartureRunwayRequest => "DepartureRunwayRequest",
            LifecycleState::TaxiwayRequest => "TaxiwayRequest",
            LifecycleState::PushbackRequest => "PushbackRequest",
            LifecycleState::Pushback => "Pushback",
            LifecycleState::TaxiToRunway => "TaxiToRunway",
            LifecycleState::HoldOnCommand => "HoldOnCommand",
            LifecycleState::HoldOnTraffic => "HoldOnTraffic",
            LifecycleState::HoldOnCrossing => "HoldOnCrossing",
            LifecycleState::HoldOnEnterRunway => "HoldOnEnterRunway",
            LifecycleState::HoldOnTakeoff => "HoldOnTakeoff",
            LifecycleState::Takeoff => "Takeoff",
            LifecycleState::Climb => "Climb",
            LifecycleState::OnRadar => "OnRadar",
            LifecycleState::ArrivalRunwayRequest => "ArrivalRunwayRequest",
            LifecycleState::ApproachRequest => "ApproachRequest",
            LifecycleState::ToFinal => "ToFinal",
            LifecycleState::OnFinal => "OnFinal",
            LifecycleState::TenAboveGround => "TenAboveGround",
            LifecycleState::TouchDown => "TouchDown",
            LifecycleState::ExitRunway => "ExitRunway",
            LifecycleState::HoldOnParkingSelection => "HoldOnParkingSelection",
            LifecycleState::TaxiToGate => "TaxiToGate",
        }
    }

    /// States in which an aircraft moves or stands on the airfield surface.
    pub fn is_ground(self) -> bool {
        self.id() <= LifecycleState::Takeoff.id()
            || matches!(
                self,
                LifecycleState::ExitRunway | LifecycleState::HoldOnParkingSelection
            )
    }

    /// Ground states spent parked at the gate.
    pub fn is_in_gate(self) -> bool {
        matches!(
            self,
            LifecycleState::Loading
                | LifecycleState::DepartureRunwayRequest
                | LifecycleState::TaxiwayRequest
                | LifecycleState::PushbackRequest
        )
    }

    /// Whether a tracked aircraft in this state stops the observer.
    pub fn can_block(self) -> bool {
        !matches!(
            self,
            LifecycleState::Inactive
                | LifecycleState::Loading
                | LifecycleState::DepartureRunwayRequest
                | LifecycleState::PushbackRequest
        )
    }

    pub fn is_hold(self) -> bool {
        matches!(
            self,
            LifecycleState::HoldOnCommand
                | LifecycleState::HoldOnTraffic
                | LifecycleState::HoldOnCrossing
                | LifecycleState::HoldOnEnterRunway
                | LifecycleState::HoldOnTakeoff
                | LifecycleState::HoldOnParkingSelection
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LifecycleState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        LifecycleState::ALL
            .iter()
            .copied()
            .find(|state| state.name() == s)
            .ok_or_else(|| ConfigError::UnknownState(s.to_string()))
    }
}

/// Everything a state may touch besides its own aircraft.
pub struct TickContext<'a> {
    pub airport: &'a mut Airport,
    pub channel: &'a mut GroundChannel,
    pub presentation: &'a mut dyn Presentation,
    pub config: &'a SimConfig,
    /// Where every live aircraft was at the start of this tick
    pub traffic: &'a BTreeMap<AircraftId, TrafficSnapshot>,
}

/// First activation of a freshly spawned aircraft.
pub fn activate(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    entry(aircraft, ctx, LifecycleState::Inactive)?;
    ctx.presentation.set_state_name(aircraft.id(), aircraft.state());
    Ok(())
}

/// Consume pending events, then run one update of the current state.
pub fn tick(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>, dt: f64) -> Result<()> {
    while let Some(event) = aircraft.inbox.pop_front() {
        if aircraft.is_retired() {
            break;
        }
        if let Some(next) = handle_event(aircraft, ctx, event)? {
            transition(aircraft, ctx, next)?;
        }
    }
    if aircraft.is_retired() {
        return Ok(());
    }
    if let Some(next) = update(aircraft, ctx, dt)? {
        transition(aircraft, ctx, next)?;
    }
    Ok(())
}

/// Leave the current state and enter `to`.
pub fn transition(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>, to: LifecycleState) -> Result<()> {
    let from = aircraft.state();
    exit(aircraft, ctx)?;
    aircraft.set_state(to);
    info!("{} {}: {} -> {}", aircraft.tail, aircraft.id(), from, to);
    entry(aircraft, ctx, from)?;
    ctx.presentation.set_state_name(aircraft.id(), to);
    Ok(())
}

fn entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>, from: LifecycleState) -> Result<()> {
    use LifecycleState::*;
    match aircraft.state() {
        Inactive => gate::inactive_entry(aircraft, ctx, from),
        Loading => gate::loading_entry(aircraft, ctx),
        DepartureRunwayRequest => gate::departure_runway_request_entry(aircraft, ctx),
        TaxiwayRequest => gate::taxiway_request_entry(aircraft, ctx),
        PushbackRequest => gate::pushback_request_entry(aircraft, ctx),
        Pushback => gate::pushback_entry(aircraft, ctx, from),
        TaxiToRunway => taxi::taxi_to_runway_entry(aircraft, ctx, from),
        HoldOnCommand | HoldOnCrossing => holds::origin_hold_entry(aircraft, from),
        HoldOnTraffic => holds::traffic_entry(aircraft, ctx, from),
        HoldOnEnterRunway => holds::enter_runway_entry(aircraft, ctx),
        HoldOnTakeoff => holds::takeoff_entry(aircraft, ctx),
        Takeoff => flight::takeoff_entry(aircraft),
        Climb => flight::climb_entry(aircraft, ctx),
        OnRadar => flight::on_radar_entry(aircraft),
        ArrivalRunwayRequest => flight::arrival_runway_request_entry(aircraft, ctx),
        ApproachRequest => flight::approach_request_entry(aircraft, ctx),
        ToFinal => flight::to_final_entry(aircraft, ctx),
        OnFinal => flight::on_final_entry(aircraft, ctx),
        TenAboveGround => flight::ten_above_ground_entry(aircraft, ctx),
        TouchDown => flight::touch_down_entry(aircraft, ctx),
        ExitRunway => taxi::exit_runway_entry(aircraft, ctx, from),
        HoldOnParkingSelection => holds::parking_selection_entry(aircraft),
        TaxiToGate => gate::taxi_to_gate_entry(aircraft, ctx),
    }
}

fn update(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>, dt: f64) -> Result<Option<LifecycleState>> {
    use LifecycleState::*;
    match aircraft.state() {
        Inactive => gate::inactive_update(aircraft, ctx),
        Loading => Ok(gate::loading_update(aircraft, ctx, dt)),
        DepartureRunwayRequest | TaxiwayRequest | PushbackRequest => Ok(None),
        Pushback => gate::pushback_update(aircraft, ctx, dt),
        TaxiToRunway => taxi::taxi_to_runway_update(aircraft, ctx, dt),
        HoldOnCommand | HoldOnEnterRunway | HoldOnTakeoff | HoldOnParkingSelection => {
            holds::hold_still(aircraft, dt);
            Ok(None)
        }
        HoldOnTraffic => Ok(holds::traffic_update(aircraft, ctx, dt)),
        HoldOnCrossing => Ok(None),
        Takeoff => flight::takeoff_update(aircraft, ctx, dt),
        Climb => Ok(flight::climb_update(aircraft, ctx)),
        OnRadar => Ok(Some(ArrivalRunwayRequest)),
        ArrivalRunwayRequest | ApproachRequest => Ok(None),
        ToFinal => flight::to_final_update(aircraft, ctx, dt),
        OnFinal => Ok(flight::on_final_update(aircraft, ctx, dt)),
        TenAboveGround => flight::ten_above_ground_update(aircraft, ctx, dt),
        TouchDown => flight::touch_down_update(aircraft, ctx, dt),
        ExitRunway => taxi::exit_runway_update(aircraft, ctx, dt),
        TaxiToGate => gate::taxi_to_gate_update(aircraft, ctx, dt),
    }
}

fn exit(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    use LifecycleState::*;
    match aircraft.state() {
        PushbackRequest => {
            if !aircraft.dynamics.engine_running() {
                aircraft.dynamics.toggle_engine();
            }
        }
        Pushback | TaxiToRunway | ExitRunway => aircraft.set_radar(None),
        HoldOnCommand | HoldOnTakeoff | HoldOnParkingSelection => {
            aircraft.dynamics.release_brake();
        }
        HoldOnTraffic => ctx.presentation.set_info(aircraft.id(), ""),
        TouchDown => {
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Exit);
            aircraft.reset_detection();
        }
        OnFinal => aircraft.memory.final_approach = None,
        TaxiToGate => {
            aircraft.set_radar(None);
            aircraft.memory.gate_turn = None;
        }
        _ => {}
    }
    Ok(())
}

/// Apply one inbox event. Events the current state does not expect are
/// dropped.
fn handle_event(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    event: AircraftEvent,
) -> Result<Option<LifecycleState>> {
    use LifecycleState::*;
    let state = aircraft.state();
    let next = match (state, event) {
        (_, AircraftEvent::RequestSpoken { request_id }) => {
            if aircraft.outstanding_request == Some(request_id) {
                gate::on_request_spoken(aircraft, ctx)?;
            } else {
                debug!("{}: stale request completion {}", aircraft.tail, request_id);
            }
            None
        }
        (_, AircraftEvent::ResponseSpoken { request_id, from, to }) => {
            if aircraft.outstanding_request == Some(request_id) && state == from {
                aircraft.outstanding_request = None;
                Some(to)
            } else {
                warn!(
                    "{}: response {} for {} ignored in {}",
                    aircraft.tail, request_id, from, state
                );
                None
            }
        }
        (DepartureRunwayRequest, AircraftEvent::DepartureRunwayChosen(runway)) => {
            gate::on_departure_runway_chosen(aircraft, ctx, runway)?;
            None
        }
        (TaxiwayRequest, AircraftEvent::TaxiwayChosen { automatic }) => {
            Some(gate::on_taxiway_chosen(aircraft, ctx, automatic)?)
        }
        (PushbackRequest, AircraftEvent::PushbackApproved) => {
            gate::on_pushback_approved(aircraft, ctx);
            None
        }
        (TaxiToRunway | ExitRunway | HoldOnTraffic, AircraftEvent::HoldCommanded) => {
            aircraft.holds.command = true;
            None
        }
        (TaxiToRunway | ExitRunway | HoldOnTraffic, AircraftEvent::ResumeCommanded) => {
            aircraft.holds.command = false;
            None
        }
        (HoldOnCommand | HoldOnCrossing, AircraftEvent::ResumeCommanded) => {
            aircraft.holds.command = false;
            holds::release_to_origin(aircraft)
        }
        (TaxiToRunway, AircraftEvent::TakeoffApproved) => {
            aircraft.takeoff_approved = true;
            aircraft.holds.enter_runway = false;
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Takeoff);
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Align);
            None
        }
        (TaxiToRunway, AircraftEvent::AlignApproved) => {
            aircraft.holds.enter_runway = false;
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Align);
            None
        }
        (HoldOnEnterRunway, AircraftEvent::TakeoffApproved) => {
            aircraft.takeoff_approved = true;
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Takeoff);
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Align);
            Some(TaxiToRunway)
        }
        (HoldOnEnterRunway, AircraftEvent::AlignApproved) => {
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Align);
            Some(TaxiToRunway)
        }
        (HoldOnTakeoff, AircraftEvent::TakeoffApproved) => {
            aircraft.takeoff_approved = true;
            ctx.presentation.withdraw(aircraft.id(), PromptKind::Takeoff);
            Some(Takeoff)
        }
        (ArrivalRunwayRequest, AircraftEvent::ArrivalRunwayChosen(runway)) => {
            ctx.airport.runway(&runway)?;
            aircraft.arrival_runway = Some(runway);
            Some(ApproachRequest)
        }
        (ApproachRequest, AircraftEvent::ApproachChosen(approach)) => {
            ctx.airport.approach(&approach)?;
            aircraft.approach = Some(approach);
            Some(ToFinal)
        }
        (TouchDown, AircraftEvent::ExitChosen(exit)) => {
            ctx.airport.exit(&exit)?;
            aircraft.exit = Some(exit);
            Some(ExitRunway)
        }
        (_, AircraftEvent::GateChosen(gate)) => taxi::on_gate_chosen(aircraft, ctx, gate)?,
        (state, event) => {
            debug!("{}: {:?} ignored in {}", aircraft.tail, event, state);
            None
        }
    };
    Ok(next)
}

/// Mark a gate and log; shared by the parking states.
fn set_gate(ctx: &mut TickContext<'_>, gate: Option<&str>, status: GateStatus) -> Result<()> {
    match gate {
        Some(gate) => {
            ctx.airport.set_gate_status(gate, status)?;
            debug!("Gate {} now {:?}", gate, status);
            Ok(())
        }
        None => Ok(()),
    }
}

/// Reset assignments when a parked arrival turns around as a departure.
fn turn_around(aircraft: &mut Aircraft) {
    aircraft.role = Role::Outbound;
    aircraft.departure_runway = None;
    aircraft.arrival_runway = None;
    aircraft.approach = None;
    aircraft.exit = None;
    aircraft.route.clear();
    aircraft.takeoff_approved = false;
    aircraft.arrival = None;
    aircraft.reset_detection();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_declaration_order() {
        for (index, state) in LifecycleState::ALL.iter().enumerate() {
            assert_eq!(state.id() as usize, index);
        }
        assert_eq!(LifecycleState::TaxiToGate.id(), 23);
    }

    #[test]
    fn test_names_round_trip() {
        for state in LifecycleState::ALL {
            assert_eq!(state.name().parse::<LifecycleState>().unwrap(), state);
        }
        let err = "Taxiing".parse::<LifecycleState>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownState(name) if name == "Taxiing"));
    }

    #[test]
    fn test_groups() {
        assert!(LifecycleState::Pushback.is_ground());
        assert!(LifecycleState::ExitRunway.is_ground());
        assert!(LifecycleState::HoldOnParkingSelection.is_ground());
        assert!(LifecycleState::Takeoff.is_ground());
        assert!(!LifecycleState::TaxiToGate.is_ground());
        assert!(!LifecycleState::Climb.is_ground());
        assert!(!LifecycleState::TouchDown.is_ground());

        assert!(LifecycleState::TaxiwayRequest.is_in_gate());
        assert!(!LifecycleState::Pushback.is_in_gate());

        assert!(LifecycleState::TaxiwayRequest.can_block());
        assert!(!LifecycleState::Loading.can_block());
        assert!(LifecycleState::HoldOnTraffic.can_block());
    }
}
