//! Gate states: parking, loading, clearance requests, pushback and the
//! final turn into a gate.

use super::{set_gate, turn_around, LifecycleState, TickContext};
use crate::aircraft::{Aircraft, GateTurn, PushbackProgress};
use crate::channel::{RequestDraft, RequestKind};
use crate::error::{ConfigError, Result};
use crate::geometry::{
    direction_from_heading, flatten, ground_distance, heading_of, right_of, rotate_heading,
};
use crate::models::GateStatus;
use crate::phraseology::{departure_runway_payload, pushback_payload};
use crate::presentation::{Prompt, PromptKind, TAXIWAY_AUTOMATIC, TAXIWAY_MANUAL};
use crate::traffic::RadarMode;
use glam::DVec3;
use std::f64::consts::PI;
use tracing::{debug, info, warn};

const PUSHBACK_SPEED_MPS: f64 = 1.0;
const PUSHBACK_YAW_RATE_DEG: f64 = 4.0;
const PUSHBACK_STRAIGHT_DONE_M: f64 = 0.2;
const PUSHBACK_TARGET_REACHED_M: f64 = 1.0;

/// Turn rate of the arc into the gate, radians per second.
const GATE_TURN_RATE: f64 = 1.0 / (3.0 * PI);
const GATE_ENTRY_SNAP_M: f64 = 2.8;
const GATE_ROLL_SPEED_MPS: f64 = 0.5;
const GATE_PARKED_M: f64 = 1.5;

pub(super) fn assigned_gate(aircraft: &Aircraft) -> Result<String> {
    aircraft
        .gate
        .clone()
        .ok_or_else(|| ConfigError::UnknownGate(format!("none assigned to {}", aircraft.tail)))
}

pub(super) fn inactive_entry(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    from: LifecycleState,
) -> Result<()> {
    match from {
        LifecycleState::Climb => {
            info!("{} left the area", aircraft.tail);
            ctx.presentation.close_card(aircraft.id());
            aircraft.retire();
        }
        LifecycleState::TaxiToGate => {
            ctx.presentation.close_card(aircraft.id());
            if ctx.config.turnaround_parked_arrivals {
                info!("{} parked, turning around", aircraft.tail);
                turn_around(aircraft);
            } else {
                info!("{} parked, releasing gate", aircraft.tail);
                set_gate(ctx, aircraft.gate.as_deref(), GateStatus::Empty)?;
                aircraft.retire();
            }
        }
        LifecycleState::Inactive => {
            set_gate(ctx, aircraft.gate.as_deref(), GateStatus::Occupied)?;
        }
        _ => {}
    }
    Ok(())
}

pub(super) fn inactive_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
) -> Result<Option<LifecycleState>> {
    if aircraft.is_retired() {
        return Ok(None);
    }
    ctx.presentation.open_card(aircraft.id(), &aircraft.tail);
    ctx.presentation.set_tail_name(aircraft.id(), &aircraft.tail);
    if aircraft.is_inbound() {
        Ok(Some(LifecycleState::OnRadar))
    } else {
        Ok(Some(LifecycleState::Loading))
    }
}

pub(super) fn loading_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    let gate_name = assigned_gate(aircraft)?;
    let gate = ctx.airport.gate(&gate_name)?;
    let mut parked = gate.position;
    parked.y = ctx.airport.ground_height_m();
    aircraft.dynamics.place(parked, gate.heading_deg);
    aircraft.dynamics.stop();
    aircraft.dynamics.apply_brake();
    aircraft.memory.loading_timer = 0.0;
    Ok(())
}

pub(super) fn loading_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Option<LifecycleState> {
    aircraft.memory.loading_timer += dt;
    if aircraft.memory.loading_timer >= ctx.config.loading_secs {
        aircraft.memory.loading_timer = 0.0;
        return Some(LifecycleState::DepartureRunwayRequest);
    }
    None
}

fn send_request(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>, kind: RequestKind, payload: String) {
    let id = ctx.channel.request(RequestDraft {
        kind,
        aircraft: aircraft.id(),
        from_tail: aircraft.tail.clone(),
        to_whom: ctx.channel.controller().to_string(),
        payload,
        voice: aircraft.voice.clone(),
    });
    aircraft.outstanding_request = Some(id);
}

pub(super) fn departure_runway_request_entry(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
) -> Result<()> {
    send_request(aircraft, ctx, RequestKind::DepartureRunway, departure_runway_payload());
    Ok(())
}

pub(super) fn taxiway_request_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    ctx.presentation.request_choice(
        aircraft.id(),
        Prompt::new(
            PromptKind::Taxiway,
            vec![TAXIWAY_AUTOMATIC.to_string(), TAXIWAY_MANUAL.to_string()],
        ),
    );
    Ok(())
}

pub(super) fn pushback_request_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    let runway = aircraft.departure_runway.clone().unwrap_or_default();
    send_request(aircraft, ctx, RequestKind::Pushback, pushback_payload(&runway));
    Ok(())
}

/// Our own request finished playing: put the matching choice on the card.
pub(super) fn on_request_spoken(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    match aircraft.state() {
        LifecycleState::DepartureRunwayRequest => {
            let runways = ctx.airport.runways_in_use().to_vec();
            ctx.presentation.request_choice(
                aircraft.id(),
                Prompt::new(PromptKind::DepartureRunway, runways),
            );
        }
        LifecycleState::PushbackRequest => {
            ctx.presentation
                .request_choice(aircraft.id(), Prompt::button(PromptKind::PushbackApproval));
        }
        state => debug!("{}: request spoken in {}", aircraft.tail, state),
    }
    Ok(())
}

pub(super) fn on_departure_runway_chosen(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    runway: String,
) -> Result<()> {
    ctx.airport.runway(&runway)?;
    let Some(request_id) = aircraft.outstanding_request else {
        warn!("{}: runway chosen before the request was made", aircraft.tail);
        return Ok(());
    };
    ctx.presentation.withdraw(aircraft.id(), PromptKind::DepartureRunway);
    ctx.channel.generate_response(
        request_id,
        &runway,
        LifecycleState::DepartureRunwayRequest,
        LifecycleState::TaxiwayRequest,
    );
    aircraft.departure_runway = Some(runway);
    Ok(())
}

pub(super) fn on_taxiway_chosen(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    automatic: bool,
) -> Result<LifecycleState> {
    if !automatic {
        debug!("{}: manual taxi selection uses the published route", aircraft.tail);
    }
    let gate = assigned_gate(aircraft)?;
    aircraft.route = ctx.airport.departure_route(&gate)?;
    ctx.presentation.withdraw(aircraft.id(), PromptKind::Taxiway);
    Ok(LifecycleState::PushbackRequest)
}

pub(super) fn on_pushback_approved(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) {
    let Some(request_id) = aircraft.outstanding_request else {
        warn!("{}: pushback approved before the request was made", aircraft.tail);
        return;
    };
    ctx.presentation.withdraw(aircraft.id(), PromptKind::PushbackApproval);
    let runway = aircraft.departure_runway.clone().unwrap_or_default();
    ctx.channel.generate_response(
        request_id,
        &runway,
        LifecycleState::PushbackRequest,
        LifecycleState::Pushback,
    );
}

pub(super) fn pushback_entry(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    from: LifecycleState,
) -> Result<()> {
    let gate = assigned_gate(aircraft)?;
    ctx.airport.waypoint(&ctx.airport.gate(&gate)?.pushback_target)?;
    if from == LifecycleState::HoldOnTraffic {
        aircraft.holds.traffic = false;
    } else {
        aircraft.memory.pushback = PushbackProgress::default();
    }
    aircraft.dynamics.release_brake();
    aircraft.set_radar(Some(RadarMode::Backward));
    Ok(())
}

/// Shared by the taxi states and pushback: start a traffic hold if a
/// tracked aircraft is in a blocking state.
pub(super) fn check_traffic(aircraft: &mut Aircraft, ctx: &TickContext<'_>) {
    if aircraft.holds.traffic {
        return;
    }
    let traffic = ctx.traffic;
    if let Some(blocker) = aircraft
        .tracker
        .first_blocking(|id| traffic.get(&id).map(|snapshot| snapshot.state))
    {
        debug!("{}: traffic {} ahead", aircraft.tail, blocker);
        aircraft.holds.traffic = true;
        aircraft.holding_for = Some(blocker);
    }
}

pub(super) fn pushback_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    check_traffic(aircraft, ctx);
    if aircraft.holds.traffic {
        return Ok(Some(LifecycleState::HoldOnTraffic));
    }

    let gate_name = assigned_gate(aircraft)?;
    let gate = ctx.airport.gate(&gate_name)?;
    let target = ctx.airport.waypoint(&gate.pushback_target)?;
    let position = aircraft.dynamics.position();
    let heading = aircraft.dynamics.heading();
    let progress = &mut aircraft.memory.pushback;

    if !progress.straight_done {
        let nose = flatten(gate.position - gate.entry).normalize_or_zero();
        let step = PUSHBACK_SPEED_MPS * dt;
        let moved = if ground_distance(gate.entry, position) <= step {
            DVec3::new(gate.entry.x, position.y, gate.entry.z)
        } else {
            position - nose * step
        };
        aircraft.dynamics.place(moved, heading);
        if ground_distance(gate.entry, moved) < PUSHBACK_STRAIGHT_DONE_M {
            progress.straight_done = true;
            progress.last_distance = ground_distance(moved, target);
        }
        return Ok(None);
    }

    let moved = position - aircraft.dynamics.forward() * PUSHBACK_SPEED_MPS * dt;
    aircraft.dynamics.place(moved, heading - PUSHBACK_YAW_RATE_DEG * dt);
    let distance = ground_distance(moved, target);
    if distance < PUSHBACK_TARGET_REACHED_M || distance >= progress.last_distance {
        ctx.airport.set_gate_status(&gate_name, GateStatus::Empty)?;
        aircraft.dynamics.stop();
        return Ok(Some(LifecycleState::TaxiToRunway));
    }
    progress.last_distance = distance;
    Ok(None)
}

/// Plan the arc from the current pose into the gate entry.
pub(crate) fn plan_gate_turn(
    position: DVec3,
    heading_deg: f64,
    entry: DVec3,
    gate: DVec3,
    gate_heading_deg: f64,
) -> GateTurn {
    let start = flatten(position);
    let entry = flatten(entry);
    let gate = flatten(gate);
    let right = right_of(heading_deg);
    let side = if (entry - start).dot(right) > 0.0 { 1.0 } else { -1.0 };

    let start_dir = direction_from_heading(heading_deg);
    let sweep = start_dir.angle_between(flatten(gate - entry)).to_degrees();
    let chord = (entry - start).length();
    let half_sin = (sweep.to_radians() / 2.0).sin();
    let radius = if half_sin > 1e-3 { chord / (2.0 * half_sin) } else { 0.0 };

    GateTurn {
        start,
        start_heading: heading_deg,
        center: start + right * side * radius,
        side,
        turned: 0.0,
        sweep,
        entry,
        gate,
        gate_heading: gate_heading_deg,
        // Already lined up: skip the arc
        on_entry: radius <= 0.0,
    }
}

pub(super) fn taxi_to_gate_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    let gate_name = assigned_gate(aircraft)?;
    let gate = ctx.airport.gate(&gate_name)?;
    let turn = plan_gate_turn(
        aircraft.dynamics.position(),
        aircraft.dynamics.heading(),
        gate.entry,
        gate.position,
        gate.heading_deg,
    );
    debug!(
        "{}: gate turn {} deg {}",
        aircraft.tail,
        turn.sweep,
        if turn.side > 0.0 { "right" } else { "left" }
    );
    aircraft.memory.gate_turn = Some(turn);
    aircraft.dynamics.set_thrust_input(0.0);
    aircraft.set_radar(Some(RadarMode::Forward));
    ctx.presentation.withdraw(aircraft.id(), PromptKind::HoldControl);
    Ok(())
}

pub(super) fn taxi_to_gate_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    let Some(mut turn) = aircraft.memory.gate_turn else {
        return Ok(None);
    };
    let height = aircraft.dynamics.position().y;

    if !turn.on_entry {
        turn.turned += GATE_TURN_RATE.to_degrees() * dt;
        let swing = turn.side * turn.turned;
        let mut position = turn.center + rotate_heading(turn.start - turn.center, swing);
        position.y = height;
        aircraft.dynamics.place(position, turn.start_heading + swing);
        if ground_distance(turn.entry, position) < GATE_ENTRY_SNAP_M || turn.turned >= turn.sweep {
            turn.on_entry = true;
            let mut entry = turn.entry;
            entry.y = height;
            aircraft.dynamics.place(entry, turn.gate_heading);
            aircraft.dynamics.stop();
        }
        aircraft.memory.gate_turn = Some(turn);
        return Ok(None);
    }

    let position = aircraft.dynamics.position();
    let remaining = flatten(turn.gate - position);
    if remaining.length() < GATE_PARKED_M {
        if aircraft.dynamics.engine_running() {
            aircraft.dynamics.toggle_engine();
        }
        let mut parked = turn.gate;
        parked.y = height;
        aircraft.dynamics.place(parked, turn.gate_heading);
        aircraft.dynamics.stop();
        aircraft.dynamics.apply_brake();
        set_gate(ctx, aircraft.gate.as_deref(), GateStatus::Occupied)?;
        return Ok(Some(LifecycleState::Inactive));
    }
    let step = remaining.normalize_or_zero() * GATE_ROLL_SPEED_MPS * dt;
    aircraft.dynamics.place(position + step, heading_of(remaining));
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_turn_right_quarter() {
        // Southbound on the apron lane, gate entry ahead and to the west
        let turn = plan_gate_turn(
            DVec3::new(240.0, 3.0, 250.0),
            180.0,
            DVec3::new(225.7, 0.0, 235.7),
            DVec3::new(200.0, 0.0, 235.7),
            270.0,
        );
        assert_eq!(turn.side, 1.0);
        assert!((turn.sweep - 90.0).abs() < 1e-6);
        assert!((turn.center - DVec3::new(225.7, 0.0, 250.0)).length() < 1e-6);

        let end = turn.center + rotate_heading(turn.start - turn.center, turn.sweep);
        assert!(ground_distance(end, turn.entry) < 1e-6);
    }

    #[test]
    fn test_gate_turn_left() {
        // Northbound with the entry to the west: turn left
        let turn = plan_gate_turn(
            DVec3::new(240.0, 0.0, 220.0),
            0.0,
            DVec3::new(225.7, 0.0, 234.3),
            DVec3::new(200.0, 0.0, 234.3),
            270.0,
        );
        assert_eq!(turn.side, -1.0);
        let end = turn.center + rotate_heading(turn.start - turn.center, -turn.sweep);
        assert!(ground_distance(end, turn.entry) < 1e-6);
    }

    #[test]
    fn test_aligned_gate_skips_arc() {
        let turn = plan_gate_turn(
            DVec3::new(240.0, 0.0, 235.7),
            270.0,
            DVec3::new(225.7, 0.0, 235.7),
            DVec3::new(200.0, 0.0, 235.7),
            270.0,
        );
        assert!(turn.on_entry);
    }
}
