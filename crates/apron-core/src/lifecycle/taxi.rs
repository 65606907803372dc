//! Taxi states: gate to runway for departures, runway exit to apron for
//! arrivals.
//!
//! Both follow a waypoint route with the steering PID and the taxi speed
//! table. Hold conditions only take effect once the aircraft has stopped, so
//! waypoints captured while braking are still consumed.

use super::gate::check_traffic;
use super::{LifecycleState, TickContext};
use crate::aircraft::{Aircraft, HoldFlags};
use crate::error::Result;
use crate::geometry::ground_distance;
use crate::models::GateStatus;
use crate::presentation::{Prompt, PromptKind};
use crate::steering::{govern_speed, target_taxi_speed};
use crate::traffic::RadarMode;
use tracing::{debug, info, warn};

const TAXI_FLAP_SETTING: u8 = 2;
const TRIM_DEADBAND: f64 = 0.05;

/// Outcome of following the route for one tick.
enum RouteStep {
    /// Target speed for the governor
    Rolling(f64),
    /// The head waypoint was captured; the name is returned
    Captured(String, f64),
    Finished,
}

/// Steer toward the head of the route and pop it once captured.
fn follow_route(aircraft: &mut Aircraft, ctx: &TickContext<'_>, dt: f64) -> Result<RouteStep> {
    let Some(head) = aircraft.route.front().cloned() else {
        return Ok(RouteStep::Finished);
    };
    let target = ctx.airport.waypoint(&head)?;
    let position = aircraft.dynamics.position();
    let command = aircraft
        .memory
        .pid
        .steer_toward(aircraft.dynamics.forward(), position, target, dt);
    aircraft.dynamics.set_steer_input(command.steer);

    let distance = ground_distance(position, target);
    let speed = target_taxi_speed(distance, command.error_deg, ctx.config);
    if distance < ctx.config.waypoint_capture_m {
        aircraft.route.pop_front();
        debug!("{}: reached {}", aircraft.tail, head);
        return Ok(RouteStep::Captured(head, speed));
    }
    Ok(RouteStep::Rolling(speed))
}

/// Hold that should start now that the aircraft is at rest, command first.
fn stopped_hold(holds: HoldFlags) -> Option<LifecycleState> {
    if holds.command {
        Some(LifecycleState::HoldOnCommand)
    } else if holds.traffic {
        Some(LifecycleState::HoldOnTraffic)
    } else if holds.enter_runway {
        Some(LifecycleState::HoldOnEnterRunway)
    } else {
        None
    }
}

/// Zero the target speed while any hold is pending and report the hold
/// to enter once stopped.
fn pending_hold(aircraft: &Aircraft, ctx: &TickContext<'_>, target_speed: &mut f64) -> Option<LifecycleState> {
    if !aircraft.holds.any() {
        return None;
    }
    *target_speed = 0.0;
    if aircraft.dynamics.speed() < ctx.config.stopped_speed_kt {
        return stopped_hold(aircraft.holds);
    }
    None
}

fn resume_flags(aircraft: &mut Aircraft, from: LifecycleState) {
    aircraft.holds.command = false;
    if from == LifecycleState::HoldOnTraffic {
        aircraft.holds.traffic = false;
    }
}

pub(super) fn taxi_to_runway_entry(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    from: LifecycleState,
) -> Result<()> {
    if from == LifecycleState::Pushback {
        aircraft.memory.pid.reset();
    }
    resume_flags(aircraft, from);
    aircraft.holds.enter_runway = false;
    if let Some(head) = aircraft.route.front() {
        ctx.airport.waypoint(head)?;
    }
    ctx.presentation
        .request_choice(aircraft.id(), Prompt::button(PromptKind::HoldControl));
    aircraft.set_radar(Some(RadarMode::Forward));
    Ok(())
}

pub(super) fn taxi_to_runway_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    check_traffic(aircraft, ctx);

    let mut target_speed = match follow_route(aircraft, ctx, dt)? {
        RouteStep::Rolling(speed) => speed,
        RouteStep::Captured(name, speed) => {
            let departure = &ctx.airport.departure;
            if name == departure.takeoff_position {
                aircraft.route.clear();
                ctx.presentation.withdraw(aircraft.id(), PromptKind::HoldControl);
                return Ok(Some(if aircraft.takeoff_approved {
                    LifecycleState::Takeoff
                } else {
                    LifecycleState::HoldOnTakeoff
                }));
            }
            if name == departure.hold_short && !aircraft.takeoff_approved {
                aircraft.holds.enter_runway = true;
            }
            speed
        }
        RouteStep::Finished => {
            warn!("{}: departure route ran out before the runway", aircraft.tail);
            0.0
        }
    };

    if let Some(hold) = pending_hold(aircraft, ctx, &mut target_speed) {
        if hold == LifecycleState::HoldOnEnterRunway {
            info!("{} holding short of runway", aircraft.tail);
        }
        return Ok(Some(hold));
    }

    govern_speed(aircraft.dynamics.as_mut(), target_speed, dt);

    let flaps = aircraft.dynamics.flap_setting();
    if flaps < TAXI_FLAP_SETTING {
        aircraft.dynamics.extend_flap();
    } else if flaps > TAXI_FLAP_SETTING {
        aircraft.dynamics.retract_flap();
    }
    Ok(None)
}

pub(super) fn exit_runway_entry(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    from: LifecycleState,
) -> Result<()> {
    if from == LifecycleState::TouchDown {
        let exit = aircraft.exit.clone().unwrap_or_default();
        aircraft.route = ctx.airport.exit_route(&exit)?.into();
        aircraft.memory.pid.reset();
        if aircraft.gate.is_none() {
            ctx.presentation.request_choice(
                aircraft.id(),
                Prompt::new(PromptKind::ParkingGate, ctx.airport.available_gates()),
            );
        }
    }
    resume_flags(aircraft, from);
    ctx.presentation
        .request_choice(aircraft.id(), Prompt::button(PromptKind::HoldControl));
    aircraft.set_radar(Some(RadarMode::Forward));
    Ok(())
}

pub(super) fn exit_runway_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    check_traffic(aircraft, ctx);

    let mut target_speed = match follow_route(aircraft, ctx, dt)? {
        RouteStep::Rolling(speed) | RouteStep::Captured(_, speed) => speed,
        RouteStep::Finished => 0.0,
    };
    if aircraft.route.is_empty() {
        return Ok(Some(if aircraft.gate.is_none() {
            LifecycleState::HoldOnParkingSelection
        } else {
            LifecycleState::TaxiToGate
        }));
    }

    if let Some(hold) = pending_hold(aircraft, ctx, &mut target_speed) {
        return Ok(Some(hold));
    }

    govern_speed(aircraft.dynamics.as_mut(), target_speed, dt);

    if aircraft.dynamics.flap_setting() > 0 {
        aircraft.dynamics.retract_flap();
    }
    let trim = aircraft.dynamics.trim();
    if trim > TRIM_DEADBAND {
        aircraft.dynamics.trim_decrease(dt);
    } else if trim < -TRIM_DEADBAND {
        aircraft.dynamics.trim_increase(dt);
    }
    Ok(None)
}

/// Reserve the chosen gate and extend the route to it.
pub(super) fn on_gate_chosen(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    gate: String,
) -> Result<Option<LifecycleState>> {
    if !aircraft.is_inbound() || aircraft.gate.is_some() {
        debug!("{}: gate choice {} ignored", aircraft.tail, gate);
        return Ok(None);
    }
    let Some(exit) = aircraft.exit.clone() else {
        debug!("{}: gate chosen before an exit", aircraft.tail);
        return Ok(None);
    };
    if ctx.airport.gate_status(&gate)? != GateStatus::Empty {
        warn!("{}: gate {} is not available", aircraft.tail, gate);
        return Ok(None);
    }
    ctx.airport.set_gate_status(&gate, GateStatus::Reserved)?;
    aircraft
        .route
        .extend(ctx.airport.taxi_in_route(&exit, &gate)?);
    ctx.presentation.withdraw(aircraft.id(), PromptKind::ParkingGate);
    info!("{} assigned gate {}", aircraft.tail, gate);
    aircraft.gate = Some(gate);

    if aircraft.state() == LifecycleState::HoldOnParkingSelection {
        return Ok(Some(LifecycleState::ExitRunway));
    }
    Ok(None)
}
