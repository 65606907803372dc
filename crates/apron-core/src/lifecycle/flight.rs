//! Airborne and runway states: takeoff roll and climb-out for departures,
//! approach, landing and rollout for arrivals.

use super::{LifecycleState, TickContext};
use crate::aircraft::{Aircraft, ApproachProgress};
use crate::approach::{FinalApproachController, FinalApproachGeometry, ThrottleDecision};
use crate::dynamics::SensedState;
use crate::error::{ConfigError, Result};
use crate::geometry::{flatten, ground_distance, heading_of, METERS_PER_FOOT};
use crate::presentation::{Prompt, PromptKind};
use glam::DVec3;
use std::collections::VecDeque;
use tracing::{debug, error, info};

const APPROACH_FLAP_SETTING: u8 = 3;
const APPROACH_TRIM_HIGH: f64 = -3.18;
const APPROACH_TRIM_LOW: f64 = -3.22;
const APPROACH_SPEED_HIGH_KT: f64 = 57.5;
const APPROACH_SPEED_LOW_KT: f64 = 56.5;
/// Height above the field at which the final approach hands over.
const FLARE_HEIGHT_FT: f64 = 10.0;
const ROLLOUT_SPEED_KT: f64 = 25.0;
const FLARE_SINK_LIMIT_FPM: f64 = -100.0;

pub(super) fn takeoff_entry(aircraft: &mut Aircraft) -> Result<()> {
    aircraft.dynamics.release_brake();
    Ok(())
}

pub(super) fn takeoff_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    let aim = ctx.airport.waypoint(&ctx.airport.departure.takeoff_aim)?;
    let command = aircraft.memory.pid.steer_toward(
        aircraft.dynamics.forward(),
        aircraft.dynamics.position(),
        aim,
        dt,
    );
    aircraft.dynamics.set_steer_input(command.steer);
    if aircraft.dynamics.thrust_input() < 1.0 {
        aircraft.dynamics.throttle_up(dt);
    }
    if !aircraft.dynamics.is_grounded() {
        info!("{} airborne", aircraft.tail);
        return Ok(Some(LifecycleState::Climb));
    }
    Ok(None)
}

pub(super) fn climb_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    let departure = &ctx.airport.departure;
    let dynamics = aircraft.dynamics.as_mut();
    dynamics.set_steer_input(0.0);
    dynamics.set_auto_heading(departure.climb_heading_deg as i32);
    dynamics.set_auto_altitude(departure.climb_altitude_ft as i32);
    dynamics.set_auto_vertical_rate(departure.climb_vertical_rate_fpm as i32);
    dynamics.set_auto_heading_switch(true);
    dynamics.set_auto_altitude_switch(true);
    dynamics.set_auto_vertical_rate_switch(true);
    dynamics.set_autopilot_switch(true);
    // The takeoff roll crosses the landing detectors too
    aircraft.reset_detection();
    Ok(())
}

pub(super) fn climb_update(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Option<LifecycleState> {
    let departure = &ctx.airport.departure;
    let altitude = aircraft.dynamics.altitude();
    if altitude > departure.flap_retract_altitude_ft && aircraft.dynamics.flap_setting() > 0 {
        aircraft.dynamics.retract_flap();
    }
    if altitude >= departure.climb_altitude_ft {
        return Some(LifecycleState::Inactive);
    }
    None
}

pub(super) fn on_radar_entry(aircraft: &mut Aircraft) -> Result<()> {
    if !aircraft.dynamics.engine_running() {
        aircraft.dynamics.toggle_engine();
    }
    aircraft.dynamics.set_thrust_input(1.0);
    if let Some(arrival) = aircraft.arrival {
        let dynamics = aircraft.dynamics.as_mut();
        dynamics.set_auto_heading(arrival.heading_deg as i32);
        dynamics.set_auto_altitude(arrival.altitude_ft as i32);
        dynamics.set_auto_heading_switch(true);
        dynamics.set_auto_altitude_switch(true);
        dynamics.set_autopilot_switch(true);
    }
    Ok(())
}

pub(super) fn arrival_runway_request_entry(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
) -> Result<()> {
    let runways = ctx.airport.runways_in_use().to_vec();
    ctx.presentation
        .request_choice(aircraft.id(), Prompt::new(PromptKind::ArrivalRunway, runways));
    Ok(())
}

pub(super) fn approach_request_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    ctx.presentation.withdraw(aircraft.id(), PromptKind::ArrivalRunway);
    let runway = aircraft.arrival_runway.clone().unwrap_or_default();
    let approaches = ctx.airport.approaches_for_runway(&runway);
    ctx.presentation
        .request_choice(aircraft.id(), Prompt::new(PromptKind::Approach, approaches));
    Ok(())
}

fn chosen_approach(aircraft: &Aircraft) -> Result<String> {
    aircraft
        .approach
        .clone()
        .ok_or_else(|| ConfigError::UnknownApproach(format!("none chosen by {}", aircraft.tail)))
}

pub(super) fn to_final_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    ctx.presentation.withdraw(aircraft.id(), PromptKind::Approach);
    let approach = ctx.airport.approach(&chosen_approach(aircraft)?)?;
    aircraft
        .dynamics
        .set_auto_altitude(approach.target_altitude_ft as i32);

    let fixes: VecDeque<String> = approach.waypoints.iter().cloned().collect();
    let best_distance = match fixes.front() {
        Some(head) => ground_distance(aircraft.dynamics.position(), ctx.airport.approach_fix(head)?),
        None => 0.0,
    };
    aircraft.memory.approach = ApproachProgress {
        fixes,
        timer: 0.0,
        best_distance,
    };
    Ok(())
}

pub(super) fn to_final_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    let dynamics = aircraft.dynamics.as_mut();
    if dynamics.flap_setting() < APPROACH_FLAP_SETTING {
        dynamics.extend_flap();
    }
    let trim = dynamics.trim();
    if trim > APPROACH_TRIM_HIGH {
        dynamics.trim_decrease(dt);
    } else if trim < APPROACH_TRIM_LOW {
        dynamics.trim_increase(dt);
    }
    let speed = dynamics.speed();
    if speed > APPROACH_SPEED_HIGH_KT {
        dynamics.throttle_down(dt / 2.0);
    } else if speed < APPROACH_SPEED_LOW_KT {
        dynamics.throttle_up(dt / 2.0);
    }

    let position = dynamics.position();
    let progress = &mut aircraft.memory.approach;
    progress.timer += dt;
    let Some(head_name) = progress.fixes.front().cloned() else {
        return Ok(Some(LifecycleState::OnFinal));
    };
    let mut head = ctx.airport.approach_fix(&head_name)?;
    let distance = ground_distance(position, head);

    let stuck = progress.timer > ctx.config.approach_stuck_secs && distance >= progress.best_distance;
    if stuck || distance < ctx.config.approach_capture_m {
        progress.fixes.pop_front();
        debug!("{}: passed fix {}", aircraft.tail, head_name);
        let Some(next_name) = progress.fixes.front() else {
            return Ok(Some(LifecycleState::OnFinal));
        };
        head = ctx.airport.approach_fix(next_name)?;
        progress.timer = 0.0;
        progress.best_distance = ground_distance(position, head);
    } else if distance < progress.best_distance {
        progress.best_distance = distance;
        progress.timer = 0.0;
    }

    let dynamics = aircraft.dynamics.as_mut();
    dynamics.set_auto_heading(heading_of(flatten(head - position)) as i32);
    dynamics.set_auto_altitude((head.y / METERS_PER_FOOT) as i32);
    Ok(None)
}

pub(super) fn on_final_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    let references = &ctx.airport.final_approach;
    let geometry = FinalApproachGeometry {
        descending_target: ctx.airport.landing_reference(&references.descending_target)?,
        runway_end: ctx.airport.landing_reference(&references.runway_end)?,
        runway_width_m: ctx
            .airport
            .runway_width_for_approach(&chosen_approach(aircraft)?)?,
    };
    aircraft.memory.final_approach = Some(FinalApproachController::new(
        geometry,
        ctx.config.final_interval_secs,
    ));
    aircraft.dynamics.set_auto_altitude_switch(false);
    aircraft.dynamics.set_auto_vertical_rate_switch(false);
    Ok(())
}

fn flare_altitude_ft(ctx: &TickContext<'_>) -> f64 {
    ctx.airport.info.field_elevation_ft + FLARE_HEIGHT_FT
}

pub(super) fn on_final_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Option<LifecycleState> {
    let sensed = SensedState::sense(aircraft.dynamics.as_ref());
    let controller = aircraft.memory.final_approach.as_mut()?;
    let command = controller.update(&sensed, aircraft.entered_runway, dt);
    command.apply(aircraft.dynamics.as_mut());

    match command.decision {
        Some(ThrottleDecision::Impossible) => error!(
            "{}: final approach cannot be corrected by throttle ({:?}, {:.0} ft vs {:.0} ft ideal)",
            aircraft.tail, command.category, sensed.altitude_ft, command.ideal_altitude_ft
        ),
        Some(ThrottleDecision::Adjust(delta)) => debug!(
            "{}: {:?} throttle {:+.1} at {:.0} m",
            aircraft.tail, command.category, delta, command.distance_m
        ),
        None => {}
    }

    if sensed.altitude_ft < flare_altitude_ft(ctx) {
        return Some(LifecycleState::TenAboveGround);
    }
    None
}

fn runway_end(ctx: &TickContext<'_>) -> Result<DVec3> {
    ctx.airport
        .landing_reference(&ctx.airport.final_approach.runway_end)
}

pub(super) fn ten_above_ground_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    if !aircraft.entered_runway {
        aircraft.dynamics.set_auto_altitude_switch(true);
        aircraft
            .dynamics
            .set_auto_altitude(flare_altitude_ft(ctx) as i32);
    }
    Ok(())
}

pub(super) fn ten_above_ground_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    let dynamics = aircraft.dynamics.as_mut();
    if aircraft.entered_runway {
        dynamics.set_auto_altitude_switch(false);
        dynamics.set_thrust_input(0.0);
        if dynamics.vertical_rate() < FLARE_SINK_LIMIT_FPM {
            dynamics.trim_decrease(dt);
        }
    }
    let end = runway_end(ctx)?;
    dynamics.set_auto_heading(heading_of(flatten(end - dynamics.position())) as i32);
    if dynamics.is_grounded() {
        info!("{} touched down", aircraft.tail);
        return Ok(Some(LifecycleState::TouchDown));
    }
    Ok(None)
}

/// Ground position where an exit leaves the runway.
fn exit_point(ctx: &TickContext<'_>, exit: &str) -> Result<DVec3> {
    let exit = ctx.airport.exit(exit)?;
    match exit.route.first() {
        Some(first) => ctx.airport.waypoint(first),
        None => Err(ConfigError::MalformedAirport(format!(
            "exit {} has an empty route",
            exit.name
        ))),
    }
}

pub(super) fn touch_down_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    aircraft.dynamics.set_auto_heading_switch(false);
    aircraft.dynamics.set_autopilot_switch(false);
    aircraft.memory.pid.reset();

    let exits = ctx.airport.exit_names();
    let mut live: Vec<String> = exits
        .iter()
        .filter(|exit| !aircraft.passed_exits.contains(*exit))
        .cloned()
        .collect();
    if live.is_empty() {
        // Rolled past every exit: take the last one
        live.extend(exits.last().cloned());
    }
    ctx.presentation
        .request_choice(aircraft.id(), Prompt::new(PromptKind::Exit, live.clone()));
    aircraft.memory.live_exits = live;
    Ok(())
}

pub(super) fn touch_down_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Result<Option<LifecycleState>> {
    let end = runway_end(ctx)?;
    let command = aircraft.memory.pid.steer_toward(
        aircraft.dynamics.forward(),
        aircraft.dynamics.position(),
        end,
        dt,
    );
    let dynamics = aircraft.dynamics.as_mut();
    dynamics.set_steer_input(command.steer);
    if dynamics.speed() > ROLLOUT_SPEED_KT {
        dynamics.throttle_down(dt);
        dynamics.apply_brake();
    } else {
        dynamics.throttle_up(dt / 3.0);
        dynamics.release_brake();
    }

    let position = dynamics.position();
    let id = aircraft.id();
    let live = &mut aircraft.memory.live_exits;
    while live.len() > 1 && aircraft.passed_exits.contains(&live[0]) {
        let dropped = live.remove(0);
        ctx.presentation
            .disable_option(id, PromptKind::Exit, &dropped);
    }
    if live.len() > 1 {
        let next = exit_point(ctx, &live[0])?;
        let after = exit_point(ctx, &live[1])?;
        if ground_distance(position, after) <= ground_distance(next, after) {
            let dropped = live.remove(0);
            debug!("{}: too late for exit {}", aircraft.tail, dropped);
            ctx.presentation
                .disable_option(id, PromptKind::Exit, &dropped);
        }
    }
    if live.len() == 1 {
        let exit = live.remove(0);
        ctx.presentation
            .disable_option(id, PromptKind::Exit, &exit);
        info!("{} taking exit {}", aircraft.tail, exit);
        aircraft.exit = Some(exit);
        return Ok(Some(LifecycleState::ExitRunway));
    }
    Ok(None)
}
