//! Hold states.
//!
//! A hold suspends forward progress until its release condition shows up,
//! then returns to the state recorded as its origin. Holds entered from
//! another hold keep the first origin.

use super::{LifecycleState, TickContext};
use crate::aircraft::Aircraft;
use crate::error::Result;
use crate::presentation::{Prompt, PromptKind};
use crate::traffic::traffic_cleared;
use tracing::{debug, info};

/// Record where to resume unless we came from another hold.
fn remember_origin(aircraft: &mut Aircraft, from: LifecycleState) {
    if !from.is_hold() || aircraft.hold_origin.is_none() {
        aircraft.hold_origin = Some(from);
    }
}

pub(super) fn origin_hold_entry(aircraft: &mut Aircraft, from: LifecycleState) -> Result<()> {
    remember_origin(aircraft, from);
    Ok(())
}

pub(super) fn traffic_entry(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    from: LifecycleState,
) -> Result<()> {
    remember_origin(aircraft, from);
    if let Some(blocker) = aircraft.holding_for {
        let name = ctx
            .traffic
            .get(&blocker)
            .map(|snapshot| snapshot.tail.clone())
            .unwrap_or_else(|| blocker.to_string());
        info!("{} holding for traffic {}", aircraft.tail, name);
        ctx.presentation
            .set_info(aircraft.id(), &format!("Hold on: {}", name));
    }
    Ok(())
}

/// Brake to a standstill.
pub(super) fn hold_still(aircraft: &mut Aircraft, dt: f64) {
    if aircraft.dynamics.speed() > 0.0 {
        aircraft.dynamics.throttle_down(dt);
        aircraft.dynamics.apply_brake();
    }
}

/// Return to the recorded origin and forget it.
pub(super) fn release_to_origin(aircraft: &mut Aircraft) -> Option<LifecycleState> {
    let origin = aircraft.hold_origin.take();
    if origin.is_none() {
        debug!("{}: hold released without an origin", aircraft.tail);
    }
    origin
}

pub(super) fn traffic_update(
    aircraft: &mut Aircraft,
    ctx: &mut TickContext<'_>,
    dt: f64,
) -> Option<LifecycleState> {
    hold_still(aircraft, dt);
    if aircraft.holds.command {
        return Some(LifecycleState::HoldOnCommand);
    }
    let blocker = aircraft.holding_for.and_then(|id| ctx.traffic.get(&id));
    let release = ctx.config.traffic_release_distance();
    if !traffic_cleared(aircraft.dynamics.position(), blocker, release) {
        return None;
    }
    if let Some(id) = aircraft.holding_for.take() {
        aircraft.tracker.remove(id);
        debug!("{}: traffic {} cleared", aircraft.tail, id);
    }
    aircraft.holds.traffic = false;
    release_to_origin(aircraft)
}

pub(super) fn enter_runway_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    aircraft.holds.enter_runway = false;
    if !aircraft.takeoff_approved {
        ctx.presentation
            .request_choice(aircraft.id(), Prompt::button(PromptKind::Takeoff));
    }
    ctx.presentation
        .request_choice(aircraft.id(), Prompt::button(PromptKind::Align));
    Ok(())
}

pub(super) fn takeoff_entry(aircraft: &mut Aircraft, ctx: &mut TickContext<'_>) -> Result<()> {
    ctx.presentation
        .request_choice(aircraft.id(), Prompt::button(PromptKind::Takeoff));
    Ok(())
}

pub(super) fn parking_selection_entry(aircraft: &mut Aircraft) -> Result<()> {
    aircraft.dynamics.apply_brake();
    Ok(())
}
