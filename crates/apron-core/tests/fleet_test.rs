//! Whole-fleet behaviour: spawning, the shared channel and slot recycling.

mod common;

use apron_core::channel::Side;
use apron_core::{
    AircraftEvent, AircraftId, Airport, Fleet, GateStatus, LifecycleState, PromptKind,
    ProximitySensor, SimConfig, TrafficSnapshot,
};
use common::Sim;
use std::sync::{Arc, Mutex};

/// Sees nothing, but remembers who looked.
#[derive(Default, Clone)]
struct RecordingSensor(Arc<Mutex<Vec<AircraftId>>>);

impl ProximitySensor for RecordingSensor {
    fn scan(&self, observer: &TrafficSnapshot, _others: &[TrafficSnapshot]) -> Vec<AircraftId> {
        self.0.lock().unwrap().push(observer.id);
        Vec::new()
    }
}

/// Answer every prompt offered since the last call, the way a tower
/// operator clicking through the card would.
fn answer_prompts(sim: &mut Sim, seen: &mut usize) {
    let fresh: Vec<_> = sim.presentation.prompts[*seen..].to_vec();
    *seen = sim.presentation.prompts.len();
    for (id, prompt) in fresh {
        let event = match prompt.kind {
            PromptKind::DepartureRunway => {
                AircraftEvent::DepartureRunwayChosen(prompt.options[0].clone())
            }
            PromptKind::Taxiway => AircraftEvent::TaxiwayChosen { automatic: true },
            PromptKind::PushbackApproval => AircraftEvent::PushbackApproved,
            PromptKind::Takeoff => AircraftEvent::TakeoffApproved,
            _ => continue,
        };
        sim.fleet.post(id, event);
    }
}

/// Move the fake airframe onto whatever the lifecycle is steering for.
fn fly_for(sim: &mut Sim, id: AircraftId) {
    let Some(aircraft) = sim.fleet.get(id) else {
        return;
    };
    let handle = sim.factory.created[id.index as usize].clone();
    match aircraft.state() {
        LifecycleState::TaxiToRunway => {
            if let Some(head) = aircraft.route.front() {
                let target = sim.fleet.airport().waypoint(head).unwrap();
                handle.lock().unwrap().position = target;
            }
        }
        LifecycleState::Takeoff => handle.lock().unwrap().grounded = false,
        LifecycleState::Climb => handle.lock().unwrap().altitude = 1200.0,
        _ => {}
    }
}

#[test]
fn test_spawn_occupies_gate_and_opens_card() {
    let mut sim = Sim::quiet();
    let id = sim.spawn_outbound("P1");
    assert_eq!(id, AircraftId::new(0, 0));
    assert_eq!(sim.fleet.airport().gate_status("P1").unwrap(), GateStatus::Occupied);
    assert_eq!(sim.state(id), Some(LifecycleState::Inactive));

    sim.tick();
    assert!(sim.presentation.opened.contains(&id));
    assert_eq!(sim.state(id), Some(LifecycleState::Loading));
    assert!(sim.presentation.telemetry.contains_key(&id));
    assert_eq!(sim.fleet.len(), 1);
    let tail = sim.fleet.get(id).unwrap().tail.clone();
    assert_eq!(sim.presentation.tails.get(&id), Some(&tail));
}

#[test]
fn test_taken_gate_spawns_nothing() {
    let mut sim = Sim::quiet();
    sim.spawn_outbound("P1");
    let again = sim
        .fleet
        .spawn_outbound("P1", &mut sim.factory, &mut sim.presentation)
        .unwrap();
    assert_eq!(again, None);
    assert_eq!(sim.fleet.len(), 1);
}

#[test]
fn test_unknown_gate_is_an_error() {
    let mut sim = Sim::quiet();
    assert!(sim
        .fleet
        .spawn_outbound("Z9", &mut sim.factory, &mut sim.presentation)
        .is_err());
}

#[test]
fn test_pool_capacity_limits_spawns() {
    let mut sim = Sim::new(SimConfig {
        pool_capacity: 2,
        inbound_interval_secs: 0.0,
        seed: Some(3),
        ..SimConfig::default()
    });
    sim.spawn_outbound("P1");
    sim.spawn_outbound("Q1");
    let third = sim
        .fleet
        .spawn_outbound("S1", &mut sim.factory, &mut sim.presentation)
        .unwrap();
    assert_eq!(third, None);
    assert_eq!(sim.fleet.airport().gate_status("S1").unwrap(), GateStatus::Empty);
}

#[test]
fn test_inbound_schedule_respects_limit() {
    let mut sim = Sim::new(SimConfig {
        inbound_interval_secs: 10.0,
        max_inbound: 1,
        seed: Some(5),
        ..SimConfig::default()
    });
    for _ in 0..19 {
        sim.tick();
    }
    assert!(sim.fleet.is_empty());

    sim.tick();
    assert_eq!(sim.reports.last().unwrap().spawned.len(), 1);
    assert_eq!(sim.fleet.inbound_count(), 1);

    for _ in 0..40 {
        sim.tick();
    }
    let spawned: usize = sim.reports.iter().map(|r| r.spawned.len()).sum();
    assert_eq!(spawned, 1);
    let arrival = sim.reports[19].spawned[0];
    assert_eq!(sim.state(arrival), Some(LifecycleState::ArrivalRunwayRequest));
}

#[test]
fn test_full_pool_skips_scheduled_arrival() {
    let mut sim = Sim::new(SimConfig {
        pool_capacity: 1,
        inbound_interval_secs: 1.0,
        max_inbound: 3,
        seed: Some(5),
        ..SimConfig::default()
    });
    sim.spawn_outbound("P1");
    sim.tick();
    sim.tick();
    assert_eq!(sim.reports[1].skipped_spawns, 1);
    assert_eq!(sim.fleet.inbound_count(), 0);
}

#[test]
fn test_two_departures_share_the_frequency() {
    let mut sim = Sim::quiet();
    let first = sim.spawn_outbound("P1");
    let second = sim.spawn_outbound("Q1");
    let mut seen = 0;

    for _ in 0..40 {
        answer_prompts(&mut sim, &mut seen);
        sim.tick();
        assert!(sim.speech.playing() <= 1);
    }

    let spoken: Vec<(Side, AircraftId)> = sim
        .reports
        .iter()
        .filter_map(|r| r.spoken.as_ref())
        .map(|s| (s.side, s.aircraft))
        .collect();
    assert!(spoken.len() >= 4);
    assert_eq!(
        spoken[..3],
        [
            (Side::Request, first),
            (Side::Request, second),
            (Side::Response, first),
        ]
    );
    assert!(sim.presentation.prompt(second, PromptKind::DepartureRunway).is_some());
}

#[test]
fn test_departure_runs_to_retirement_and_slot_is_reused() {
    let mut sim = Sim::quiet();
    let id = sim.spawn_outbound("P1");
    let mut seen = 0;
    let mut visited = Vec::new();

    for _ in 0..800 {
        answer_prompts(&mut sim, &mut seen);
        fly_for(&mut sim, id);
        sim.tick();
        if let Some(state) = sim.state(id) {
            if visited.last() != Some(&state) {
                visited.push(state);
            }
        }
        if sim.reports.last().unwrap().retired.contains(&id) {
            break;
        }
    }

    assert!(sim.fleet.get(id).is_none(), "stuck in {:?}", visited.last());
    for state in [
        LifecycleState::Loading,
        LifecycleState::DepartureRunwayRequest,
        LifecycleState::TaxiwayRequest,
        LifecycleState::PushbackRequest,
        LifecycleState::Pushback,
        LifecycleState::TaxiToRunway,
        LifecycleState::HoldOnEnterRunway,
        LifecycleState::Takeoff,
        LifecycleState::Climb,
    ] {
        assert!(visited.contains(&state), "never visited {}", state);
    }
    assert!(sim.presentation.closed.contains(&id));
    assert_eq!(sim.fleet.airport().gate_status("P1").unwrap(), GateStatus::Empty);
    assert!(!sim.fleet.post(id, AircraftEvent::HoldCommanded));

    let next = sim.spawn_outbound("P1");
    assert_eq!(next, AircraftId::new(0, 1));
    assert!(sim.fleet.get(id).is_none());
    assert!(sim.fleet.get(next).is_some());
}

#[test]
fn test_sensor_scans_only_once_radar_is_on() {
    let mut sim = Sim::quiet();
    let sensor = RecordingSensor::default();
    sim.fleet = Fleet::new(Airport::palo_alto(), sim.fleet.config().clone())
        .with_sensor(Box::new(sensor.clone()));
    let id = sim.spawn_outbound("P1");
    let mut seen = 0;

    for _ in 0..400 {
        if sim.state(id) == Some(LifecycleState::Pushback) {
            break;
        }
        assert!(sensor.0.lock().unwrap().is_empty());
        answer_prompts(&mut sim, &mut seen);
        sim.tick();
    }
    assert_eq!(sim.state(id), Some(LifecycleState::Pushback));

    sim.tick();
    assert_eq!(sensor.0.lock().unwrap().as_slice(), &[id]);
}
