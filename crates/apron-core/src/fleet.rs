//! Aircraft arena and the per-tick simulation driver.
//!
//! Slots are reused. Every recycle bumps the slot generation so stale
//! [`AircraftId`] handles held by trackers, the channel or callers stop
//! resolving instead of pointing at a new flight.

use crate::aircraft::{generate_tail, Aircraft};
use crate::airport::Airport;
use crate::channel::{Delivery, GroundChannel, SpeechSynthesizer, Spoken, Voice};
use crate::config::SimConfig;
use crate::dynamics::DynamicsFactory;
use crate::error::Result;
use crate::lifecycle::{self, TickContext};
use crate::models::{AircraftId, GateStatus, ZoneKind};
use crate::presentation::{AircraftEvent, Presentation, Telemetry};
use crate::traffic::{ConeRadar, ProximitySensor, TrafficSnapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    aircraft: Option<Aircraft>,
}

/// What happened during one [`Fleet::tick`].
#[derive(Debug, Default)]
pub struct TickReport {
    pub spawned: Vec<AircraftId>,
    pub retired: Vec<AircraftId>,
    /// Utterance started on the ground channel this tick
    pub spoken: Option<Spoken>,
    /// Scheduled arrivals dropped for lack of a free slot
    pub skipped_spawns: usize,
}

pub struct Fleet {
    config: SimConfig,
    airport: Airport,
    channel: GroundChannel,
    sensor: Box<dyn ProximitySensor + Send>,
    slots: Vec<Slot>,
    rng: StdRng,
    clock: f64,
    spawn_timer: f64,
}

impl Fleet {
    pub fn new(airport: Airport, config: SimConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let controller = airport.info.ground_controller();
        let voice = Voice::random(controller.clone(), &mut rng);
        let sensor = ConeRadar {
            range_m: config.radar_range_m,
            half_angle_deg: config.radar_half_angle_deg,
        };
        Self {
            channel: GroundChannel::new(controller, voice),
            sensor: Box::new(sensor),
            slots: Vec::with_capacity(config.pool_capacity),
            config,
            airport,
            rng,
            clock: 0.0,
            spawn_timer: 0.0,
        }
    }

    /// Replace the default cone radar.
    pub fn with_sensor(mut self, sensor: Box<dyn ProximitySensor + Send>) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn airport(&self) -> &Airport {
        &self.airport
    }

    pub fn channel(&self) -> &GroundChannel {
        &self.channel
    }

    /// Simulated seconds since the fleet was created.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn get(&self, id: AircraftId) -> Option<&Aircraft> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.aircraft.as_ref())
    }

    pub fn get_mut(&mut self, id: AircraftId) -> Option<&mut Aircraft> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.aircraft.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aircraft> {
        self.slots.iter().filter_map(|slot| slot.aircraft.as_ref())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inbound_count(&self) -> usize {
        self.iter().filter(|a| a.is_inbound()).count()
    }

    /// Queue an event for the aircraft's next tick.
    ///
    /// Returns false when the handle no longer resolves.
    pub fn post(&mut self, id: AircraftId, event: AircraftEvent) -> bool {
        match self.get_mut(id) {
            Some(aircraft) => {
                aircraft.post(event);
                true
            }
            None => {
                warn!("Event {:?} for unknown aircraft {} dropped", event, id);
                false
            }
        }
    }

    fn allocate(&mut self) -> Option<AircraftId> {
        if let Some(index) = self.slots.iter().position(|slot| slot.aircraft.is_none()) {
            return Some(AircraftId::new(index as u32, self.slots[index].generation));
        }
        if self.slots.len() < self.config.pool_capacity {
            self.slots.push(Slot::default());
            return Some(AircraftId::new((self.slots.len() - 1) as u32, 0));
        }
        None
    }

    /// Park a new departure at `gate`.
    ///
    /// Returns `Ok(None)` when the gate is taken or the pool is full.
    pub fn spawn_outbound(
        &mut self,
        gate: &str,
        factory: &mut dyn DynamicsFactory,
        presentation: &mut dyn Presentation,
    ) -> Result<Option<AircraftId>> {
        let parked = self.airport.gate(gate)?;
        if parked.status != GateStatus::Empty {
            warn!("Gate {} is {:?}, departure not spawned", gate, parked.status);
            return Ok(None);
        }
        let mut position = parked.position;
        position.y = self.airport.ground_height_m();
        let heading = parked.heading_deg;

        let Some(id) = self.allocate() else {
            warn!("No free aircraft slot for a departure at {}", gate);
            return Ok(None);
        };
        let tail = generate_tail(&mut self.rng);
        let voice = Voice::random(tail.clone(), &mut self.rng);
        let dynamics = factory.create(position, heading, 0.0);
        let aircraft = Aircraft::outbound(id, tail, gate, dynamics, voice);
        self.admit(aircraft, presentation).map(Some)
    }

    /// Put a new arrival on radar at the airport's arrival entry.
    pub fn spawn_inbound(
        &mut self,
        factory: &mut dyn DynamicsFactory,
        presentation: &mut dyn Presentation,
    ) -> Result<Option<AircraftId>> {
        let Some(id) = self.allocate() else {
            warn!("No free aircraft slot for an arrival, spawn skipped");
            return Ok(None);
        };
        let arrival = self.airport.arrival;
        let tail = generate_tail(&mut self.rng);
        let voice = Voice::random(tail.clone(), &mut self.rng);
        let dynamics = factory.create(arrival.position, arrival.heading_deg, arrival.speed_kt);
        let aircraft = Aircraft::inbound(id, tail, arrival, dynamics, voice);
        self.admit(aircraft, presentation).map(Some)
    }

    fn admit(&mut self, mut aircraft: Aircraft, presentation: &mut dyn Presentation) -> Result<AircraftId> {
        let traffic = BTreeMap::new();
        let mut ctx = TickContext {
            airport: &mut self.airport,
            channel: &mut self.channel,
            presentation,
            config: &self.config,
            traffic: &traffic,
        };
        lifecycle::activate(&mut aircraft, &mut ctx)?;
        let id = aircraft.id();
        info!(
            "Spawned {} {} as {:?}{}",
            aircraft.tail,
            id,
            aircraft.role,
            aircraft.gate.as_deref().map(|g| format!(" at {}", g)).unwrap_or_default()
        );
        self.slots[id.index as usize].aircraft = Some(aircraft);
        Ok(id)
    }

    /// Advance the whole simulation by `dt` seconds.
    pub fn tick(
        &mut self,
        dt: f64,
        speech: &mut dyn SpeechSynthesizer,
        presentation: &mut dyn Presentation,
        factory: &mut dyn DynamicsFactory,
    ) -> Result<TickReport> {
        let mut report = TickReport::default();
        self.clock += dt;

        self.run_spawn_schedule(dt, factory, presentation, &mut report)?;

        let snapshots: Vec<TrafficSnapshot> = self.iter().map(Aircraft::snapshot).collect();
        let traffic: BTreeMap<AircraftId, TrafficSnapshot> =
            snapshots.iter().map(|s| (s.id, s.clone())).collect();

        self.detect(&snapshots, &traffic);

        for slot in self.slots.iter_mut() {
            let Some(aircraft) = slot.aircraft.as_mut() else {
                continue;
            };
            let mut ctx = TickContext {
                airport: &mut self.airport,
                channel: &mut self.channel,
                presentation: &mut *presentation,
                config: &self.config,
                traffic: &traffic,
            };
            lifecycle::tick(aircraft, &mut ctx, dt)?;
        }

        for utterance in speech.advance(dt) {
            match self.channel.on_utterance_complete(utterance) {
                Some(Delivery::RequestSpoken {
                    aircraft,
                    request_id,
                    ..
                }) => {
                    self.post(aircraft, AircraftEvent::RequestSpoken { request_id });
                }
                Some(Delivery::ResponseSpoken {
                    aircraft,
                    request_id,
                    from,
                    to,
                }) => {
                    self.post(aircraft, AircraftEvent::ResponseSpoken { request_id, from, to });
                }
                None => {}
            }
        }
        report.spoken = self.channel.tick(speech);

        for aircraft in self.iter().filter(|a| !a.is_retired()) {
            let dynamics = aircraft.dynamics();
            presentation.set_telemetry(
                aircraft.id(),
                &Telemetry {
                    altitude_ft: dynamics.altitude(),
                    speed_kt: dynamics.speed(),
                    heading_deg: dynamics.heading(),
                    vertical_rate_fpm: dynamics.vertical_rate(),
                },
            );
        }

        self.recycle(&mut report);
        Ok(report)
    }

    fn run_spawn_schedule(
        &mut self,
        dt: f64,
        factory: &mut dyn DynamicsFactory,
        presentation: &mut dyn Presentation,
        report: &mut TickReport,
    ) -> Result<()> {
        let interval = self.config.inbound_interval_secs;
        if interval <= 0.0 {
            return Ok(());
        }
        self.spawn_timer += dt;
        if self.spawn_timer < interval {
            return Ok(());
        }
        self.spawn_timer -= interval;
        if self.inbound_count() >= self.config.max_inbound {
            debug!("Inbound limit {} reached, no arrival this cycle", self.config.max_inbound);
            return Ok(());
        }
        match self.spawn_inbound(factory, presentation)? {
            Some(id) => report.spawned.push(id),
            None => report.skipped_spawns += 1,
        }
        Ok(())
    }

    /// Detection zones and radar scans, run on the start-of-tick snapshots.
    fn detect(&mut self, snapshots: &[TrafficSnapshot], traffic: &BTreeMap<AircraftId, TrafficSnapshot>) {
        for slot in self.slots.iter_mut() {
            let Some(aircraft) = slot.aircraft.as_mut() else {
                continue;
            };
            let position = aircraft.dynamics().position();
            for zone in self.airport.zones_containing(position) {
                match &zone.kind {
                    ZoneKind::RunwayEntry => {
                        if !aircraft.entered_runway {
                            debug!("{} entered the runway", aircraft.tail);
                            aircraft.entered_runway = true;
                        }
                    }
                    ZoneKind::ExitPassed(exit) => {
                        if aircraft.passed_exits.insert(exit.clone()) {
                            debug!("{} passed exit {}", aircraft.tail, exit);
                        }
                    }
                }
            }

            let Some(observer) = traffic.get(&aircraft.id()) else {
                continue;
            };
            if observer.radar.is_none() {
                continue;
            }
            for hit in self.sensor.scan(observer, snapshots) {
                let Some(other) = traffic.get(&hit) else {
                    continue;
                };
                if aircraft.tracker.admit(hit, other.state) {
                    debug!("{} tracking {} ({})", aircraft.tail, other.tail, other.state);
                }
            }
        }
    }

    fn recycle(&mut self, report: &mut TickReport) {
        for slot in self.slots.iter_mut() {
            if !slot.aircraft.as_ref().is_some_and(Aircraft::is_retired) {
                continue;
            }
            if let Some(aircraft) = slot.aircraft.take() {
                let id = aircraft.id();
                self.channel.purge_aircraft(id);
                slot.generation = slot.generation.wrapping_add(1);
                info!("Retired {} {}", aircraft.tail, id);
                report.retired.push(id);
            }
        }
        for id in &report.retired {
            for slot in self.slots.iter_mut() {
                if let Some(aircraft) = slot.aircraft.as_mut() {
                    aircraft.tracker.remove(*id);
                }
            }
        }
    }
}
