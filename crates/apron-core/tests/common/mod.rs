//! Shared doubles for the integration tests.
#![allow(dead_code)]

use apron_core::channel::{SpeechSynthesizer, UtteranceId, Voice};
use apron_core::dynamics::{DynamicsFactory, FlightDynamics};
use apron_core::lifecycle::TickContext;
use apron_core::presentation::{Presentation, Prompt, PromptKind, Telemetry};
use apron_core::{
    AircraftId, Airport, Fleet, GroundChannel, LifecycleState, SimConfig, TickReport,
    TrafficSnapshot,
};
use glam::DVec3;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Everything a fake airframe knows; tests move it around directly.
#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub position: DVec3,
    pub heading: f64,
    pub altitude: f64,
    pub speed: f64,
    pub vertical_rate: f64,
    pub grounded: bool,
    pub thrust: f64,
    pub flaps: u8,
    pub trim: f64,
    pub engine: bool,
    pub brake: bool,
    pub steer: f64,
    pub pitch: f64,
    pub auto_heading: i32,
    pub auto_altitude: i32,
    pub auto_vertical_rate: i32,
    pub heading_switch: bool,
    pub altitude_switch: bool,
    pub vertical_rate_switch: bool,
    pub autopilot: bool,
}

pub type FakeHandle = Arc<Mutex<FakeState>>;

pub struct FakeDynamics(pub FakeHandle);

impl FakeDynamics {
    fn with<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&*self.0.lock().unwrap())
    }

    fn with_mut<T>(&mut self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut *self.0.lock().unwrap())
    }
}

impl FlightDynamics for FakeDynamics {
    fn altitude(&self) -> f64 {
        self.with(|s| s.altitude)
    }
    fn heading(&self) -> f64 {
        self.with(|s| s.heading)
    }
    fn speed(&self) -> f64 {
        self.with(|s| s.speed)
    }
    fn vertical_rate(&self) -> f64 {
        self.with(|s| s.vertical_rate)
    }
    fn is_grounded(&self) -> bool {
        self.with(|s| s.grounded)
    }
    fn position(&self) -> DVec3 {
        self.with(|s| s.position)
    }
    fn thrust_input(&self) -> f64 {
        self.with(|s| s.thrust)
    }
    fn flap_setting(&self) -> u8 {
        self.with(|s| s.flaps)
    }
    fn trim(&self) -> f64 {
        self.with(|s| s.trim)
    }
    fn engine_running(&self) -> bool {
        self.with(|s| s.engine)
    }

    fn set_steer_input(&mut self, steer: f64) {
        self.with_mut(|s| s.steer = steer);
    }
    fn set_pitch_input(&mut self, pitch: f64) {
        self.with_mut(|s| s.pitch = pitch);
    }
    fn set_thrust_input(&mut self, thrust: f64) {
        self.with_mut(|s| s.thrust = thrust.clamp(0.0, 1.0));
    }
    fn throttle_up(&mut self, amount: f64) {
        self.with_mut(|s| s.thrust = (s.thrust + amount).min(1.0));
    }
    fn throttle_down(&mut self, amount: f64) {
        self.with_mut(|s| s.thrust = (s.thrust - amount).max(0.0));
    }
    fn apply_brake(&mut self) {
        self.with_mut(|s| s.brake = true);
    }
    fn release_brake(&mut self) {
        self.with_mut(|s| s.brake = false);
    }

    fn set_auto_heading(&mut self, heading_deg: i32) {
        self.with_mut(|s| s.auto_heading = heading_deg);
    }
    fn set_auto_altitude(&mut self, altitude_ft: i32) {
        self.with_mut(|s| s.auto_altitude = altitude_ft);
    }
    fn set_auto_vertical_rate(&mut self, rate_fpm: i32) {
        self.with_mut(|s| s.auto_vertical_rate = rate_fpm);
    }
    fn set_auto_heading_switch(&mut self, on: bool) {
        self.with_mut(|s| s.heading_switch = on);
    }
    fn set_auto_altitude_switch(&mut self, on: bool) {
        self.with_mut(|s| s.altitude_switch = on);
    }
    fn set_auto_vertical_rate_switch(&mut self, on: bool) {
        self.with_mut(|s| s.vertical_rate_switch = on);
    }
    fn set_autopilot_switch(&mut self, on: bool) {
        self.with_mut(|s| s.autopilot = on);
    }

    fn toggle_engine(&mut self) {
        self.with_mut(|s| s.engine = !s.engine);
    }
    fn extend_flap(&mut self) -> u8 {
        self.with_mut(|s| {
            s.flaps = (s.flaps + 1).min(3);
            s.flaps
        })
    }
    fn retract_flap(&mut self) -> u8 {
        self.with_mut(|s| {
            s.flaps = s.flaps.saturating_sub(1);
            s.flaps
        })
    }
    fn trim_increase(&mut self, dt: f64) {
        self.with_mut(|s| s.trim += dt);
    }
    fn trim_decrease(&mut self, dt: f64) {
        self.with_mut(|s| s.trim -= dt);
    }

    fn place(&mut self, position: DVec3, heading_deg: f64) {
        self.with_mut(|s| {
            s.position = position;
            s.heading = heading_deg;
        });
    }
    fn stop(&mut self) {
        self.with_mut(|s| {
            s.speed = 0.0;
            s.vertical_rate = 0.0;
        });
    }
}

/// Hands out fake airframes and keeps a handle to each, in spawn order.
#[derive(Default)]
pub struct FakeFactory {
    pub created: Vec<FakeHandle>,
}

impl FakeFactory {
    pub fn last(&self) -> FakeHandle {
        self.created.last().cloned().unwrap()
    }
}

impl DynamicsFactory for FakeFactory {
    fn create(&mut self, position: DVec3, heading_deg: f64, speed_kt: f64) -> Box<dyn FlightDynamics> {
        let state = FakeState {
            position,
            heading: heading_deg,
            speed: speed_kt,
            altitude: position.y / 0.3048,
            grounded: speed_kt == 0.0,
            ..FakeState::default()
        };
        let handle = Arc::new(Mutex::new(state));
        self.created.push(handle.clone());
        Box::new(FakeDynamics(handle))
    }
}

pub fn fake_dynamics(position: DVec3, heading: f64) -> (Box<dyn FlightDynamics>, FakeHandle) {
    let mut factory = FakeFactory::default();
    let dynamics = factory.create(position, heading, 0.0);
    (dynamics, factory.last())
}

/// Records every card call and offered prompt.
#[derive(Debug, Default)]
pub struct RecordingPresentation {
    pub opened: Vec<AircraftId>,
    pub closed: Vec<AircraftId>,
    pub states: Vec<(AircraftId, LifecycleState)>,
    pub prompts: Vec<(AircraftId, Prompt)>,
    pub withdrawn: Vec<(AircraftId, PromptKind)>,
    pub disabled: Vec<(AircraftId, PromptKind, String)>,
    pub telemetry: BTreeMap<AircraftId, Telemetry>,
    /// Latest info line per card
    pub info: BTreeMap<AircraftId, String>,
    pub tails: BTreeMap<AircraftId, String>,
}

impl RecordingPresentation {
    /// Most recent prompt of `kind` offered to `aircraft`.
    pub fn prompt(&self, aircraft: AircraftId, kind: PromptKind) -> Option<&Prompt> {
        self.prompts
            .iter()
            .rev()
            .find(|(id, prompt)| *id == aircraft && prompt.kind == kind)
            .map(|(_, prompt)| prompt)
    }

    pub fn was_withdrawn(&self, aircraft: AircraftId, kind: PromptKind) -> bool {
        self.withdrawn.contains(&(aircraft, kind))
    }
}

impl Presentation for RecordingPresentation {
    fn open_card(&mut self, aircraft: AircraftId, _tail: &str) {
        self.opened.push(aircraft);
    }
    fn close_card(&mut self, aircraft: AircraftId) {
        self.closed.push(aircraft);
    }
    fn set_state_name(&mut self, aircraft: AircraftId, state: LifecycleState) {
        self.states.push((aircraft, state));
    }
    fn set_info(&mut self, aircraft: AircraftId, info: &str) {
        self.info.insert(aircraft, info.to_string());
    }
    fn set_tail_name(&mut self, aircraft: AircraftId, tail: &str) {
        self.tails.insert(aircraft, tail.to_string());
    }
    fn set_telemetry(&mut self, aircraft: AircraftId, telemetry: &Telemetry) {
        self.telemetry.insert(aircraft, *telemetry);
    }
    fn request_choice(&mut self, aircraft: AircraftId, prompt: Prompt) {
        self.prompts.push((aircraft, prompt));
    }
    fn withdraw(&mut self, aircraft: AircraftId, kind: PromptKind) {
        self.withdrawn.push((aircraft, kind));
    }
    fn disable_option(&mut self, aircraft: AircraftId, kind: PromptKind, option: &str) {
        self.disabled.push((aircraft, kind, option.to_string()));
    }
}

/// Speech that finishes each utterance after a fixed playback time.
#[derive(Debug, Default)]
pub struct ScriptedSpeech {
    pub duration: f64,
    pub spoken: Vec<(UtteranceId, String)>,
    playing: Vec<(UtteranceId, f64)>,
    next_id: UtteranceId,
}

impl ScriptedSpeech {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn playing(&self) -> usize {
        self.playing.len()
    }
}

impl SpeechSynthesizer for ScriptedSpeech {
    fn speak(&mut self, text: &str, _voice: &Voice) -> UtteranceId {
        let id = self.next_id;
        self.next_id += 1;
        self.spoken.push((id, text.to_string()));
        self.playing.push((id, self.duration));
        id
    }

    fn advance(&mut self, dt: f64) -> Vec<UtteranceId> {
        let mut done = Vec::new();
        for (id, remaining) in self.playing.iter_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                done.push(*id);
            }
        }
        self.playing.retain(|(id, _)| !done.contains(id));
        done
    }
}

pub fn test_voice(name: &str) -> Voice {
    Voice {
        name: name.to_string(),
        rate: 1.0,
        pitch: 1.0,
        volume: 1.0,
    }
}

/// Airport, channel and display for driving one aircraft through
/// `lifecycle::tick` without a fleet.
pub struct Harness {
    pub airport: Airport,
    pub channel: GroundChannel,
    pub presentation: RecordingPresentation,
    pub config: SimConfig,
    pub traffic: BTreeMap<AircraftId, TrafficSnapshot>,
}

impl Harness {
    pub fn new() -> Self {
        let airport = Airport::palo_alto();
        let channel = GroundChannel::new(airport.info.ground_controller(), test_voice("ground"));
        Self {
            airport,
            channel,
            presentation: RecordingPresentation::default(),
            config: SimConfig::default(),
            traffic: BTreeMap::new(),
        }
    }

    pub fn ctx(&mut self) -> TickContext<'_> {
        TickContext {
            airport: &mut self.airport,
            channel: &mut self.channel,
            presentation: &mut self.presentation,
            config: &self.config,
            traffic: &self.traffic,
        }
    }

    pub fn waypoint(&self, name: &str) -> DVec3 {
        self.airport.waypoint(name).unwrap()
    }
}

/// A fleet with its collaborators, ticked at a fixed step.
pub struct Sim {
    pub fleet: Fleet,
    pub speech: ScriptedSpeech,
    pub presentation: RecordingPresentation,
    pub factory: FakeFactory,
    pub dt: f64,
    pub reports: Vec<TickReport>,
}

impl Sim {
    pub fn new(config: SimConfig) -> Self {
        Self {
            fleet: Fleet::new(Airport::palo_alto(), config),
            speech: ScriptedSpeech::new(0.5),
            presentation: RecordingPresentation::default(),
            factory: FakeFactory::default(),
            dt: 0.5,
            reports: Vec::new(),
        }
    }

    /// Config with no scheduled arrivals and a fixed seed.
    pub fn quiet() -> Self {
        Self::new(SimConfig {
            inbound_interval_secs: 0.0,
            seed: Some(7),
            ..SimConfig::default()
        })
    }

    pub fn spawn_outbound(&mut self, gate: &str) -> AircraftId {
        self.fleet
            .spawn_outbound(gate, &mut self.factory, &mut self.presentation)
            .unwrap()
            .unwrap()
    }

    pub fn spawn_inbound(&mut self) -> AircraftId {
        self.fleet
            .spawn_inbound(&mut self.factory, &mut self.presentation)
            .unwrap()
            .unwrap()
    }

    pub fn tick(&mut self) {
        let report = self
            .fleet
            .tick(self.dt, &mut self.speech, &mut self.presentation, &mut self.factory)
            .unwrap();
        self.reports.push(report);
    }

    pub fn state(&self, id: AircraftId) -> Option<LifecycleState> {
        self.fleet.get(id).map(|a| a.state())
    }

    /// Tick until `id` is in `state`; panics after `max_ticks`.
    pub fn run_until_state(&mut self, id: AircraftId, state: LifecycleState, max_ticks: usize) {
        for _ in 0..max_ticks {
            if self.state(id) == Some(state) {
                return;
            }
            self.tick();
        }
        panic!("{} never reached {}, stuck in {:?}", id, state, self.state(id));
    }

    pub fn post(&mut self, id: AircraftId, event: apron_core::AircraftEvent) {
        assert!(self.fleet.post(id, event));
    }
}
