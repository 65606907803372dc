//! Frame loop tying the fleet to its headless collaborators.

use crate::kinematics::KinematicFactory;
use crate::radio::RadioLog;
use crate::tower::ScriptedTower;
use anyhow::Context;
use apron_core::{Airport, Fleet, SimConfig, TickReport};
use serde::Serialize;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Simulated seconds to run
    pub duration_secs: f64,
    /// Frame length in simulated seconds
    pub dt: f64,
    /// Pace frames against the wall clock
    pub realtime: bool,
    /// Departures parked at these gates before the first frame
    pub outbound_gates: Vec<String>,
    /// Operator reaction time in seconds
    pub reaction_secs: f64,
    pub preferred_approach: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            duration_secs: 600.0,
            dt: 0.1,
            realtime: false,
            outbound_gates: vec!["P1".to_string()],
            reaction_secs: 2.0,
            preferred_approach: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub sim_secs: f64,
    pub spawned: usize,
    pub retired: usize,
    pub transmissions: usize,
    pub skipped_spawns: usize,
    pub active: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &TickReport) {
        self.frames += 1;
        self.spawned += report.spawned.len();
        self.retired += report.retired.len();
        self.skipped_spawns += report.skipped_spawns;
        if report.spoken.is_some() {
            self.transmissions += 1;
        }
    }
}

pub struct Simulation {
    pub fleet: Fleet,
    pub tower: ScriptedTower,
    pub radio: RadioLog,
    pub factory: KinematicFactory,
    dt: f64,
    summary: RunSummary,
}

impl Simulation {
    pub fn new(airport: Airport, config: SimConfig, options: &RunOptions) -> Self {
        let factory = KinematicFactory::new(airport.info.field_elevation_ft);
        let mut tower = ScriptedTower::new(options.reaction_secs);
        if let Some(approach) = &options.preferred_approach {
            tower = tower.with_preferred_approach(approach.clone());
        }
        Self {
            fleet: Fleet::new(airport, config),
            tower,
            radio: RadioLog::new(),
            factory,
            dt: options.dt,
            summary: RunSummary::default(),
        }
    }

    /// Park a departure at each gate; taken or unknown gates are skipped.
    pub fn spawn_outbound(&mut self, gates: &[String]) -> usize {
        let mut spawned = 0;
        for gate in gates {
            match self.fleet.spawn_outbound(gate, &mut self.factory, &mut self.tower) {
                Ok(Some(id)) => {
                    debug!("Departure {} parked at {}", id, gate);
                    self.summary.spawned += 1;
                    spawned += 1;
                }
                Ok(None) => warn!("No departure spawned at {}", gate),
                Err(e) => warn!("Gate {} rejected: {}", gate, e),
            }
        }
        spawned
    }

    /// One frame: operator answers, fleet logic, then physics.
    pub fn step(&mut self) -> anyhow::Result<TickReport> {
        for (id, event) in self.tower.decide(self.fleet.clock()) {
            if !self.fleet.post(id, event) {
                debug!("Answer for {} dropped, aircraft is gone", id);
            }
        }

        let report = self
            .fleet
            .tick(self.dt, &mut self.radio, &mut self.tower, &mut self.factory)
            .context("Fleet tick failed")?;
        self.factory.advance(self.dt);

        if let Some(spoken) = &report.spoken {
            self.radio.record(spoken, self.fleet.clock());
        }
        self.summary.absorb(&report);
        Ok(report)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            sim_secs: self.fleet.clock(),
            active: self.fleet.len(),
            ..self.summary.clone()
        }
    }
}

/// Run until `duration_secs` of simulated time have passed.
pub async fn run(sim: &mut Simulation, options: &RunOptions) -> anyhow::Result<RunSummary> {
    let frames = (options.duration_secs / options.dt).round() as u64;
    info!(
        "Running {} frames of {:.2}s{}",
        frames,
        options.dt,
        if options.realtime { " in real time" } else { "" }
    );

    let mut ticker = time::interval(Duration::from_secs_f64(options.dt));
    for _ in 0..frames {
        if options.realtime {
            ticker.tick().await;
        } else {
            tokio::task::yield_now().await;
        }
        sim.step()?;
    }

    let summary = sim.summary();
    info!(
        "Finished after {:.1}s: {} spawned, {} retired, {} transmissions",
        summary.sim_secs, summary.spawned, summary.retired, summary.transmissions
    );
    Ok(summary)
}
