//! apron-sim: run the apron traffic simulator without a display.
//!
//! Usage:
//!   cargo run -p apron-sim -- --duration 900 --outbound P1,Q1 --transcript radio.json

use anyhow::{Context, Result};
use apron_core::{Airport, SimConfig};
use apron_sim::{run, RunOptions, Simulation};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless apron traffic simulation")]
struct Args {
    /// Simulated seconds to run
    #[arg(long, default_value_t = 600.0)]
    duration: f64,

    /// Frame length in seconds
    #[arg(long, default_value_t = 0.1)]
    dt: f64,

    /// Pace frames against the wall clock
    #[arg(long)]
    realtime: bool,

    /// Seed for tail numbers and voices
    #[arg(long)]
    seed: Option<u64>,

    /// Airport JSON document; the built-in field when absent
    #[arg(long)]
    airport: Option<PathBuf>,

    /// Write the radio transcript here as JSON
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Gates to park departures at before the first frame
    #[arg(long, value_delimiter = ',', default_value = "P1")]
    outbound: Vec<String>,

    #[arg(long)]
    max_inbound: Option<usize>,

    /// Seconds between inbound spawns, 0 disables arrivals
    #[arg(long)]
    inbound_interval: Option<f64>,

    /// Approach the tower assigns when the runway offers it
    #[arg(long)]
    approach: Option<String>,

    /// Operator reaction time in seconds
    #[arg(long, default_value_t = 2.0)]
    reaction: f64,
}

fn load_airport(path: Option<&PathBuf>) -> Result<Airport> {
    let Some(path) = path else {
        return Ok(Airport::palo_alto());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read airport file {}", path.display()))?;
    Airport::from_json(&json).with_context(|| format!("Invalid airport file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("apron_sim=info".parse()?)
                .add_directive("apron_core=info".parse()?)
                .add_directive("radio=info".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.dt <= 0.0 || args.duration <= 0.0 {
        anyhow::bail!("--dt and --duration must be positive");
    }

    let mut config = SimConfig::from_env();
    if let Some(max_inbound) = args.max_inbound {
        config.max_inbound = max_inbound;
    }
    if let Some(interval) = args.inbound_interval {
        config.inbound_interval_secs = interval;
    }
    // Always run seeded so a run can be repeated from its log
    let seed = args.seed.or(config.seed).unwrap_or_else(rand::random);
    config.seed = Some(seed);

    let airport = load_airport(args.airport.as_ref())?;
    tracing::info!(
        "Starting apron-sim at {} (seed {}, {} gates)",
        airport.info.name,
        seed,
        airport.gates.len()
    );

    let options = RunOptions {
        duration_secs: args.duration,
        dt: args.dt,
        realtime: args.realtime,
        outbound_gates: args.outbound,
        reaction_secs: args.reaction,
        preferred_approach: args.approach,
    };
    let mut sim = Simulation::new(airport, config, &options);
    sim.spawn_outbound(&options.outbound_gates);

    let outcome = tokio::select! {
        result = run(&mut sim, &options) => result.map(Some),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping early");
            Ok(None)
        }
    };
    if let Err(e) = &outcome {
        tracing::error!("Simulation stopped: {:#}", e);
    }

    if let Some(path) = &args.transcript {
        sim.radio.write_json(path)?;
    }
    let summary = sim.summary();
    tracing::info!("Summary: {}", serde_json::to_string(&summary)?);

    outcome.map(|_| ())
}
