//! RackOps - GPU data centre operational simulator
//!
//! Serves the operator API over HTTP, or runs a fixed number of ticks
//! headless and prints the final snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Serve the API with defaults (config from DC_SIM_CONFIG or ./dcsim.yaml)
//! cargo run --release
//!
//! # Headless batch: 240 ticks, snapshot to stdout, telemetry to a file
//! cargo run --release -- --ticks 240 --telemetry-out telemetry.jsonl
//! ```
//!
//! # Environment Variables
//!
//! - `DC_SIM_CONFIG`: Path to the YAML config file
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rackops::api::{create_app, ApiState};
use rackops::config::SimConfig;
use rackops::Simulator;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rackops")]
#[command(about = "GPU data centre operational simulator")]
#[command(version)]
struct CliArgs {
    /// Server bind address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// Path to YAML config (overrides DC_SIM_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed override
    #[arg(long)]
    seed: Option<u64>,

    /// Run this many ticks headless, print the final snapshot, and exit
    #[arg(long)]
    ticks: Option<u64>,

    /// Append every snapshot to this JSON-lines file
    #[arg(long)]
    telemetry_out: Option<PathBuf>,
}

fn load_config(args: &CliArgs) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimConfig::load(),
    };
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    Ok(config)
}

fn build_simulator(config: SimConfig, args: &CliArgs) -> Result<Simulator> {
    match &args.telemetry_out {
        Some(path) => Simulator::with_telemetry_sink(config, path)
            .with_context(|| format!("opening telemetry sink {}", path.display())),
        None => Ok(Simulator::new(config)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    config.validate().context("config validation")?;

    info!(
        racks = config.facility.num_racks,
        servers_per_rack = config.facility.servers_per_rack,
        gpus = config.facility.total_gpus(),
        seed = config.rng_seed,
        "Facility configured"
    );

    let mut simulator = build_simulator(config, &args)?;

    // Headless batch mode
    if let Some(ticks) = args.ticks {
        info!(ticks, "Running headless batch");
        let snapshot = simulator.tick_n(ticks);
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    // API server mode
    let state = ApiState::with_simulator(simulator);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("binding {}", args.addr))?;
    info!(addr = %args.addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to install Ctrl+C handler");
    }
}
