//! CLI Entry Point for rust-motion-test
//!
//! Runs a test campaign against the simulated motion controller, or prints
//! the effective configuration.
//!
//! # Usage
//!
//! Run a campaign:
//! ```bash
//! rust-motion-test run --campaign bidirectional --cycles 5 --title "Soak"
//! ```
//!
//! Show configuration:
//! ```bash
//! rust-motion-test config --config config/default.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_motion_test::axis::Axis;
use rust_motion_test::bus::SimulatedController;
use rust_motion_test::campaign::{CampaignControl, CampaignKind};
use rust_motion_test::config::{RigConfig, DEFAULT_CONFIG_PATH};
use rust_motion_test::instrument::{MeasurementDevices, SimulatedGauge};
use rust_motion_test::logging;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rust-motion-test")]
#[command(about = "Endurance and accuracy testing of a motorized axis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test campaign on the simulated controller
    Run {
        /// limit-cycle, unidirectional or bidirectional
        #[arg(long)]
        campaign: CampaignKind,

        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Output directory, overrides the configured one
        #[arg(long)]
        output: Option<PathBuf>,

        /// Cycle count, overrides the configured one
        #[arg(long)]
        cycles: Option<u32>,

        /// Test title, overrides the configured one
        #[arg(long)]
        title: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            campaign,
            config,
            output,
            cycles,
            title,
        } => {
            let mut rig = load_config(&config)?;
            if let Some(output) = output {
                rig.storage.output_dir = output;
            }
            if let Some(cycles) = cycles {
                rig.test.cycles = cycles;
            }
            if let Some(title) = title {
                rig.test.title = title;
            }
            logging::init_from_config(&rig).map_err(anyhow::Error::msg)?;
            run_campaign(campaign, rig).await
        }
        Commands::Config { config } => {
            let rig = load_config(&config)?;
            println!("{}", toml::to_string_pretty(&rig)?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<RigConfig> {
    let rig = RigConfig::load_from(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    rig.validate().map_err(anyhow::Error::msg)?;
    Ok(rig)
}

async fn run_campaign(kind: CampaignKind, rig: RigConfig) -> Result<()> {
    let axis_id = rig.axis.id;
    let controller = Arc::new(
        SimulatedController::new()
            .with_axis(axis_id, rig.simulator.axis)
            .with_latency(rig.simulator.latency),
    );
    let axis = Arc::new(Axis::bind(axis_id, controller.clone(), rig.axis.timing).await);

    let mut devices = MeasurementDevices::new();
    for def in rig.enabled_instruments() {
        let gauge = SimulatedGauge::new(def.name.clone(), controller.clone(), axis_id)
            .with_offset(def.offset)
            .with_noise(def.noise);
        devices.push(Arc::new(gauge));
    }

    let monitor = (!rig.axis.position_poll_interval.is_zero())
        .then(|| axis.spawn_position_monitor(rig.axis.position_poll_interval));

    let control = CampaignControl::new();
    tokio::spawn({
        let control = control.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling at next checkpoint");
                control.cancel();
            }
        }
    });

    #[cfg(feature = "storage_csv")]
    let mut sink = rust_motion_test::storage::CsvResultSink::create(
        &rig.storage.output_dir,
        axis_id,
        &rig.test.title,
        chrono::Local::now(),
    )?;
    #[cfg(not(feature = "storage_csv"))]
    let mut sink = rust_motion_test::storage::MemorySink::new();

    info!(campaign = %kind, axis = axis_id, "starting campaign");
    let result = kind
        .run(&axis, &rig.test, &devices, &mut sink, &control)
        .await;

    if let Some(monitor) = monitor {
        monitor.stop().await;
    }

    #[cfg(feature = "storage_csv")]
    println!("Results: {}", sink.results_path().display());

    match result {
        Ok(report) => {
            println!(
                "{} finished: {} cycles, {} records in {:.1}s",
                report.kind,
                report.cycles_completed,
                report.records_written,
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(err) if err.is_cancellation() => {
            println!("{kind} cancelled");
            Err(anyhow::anyhow!("{kind} cancelled before completion"))
        }
        Err(err) => Err(err.into()),
    }
}
