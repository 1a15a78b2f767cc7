use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use gbn_lab_abstract::{ArqEvent, LinkStats, SimConfig};
use gbn_lab_protocol::{gbn_receiver, gbn_sender};
use gbn_lab_simulator::{SimulationReport, Simulator, scenario_runner};

const DEMO_MESSAGE: &str = "This is a long demonstration message sent with Go-Back-N. \
It is cut into frames that travel one after another through a channel that \
loses some of them, flips bits in others and sometimes swallows the \
acknowledgments on the way back. Every lost or damaged frame sends the sender \
back to the oldest unacknowledged one, so whole windows are retransmitted in \
cascade. The CRC catches the damage, the cumulative ACKs keep the sender in \
step, and the receiver passes every byte up exactly once and in order. \
If you can read this sentence intact at the other end, the link did its job.";

#[derive(Parser, Debug)]
#[command(author, version, about = "Go-Back-N ARQ simulator")]
struct Args {
    /// TOML file with link and fault settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a scenario file with scripted faults and assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Run sender and receiver as concurrent tasks in real time instead of
    /// on the virtual clock.
    #[arg(long, default_value_t = false)]
    live: bool,

    /// Override the fault injector seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Message to transfer (defaults to a built-in demo text).
    #[arg(long)]
    message: Option<String>,

    /// Write a JSON trace of the finished run.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("gbn-lab-sim-cli starting…");

    if let Some(path) = &args.scenario {
        if args.live {
            anyhow::bail!("--scenario and --live cannot be used together");
        }
        let report = scenario_runner::run_scenario(path)?;
        summarize(&report.sender_stats, report.sender_frame_count, &report.delivered_bytes());
        log_event_counts(report.trace.iter().map(|entry| &entry.event));
        if let Some(trace_path) = &args.trace_out {
            write_trace(trace_path, &report)?;
        }
        return Ok(());
    }

    let config = args.load_config()?;
    let message = args.message.as_deref().unwrap_or(DEMO_MESSAGE).as_bytes();

    if args.live {
        info!("Starting live link with {:?}", config);
        let report = gbn_lab_link::run_link(&config, message)
            .await
            .context("Live link failed")?;
        let delivered = report.delivered_bytes();
        summarize(&report.sender.stats, report.sender.stats.frames_sent, &delivered);
        check_delivery(message, &delivered);
        log_event_counts(
            report
                .sender
                .events
                .iter()
                .chain(&report.receiver.events)
                .map(|timed| &timed.event),
        );
        if let Some(trace_path) = &args.trace_out {
            write_trace(trace_path, &report)?;
        }
    } else {
        let report = run_default_sim(config, message)?;
        let delivered = report.delivered_bytes();
        summarize(&report.sender_stats, report.sender_frame_count, &delivered);
        check_delivery(message, &delivered);
        log_event_counts(report.trace.iter().map(|entry| &entry.event));
        if let Some(trace_path) = &args.trace_out {
            write_trace(trace_path, &report)?;
        }
    }

    Ok(())
}

impl Args {
    fn load_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.faults.seed = seed;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn run_default_sim(config: SimConfig, message: &[u8]) -> Result<SimulationReport> {
    let sender = gbn_sender(&config.arq);
    let receiver = gbn_receiver(&config.arq);
    let mut sim = Simulator::new(config, sender, receiver);
    sim.schedule_app_send(0, message.to_vec());
    sim.schedule_app_close(0);

    info!("Starting default headless simulation…");
    sim.run_until_complete()
        .context("Simulation did not complete")?;
    info!("Simulation complete.");
    Ok(sim.export_report())
}

fn summarize(stats: &LinkStats, frames_sent: u32, delivered: &[u8]) {
    info!(
        "Frames sent: {}, retransmissions: {}, timeouts: {}",
        frames_sent, stats.retransmissions, stats.timeouts
    );
    info!("Received message: {}", String::from_utf8_lossy(delivered));
}

fn log_event_counts<'a>(events: impl Iterator<Item = &'a ArqEvent>) {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in events {
        *counts.entry(event.name()).or_default() += 1;
    }
    for (name, count) in counts {
        info!("{:>28}: {}", name, count);
    }
}

fn check_delivery(expected: &[u8], delivered: &[u8]) {
    if expected == delivered {
        info!("Message delivered intact ({} bytes)", delivered.len());
    } else {
        warn!(
            "Delivered {} bytes, expected {} bytes",
            delivered.len(),
            expected.len()
        );
    }
}

fn write_trace<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
