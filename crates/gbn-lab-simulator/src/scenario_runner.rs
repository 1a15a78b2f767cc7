use anyhow::{Context, anyhow};
use gbn_lab_abstract::{SimConfig, TestAction, TestAssertion, TestScenario};
use gbn_lab_protocol::{gbn_receiver, gbn_sender};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::{DEFAULT_MAX_DURATION_MS, Simulator};
use crate::trace::SimulationReport;

pub fn load_scenario(path: impl AsRef<Path>) -> anyhow::Result<TestScenario> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse scenario")
}

pub fn run_scenario(scenario_path: impl AsRef<Path>) -> anyhow::Result<SimulationReport> {
    let scenario = load_scenario(scenario_path)?;
    run_loaded(&scenario)
}

/// Build a simulator with GBN endpoints and every scenario action scheduled.
pub fn build_simulator(scenario: &TestScenario) -> anyhow::Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    config
        .validate()
        .with_context(|| format!("Invalid configuration in scenario '{}'", scenario.name))?;

    let sender = gbn_sender(&config.arq);
    let receiver = gbn_receiver(&config.arq);
    let mut sim = Simulator::new(config, sender, receiver);

    for action in &scenario.actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            TestAction::AppClose { time } => {
                sim.schedule_app_close(*time);
            }
            TestAction::DropNextDataSeq { seq } => {
                sim.add_drop_data_seq_once(*seq);
            }
            TestAction::DropNextAck { ack } => {
                sim.add_drop_ack_once(*ack);
            }
            TestAction::CorruptNextDataSeq { seq } => {
                sim.add_corrupt_data_seq_once(*seq);
            }
        }
    }
    Ok(sim)
}

pub fn run_loaded(scenario: &TestScenario) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut sim = build_simulator(scenario)?;

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { ms } = a {
                Some(*ms)
            } else {
                None
            }
        })
        .unwrap_or(DEFAULT_MAX_DURATION_MS);

    sim.set_max_duration(max_duration);
    sim.run_until_complete()
        .with_context(|| format!("Scenario '{}' did not complete", scenario.name))?;

    let report = sim.export_report();
    check_assertions(&report, &scenario.assertions)?;
    info!("Test Scenario Passed!");
    Ok(report)
}

pub fn check_assertions(
    report: &SimulationReport,
    assertions: &[TestAssertion],
) -> anyhow::Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let delivered = report.delivered_bytes();
                if delivered != data.as_bytes() {
                    return Err(anyhow!(
                        "Assertion Failed: delivered {:?}, expected {:?}",
                        String::from_utf8_lossy(&delivered),
                        data
                    ));
                }
            }
            TestAssertion::SenderFrameCount { min, max } => {
                check_range("Sender frame count", report.sender_frame_count, *min, *max)?;
            }
            TestAssertion::Retransmissions { min, max } => {
                check_range(
                    "Retransmissions",
                    report.sender_stats.retransmissions,
                    *min,
                    *max,
                )?;
            }
            TestAssertion::SenderDone => {
                if !report.sender_done {
                    return Err(anyhow!("Assertion Failed: sender did not finish"));
                }
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}

fn check_range(what: &str, value: u32, min: u32, max: Option<u32>) -> anyhow::Result<()> {
    if value < min {
        return Err(anyhow!(
            "Assertion Failed: {} is {}, expected min {}",
            what,
            value,
            min
        ));
    }
    if let Some(max) = max {
        if value > max {
            return Err(anyhow!(
                "Assertion Failed: {} is {}, expected max {}",
                what,
                value,
                max
            ));
        }
    }
    Ok(())
}
