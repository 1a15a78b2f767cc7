use std::path::PathBuf;

use gbn_lab_simulator::scenario_runner::run_scenario;

fn scenario(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .join(name)
}

#[test]
fn lossless() {
    let report = run_scenario(scenario("a_lossless.toml")).expect("scenario passes");
    assert_eq!(report.receiver_stats.frames_sent, 4);
}

#[test]
fn drop_frame() {
    let report = run_scenario(scenario("b_drop_frame.toml")).expect("scenario passes");
    assert_eq!(report.sender_stats.timeouts, 1);
}

#[test]
fn corrupt_frame() {
    run_scenario(scenario("c_corrupt_frame.toml")).expect("scenario passes");
}

#[test]
fn drop_ack() {
    let report = run_scenario(scenario("d_drop_ack.toml")).expect("scenario passes");
    assert_eq!(report.receiver_stats.frames_delivered, 1);
}

#[test]
fn lossy_defaults() {
    run_scenario(scenario("e_lossy_defaults.toml")).expect("scenario passes");
}

#[test]
fn every_bundled_scenario_parses() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
    let mut count = 0;
    for entry in std::fs::read_dir(dir).expect("scenarios directory") {
        let path = entry.expect("dir entry").path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            gbn_lab_simulator::scenario_runner::load_scenario(&path).expect("valid scenario");
            count += 1;
        }
    }
    assert!(count >= 5);
}
