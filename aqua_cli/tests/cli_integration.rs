use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Config for sim mode with a fast scan cadence
fn write_sim_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[device]
base_url = "http://simulated.invalid"

[scan]
retry_ms = 10
max_attempts = 20
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

/// `aqua --sim` with a config path that does not exist.
fn sim(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("aqua").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("--sim")
        .env_remove("RUST_LOG")
        .env("AQUA_SIM_PUSH_MS", "10");
    cmd
}

#[rstest]
#[case(&["tpa", "start"], 2, "TPA config incomplete")]
#[case(&["fert", "calibrate", "--channel", "9", "--ml", "4.5"], 2, "invalid channel")]
#[case(&["fert", "calibrate", "--channel", "1", "--ml", "0"], 3, "nothing was sent")]
#[case(&["fert", "schedule", "--channel", "1", "--doses", "1,2,3", "--hour", "9"], 3, "doses")]
#[case(&["tpa", "schedule", "--interval", "120", "--hour", "9"], 3, "interval")]
#[case(&["fert", "schedule", "--channel", "5", "--doses", "1,1,1,1,1,1,1", "--hour", "9"], 3, "reserved for prime")]
#[case(&["fert", "pump", "--channel", "0", "on"], 2, "invalid value")]
fn failing_commands_exit_with_their_class(
    #[case] args: &[&str],
    #[case] code: i32,
    #[case] needle: &str,
) {
    let dir = tempdir().unwrap();
    sim(&dir)
        .args(args)
        .assert()
        .code(code)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
#[case(&["fert", "calibrate", "--channel", "1", "--ml", "4.5"], "fert/calibrate: accepted")]
#[case(&["fert", "name", "--channel", "2", "--name", "Iron"], "fert/name: accepted")]
#[case(&["tpa", "pump", "drain", "on"], "accepted")]
#[case(&["maintenance"], "accepted")]
#[case(&["emergency-stop"], "accepted")]
fn accepted_commands_report_success(#[case] args: &[&str], #[case] needle: &str) {
    let dir = tempdir().unwrap();
    sim(&dir)
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains(needle));
}

#[test]
fn help_lists_usage() {
    Command::cargo_bin("aqua")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn status_against_simulator() {
    let dir = tempdir().unwrap();
    sim(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("dashboard"))
        .stdout(predicate::str::contains("Fert 1"));
}

#[test]
fn json_status_carries_health_and_metrics() {
    let dir = tempdir().unwrap();
    let out = sim(&dir).args(["--json", "status"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["health"], "healthy");
    assert_eq!(v["mode"], "dashboard");
    assert_eq!(v["status"]["tpaState"], "IDLE");
    assert!(v["metrics"]["fullness"]["percent"].is_u64());
}

#[test]
fn health_reports_connection_and_mode() {
    let dir = tempdir().unwrap();
    sim(&dir)
        .env("AQUA_SIM_WIFI", "0")
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("health healthy  mode network-setup"));
}

#[test]
fn controller_without_network_shows_setup_mode() {
    let dir = tempdir().unwrap();
    sim(&dir)
        .env("AQUA_SIM_WIFI", "0")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("network-setup"))
        .stdout(predicate::str::contains("aqua scan"));
}

#[test]
fn unreachable_controller_is_a_transport_error() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("aqua")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .args(["--base-url", "http://127.0.0.1:9", "status"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Could not reach the controller"));
}

#[test]
fn missing_config_without_url_fails() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("aqua")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("read config"));
}

#[test]
fn invalid_config_value_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        "[device]\nbase_url = \"http://aq.local\"\n[sync]\nqueue_depth = 0\n",
    )
    .unwrap();
    Command::cargo_bin("aqua")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sync.queue_depth"));
}

#[test]
fn scan_lists_strongest_network_first() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);
    let out = Command::cargo_bin("aqua")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["--sim", "scan"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let reef = stdout.find("Reef").unwrap();
    let kitchen = stdout.find("Kitchen").unwrap();
    let garage = stdout.find("Garage").unwrap();
    assert!(reef < kitchen && kitchen < garage);
}

#[test]
fn wifi_credentials_are_sent() {
    let dir = tempdir().unwrap();
    sim(&dir)
        .args(["wifi", "--ssid", "Home", "--pass", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Home"));
}

#[test]
fn wifi_without_ssid_is_rejected_locally() {
    let dir = tempdir().unwrap();
    sim(&dir)
        .args(["wifi", "--ssid", ""])
        .assert()
        .code(3);
}

#[test]
fn watch_stops_after_count() {
    let dir = tempdir().unwrap();
    let out = sim(&dir).args(["watch", "--count", "2"]).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let snapshots = stdout.lines().filter(|l| l.contains("level")).count();
    assert_eq!(snapshots, 2);
}

#[test]
fn agenda_with_no_doses() {
    let dir = tempdir().unwrap();
    sim(&dir)
        .args(["fert", "agenda"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no channel doses"));
}

#[test]
fn calibration_sheet_submits_every_row() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("cal.csv");
    fs::write(&csv, "target,measured_ml\n1,4.5\ndrain,120\n").unwrap();
    sim(&dir)
        .arg("calibrate-sheet")
        .arg("--file")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("channel 1: 0.00 -> 1.50"))
        .stdout(predicate::str::contains("drain pump: 0.00 -> 40.00"));
}

#[test]
fn calibration_sheet_with_wrong_headers() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("cal.csv");
    fs::write(&csv, "channel,ml\n1,4.5\n").unwrap();
    sim(&dir)
        .arg("calibrate-sheet")
        .arg("--file")
        .arg(&csv)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let out = sim(&dir).args(["--json", "tpa", "start"]).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
    let line = String::from_utf8(out.stderr).unwrap();
    let last = line.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "Rejected");
    assert_eq!(v["device_error"], "TPA config incomplete");
}
