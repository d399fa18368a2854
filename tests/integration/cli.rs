#[path = "common/mod.rs"]
mod common;

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use common::{wait_for_path_removed, wait_for_pid};
use predicates::str::contains;
use serde_json::Value;
use tempfile::tempdir;

#[test]
fn status_without_pid_file_reports_not_running() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("dctl")
        .args(["status", "--pid-file"])
        .arg(temp.path().join("absent.pid"))
        .assert()
        .success()
        .stdout(contains("not running"));
}

#[test]
fn stop_without_pid_file_is_not_an_error() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("dctl")
        .args(["stop", "--pid-file"])
        .arg(temp.path().join("absent.pid"))
        .assert()
        .success()
        .stdout(contains("not running"));
}

#[test]
fn malformed_pid_file_fails_status() {
    let temp = tempdir().unwrap();
    let pid_file = temp.path().join("bad.pid");
    fs::write(&pid_file, "abc\n").unwrap();

    cargo_bin_cmd!("dctl")
        .args(["status", "--pid-file"])
        .arg(&pid_file)
        .assert()
        .failure()
        .stderr(contains("Malformed"));
}

#[test]
fn missing_pid_file_option_is_rejected() {
    cargo_bin_cmd!("dctl")
        .args(["status"])
        .assert()
        .failure()
        .stderr(contains("MissingPidFile"));
}

#[test]
fn status_json_tracks_running_daemon() {
    let temp = tempdir().unwrap();
    let pid_file = temp.path().join("json.pid");

    cargo_bin_cmd!("dctl")
        .args(["start", "--pid-file"])
        .arg(&pid_file)
        .args(["--", "sleep", "30"])
        .assert()
        .success();
    let pid = wait_for_pid(&pid_file);

    let output = cargo_bin_cmd!("dctl")
        .args(["status", "--json", "--pid-file"])
        .arg(&pid_file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["state"], "running");
    assert_eq!(report["running"], true);
    assert_eq!(report["pid"], pid);

    cargo_bin_cmd!("dctl")
        .args(["stop", "--pid-file"])
        .arg(&pid_file)
        .assert()
        .success();
    wait_for_path_removed(&pid_file);

    let output = cargo_bin_cmd!("dctl")
        .args(["status", "--json", "--pid-file"])
        .arg(&pid_file)
        .output()
        .unwrap();
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["state"], "absent");
    assert_eq!(report["running"], false);
    assert!(report["pid"].is_null());
}

#[test]
fn config_file_supplies_daemon_options() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    fs::write(
        dir.join("daemon.yaml"),
        r#"
pid_file: "worker.pid"
log_file: "worker.log"
working_directory: "."
umask: "077"
child_wait_timeout: "1s"
"#,
    )
    .unwrap();

    cargo_bin_cmd!("dctl")
        .args(["start", "-c"])
        .arg(dir.join("daemon.yaml"))
        .args(["--", "sh", "-c", "umask; touch created"])
        .assert()
        .success();

    wait_for_path_removed(&dir.join("worker.pid"));
    let log = common::wait_for_file_contains(&dir.join("worker.log"), "077");
    assert!(log.lines().any(|line| line.trim() == "0077" || line.trim() == "077"));
    assert!(dir.join("created").exists());

    cargo_bin_cmd!("dctl")
        .args(["status", "-c"])
        .arg(dir.join("daemon.yaml"))
        .assert()
        .success()
        .stdout(contains("not running"));
}

#[test]
fn pid_file_flag_overrides_config() {
    let temp = tempdir().unwrap();
    let dir = temp.path();
    fs::write(dir.join("daemon.yaml"), "pid_file: \"from-config.pid\"\n").unwrap();
    fs::write(dir.join("from-flag.pid"), "not-a-number\n").unwrap();

    cargo_bin_cmd!("dctl")
        .args(["status", "-c"])
        .arg(dir.join("daemon.yaml"))
        .arg("--pid-file")
        .arg(dir.join("from-flag.pid"))
        .assert()
        .failure()
        .stderr(contains("Malformed"));
}
