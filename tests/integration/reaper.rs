//! Child reaping against real process trees.
//!
//! Each test roots its children under a throwaway `sh` so the reaper never
//! touches processes belonging to other tests in this binary.

#[path = "common/mod.rs"]
mod common;

use std::{
    process::{Child, Command},
    time::{Duration, Instant},
};

use common::{is_process_alive, wait_for_children, wait_for_path};
use daemonctl::reaper::ChildReaper;
use tempfile::tempdir;

fn spawn_shell(script: &str) -> Child {
    Command::new("sh").arg("-c").arg(script).spawn().unwrap()
}

#[test]
fn cooperative_children_exit_after_sigterm() {
    let mut parent = spawn_shell("sleep 30 & sleep 30 & wait");
    let children = wait_for_children(parent.id(), 2);

    let reaper = ChildReaper::new(Duration::from_secs(2));
    let started = Instant::now();
    let report = reaper.terminate_children_of(parent.id());

    assert_eq!(report.terminated, children);
    assert!(report.killed.is_empty());
    assert!(report.survivors.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
    for pid in children {
        assert!(!is_process_alive(pid), "child {pid} survived SIGTERM");
    }

    parent.wait().unwrap();
}

#[test]
fn children_ignoring_sigterm_are_killed() {
    let temp = tempdir().unwrap();
    let ready = temp.path().join("ready");
    let mut parent = spawn_shell(&format!(
        "(trap '' TERM; touch {}; exec sleep 30) & wait",
        ready.display()
    ));
    let children = wait_for_children(parent.id(), 1);
    wait_for_path(&ready);

    let timeout = Duration::from_secs(1);
    let started = Instant::now();
    let report = ChildReaper::new(timeout).terminate_children_of(parent.id());
    let elapsed = started.elapsed();

    assert!(report.terminated.is_empty());
    assert_eq!(report.killed, children);
    assert!(report.survivors.is_empty());
    assert!(elapsed >= timeout, "SIGKILL was sent before the grace period");
    assert!(
        elapsed < timeout * 2 + Duration::from_secs(1),
        "reaping took {elapsed:?}"
    );
    for pid in children {
        assert!(!is_process_alive(pid));
    }

    parent.wait().unwrap();
}

#[test]
fn mixed_children_are_escalated_individually() {
    let temp = tempdir().unwrap();
    let ready = temp.path().join("ready");
    let mut parent = spawn_shell(&format!(
        "sleep 30 & (trap '' TERM; touch {}; exec sleep 30) & wait",
        ready.display()
    ));
    let children = wait_for_children(parent.id(), 2);
    wait_for_path(&ready);

    let report = ChildReaper::new(Duration::from_millis(500))
        .with_poll_interval(Duration::from_millis(20))
        .terminate_children_of(parent.id());

    assert_eq!(report.total(), 2);
    assert_eq!(report.terminated.len(), 1);
    assert_eq!(report.killed.len(), 1);
    for pid in children {
        assert!(!is_process_alive(pid));
    }

    parent.wait().unwrap();
}

#[test]
fn grandchildren_are_left_alone() {
    let temp = tempdir().unwrap();
    let grandchild_pid = temp.path().join("grandchild.pid");
    let mut parent = spawn_shell(&format!(
        "sh -c 'sleep 30 & echo $! > {}; wait' & wait",
        grandchild_pid.display()
    ));
    let children = wait_for_children(parent.id(), 1);
    let grandchild = common::read_pid_when_ready(&grandchild_pid, Duration::from_secs(5));

    let report = ChildReaper::new(Duration::from_secs(2)).terminate_children_of(parent.id());

    assert_eq!(report.terminated, children);
    assert!(is_process_alive(grandchild), "reaping must not recurse");

    let _ = Command::new("kill").arg(grandchild.to_string()).status();
    parent.wait().unwrap();
}
