#![allow(dead_code)]

use std::{
    fs,
    path::Path,
    thread,
    time::{Duration, Instant},
};

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}

pub fn wait_for_path_removed(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for {:?} to be removed", path);
}

/// Waits for the daemon to record its PID and returns it.
pub fn wait_for_pid(pid_file: &Path) -> u32 {
    read_pid_when_ready(pid_file, Duration::from_secs(5))
}

/// Waits for a file holding a PID (written by a shell) and parses it.
pub fn read_pid_when_ready(path: &Path, timeout: Duration) -> u32 {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(content) = fs::read_to_string(path)
            && content.ends_with('\n')
            && let Ok(pid) = content.trim().parse::<u32>()
        {
            return pid;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for a PID in {:?}", path);
        }

        thread::sleep(Duration::from_millis(50));
    }
}

pub fn wait_for_file_contains(path: &Path, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(content) = fs::read_to_string(path)
            && content.contains(needle)
        {
            return content;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for '{needle}' in {:?}", path);
        }

        thread::sleep(Duration::from_millis(50));
    }
}

/// Zombies count as exited: they are only waiting for their parent to reap them.
pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    let target = Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    system
        .process(target)
        .is_some_and(|process| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for PID {} to exit", pid);
}

/// Polls until `parent` has at least `expected` direct children and returns them.
pub fn wait_for_children(parent: u32, expected: usize) -> Vec<u32> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut children: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| {
                process.thread_kind().is_none()
                    && process.parent() == Some(Pid::from_u32(parent))
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();

        if children.len() >= expected {
            children.sort_unstable();
            return children;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for {expected} children of PID {parent}");
        }

        thread::sleep(Duration::from_millis(50));
    }
}
