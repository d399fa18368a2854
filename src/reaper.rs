//! Best-effort termination of a process's direct children.
use std::{
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::{
        signal::{self, Signal},
        wait::{WaitPidFlag, WaitStatus, waitpid},
    },
    unistd::Pid,
};
use sysinfo::{Pid as SysPid, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::constants::{CHILD_POLL_INTERVAL, CHILD_PROCESS_WAIT_TIMEOUT};

/// Outcome of a reaping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Children that exited after SIGTERM.
    pub terminated: Vec<u32>,
    /// Children that needed SIGKILL.
    pub killed: Vec<u32>,
    /// Children still present after the final wait.
    pub survivors: Vec<u32>,
}

impl ReapReport {
    /// Total number of children found when the pass started.
    pub fn total(&self) -> usize {
        self.terminated.len() + self.killed.len() + self.survivors.len()
    }
}

/// Terminates direct children with SIGTERM, then SIGKILL, waiting a bounded time after each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildReaper {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for ChildReaper {
    fn default() -> Self {
        Self::new(CHILD_PROCESS_WAIT_TIMEOUT)
    }
}

impl ChildReaper {
    /// Creates a reaper that waits up to `timeout` after each signal round.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: CHILD_POLL_INTERVAL,
        }
    }

    /// Overrides the interval between liveness checks.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Per-round wait timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Terminates every direct child of the current process.
    pub fn terminate_children(&self) -> ReapReport {
        self.terminate_children_of(std::process::id())
    }

    /// Terminates every direct child of `parent`.
    ///
    /// Never fails: an unknown parent means there is nothing to reap, and signal
    /// errors for one child do not stop the others from being handled.
    pub fn terminate_children_of(&self, parent: u32) -> ReapReport {
        let Some(children) = direct_children(parent) else {
            debug!("Process {parent} not found; no children to reap");
            return ReapReport::default();
        };

        if children.is_empty() {
            return ReapReport::default();
        }

        debug!("Terminating children of {parent}: {children:?}");
        for &pid in &children {
            send_signal(pid, Signal::SIGTERM);
        }
        let alive = self.wait_for_exit(&children);
        let terminated = children
            .iter()
            .copied()
            .filter(|pid| !alive.contains(pid))
            .collect();

        for &pid in &alive {
            warn!("Child {pid} did not exit after SIGTERM; sending SIGKILL");
            send_signal(pid, Signal::SIGKILL);
        }
        let survivors = self.wait_for_exit(&alive);
        let killed = alive
            .iter()
            .copied()
            .filter(|pid| !survivors.contains(pid))
            .collect();

        if !survivors.is_empty() {
            warn!("Children of {parent} still present after SIGKILL: {survivors:?}");
        }

        ReapReport {
            terminated,
            killed,
            survivors,
        }
    }

    /// Polls until every pid has exited or the timeout elapses; returns the ones left.
    fn wait_for_exit(&self, pids: &[u32]) -> Vec<u32> {
        let deadline = Instant::now() + self.timeout;
        let mut alive = pids.to_vec();

        loop {
            alive.retain(|&pid| still_running(pid));
            if alive.is_empty() || Instant::now() >= deadline {
                return alive;
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// Lists the direct children of `parent`, or `None` if `parent` cannot be found.
fn direct_children(parent: u32) -> Option<Vec<u32>> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let parent_pid = SysPid::from_u32(parent);
    system.process(parent_pid)?;

    let mut children: Vec<u32> = system
        .processes()
        .iter()
        .filter(|(_, process)| {
            process.thread_kind().is_none() && process.parent() == Some(parent_pid)
        })
        .map(|(pid, _)| pid.as_u32())
        .collect();
    children.sort_unstable();
    Some(children)
}

fn send_signal(pid: u32, sig: Signal) {
    if let Err(err) = signal::kill(Pid::from_raw(pid as i32), sig) {
        debug!("Failed to send {sig} to {pid}: {err}");
    }
}

/// Returns whether `pid` is still running, reaping it if it is our own exited child.
fn still_running(pid: u32) -> bool {
    let target = Pid::from_raw(pid as i32);
    match waitpid(target, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => true,
        Ok(_) => false,
        // Not our child: someone else is responsible for reaping it.
        Err(_) => foreign_process_running(pid),
    }
}

fn foreign_process_running(pid: u32) -> bool {
    if matches!(
        signal::kill(Pid::from_raw(pid as i32), None),
        Err(Errno::ESRCH)
    ) {
        return false;
    }

    let sys_pid = SysPid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
    match system.process(sys_pid) {
        Some(process) => !matches!(
            process.status(),
            ProcessStatus::Zombie | ProcessStatus::Dead
        ),
        None => false,
    }
}
