//! Daemon identity held for the lifetime of the daemon process.
use std::sync::Once;

use tracing::{debug, info, warn};

use crate::{error::PidFileError, pidfile::PidFile, reaper::ChildReaper};

/// Records the daemon's PID on acquisition and undoes it exactly once on release.
///
/// Release reaps the daemon's direct children (when a reaper is attached) and then
/// removes the PID file. It runs from whichever exit path fires first: normal
/// return, a panicking target, or a termination signal. Later calls are no-ops.
#[derive(Debug)]
pub struct DaemonGuard {
    pid_file: PidFile,
    reaper: Option<ChildReaper>,
    pid: u32,
    released: Once,
}

impl DaemonGuard {
    /// Writes the current process's PID to `pid_file`.
    pub fn acquire(pid_file: PidFile) -> Result<Self, PidFileError> {
        let pid = std::process::id();
        pid_file.write(pid)?;
        info!("Daemon running with PID {pid} ({:?})", pid_file.path());

        Ok(Self {
            pid_file,
            reaper: None,
            pid,
            released: Once::new(),
        })
    }

    /// Reaps the current process's direct children with `reaper` on release.
    pub fn with_reaper(mut self, reaper: ChildReaper) -> Self {
        self.reaper = Some(reaper);
        self
    }

    /// PID recorded by this guard.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns whether cleanup already ran.
    pub fn is_released(&self) -> bool {
        self.released.is_completed()
    }

    /// Reaps children and removes the PID file.
    ///
    /// Only the first call does any work; concurrent callers block until it finishes.
    pub fn release(&self) {
        self.released.call_once(|| self.cleanup());
    }

    fn cleanup(&self) {
        if let Some(reaper) = &self.reaper {
            let report = reaper.terminate_children();
            if report.total() > 0 {
                debug!(
                    "Reaped children: {} terminated, {} killed, {} survived",
                    report.terminated.len(),
                    report.killed.len(),
                    report.survivors.len()
                );
            }
        }

        if let Err(err) = self.pid_file.remove() {
            warn!("Failed to remove PID file {:?}: {err}", self.pid_file.path());
        } else {
            info!("Daemon {} cleaned up", self.pid);
        }
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        self.release();
    }
}
