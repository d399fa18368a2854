//! Daemonctl turns a closure or an external command into a detached UNIX daemon.
//! The daemon is tracked by a PID file, its standard streams go to a log file or
//! the null device, and its child processes are terminated when it exits.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Constants and defaults.
pub mod constants;

/// Double-fork detachment.
#[cfg(unix)]
pub mod detach;

/// Error handling.
pub mod error;

/// Scoped daemon identity.
#[cfg(unix)]
pub mod guard;

/// Start, stop and status entry points.
pub mod lifecycle;

/// PID file management.
pub mod pidfile;

/// Child process reaping.
#[cfg(unix)]
pub mod reaper;

/// Standard stream redirection.
#[cfg(unix)]
pub mod redirect;

/// External commands as daemon bodies.
pub mod spawn;

#[cfg(test)]
pub(crate) mod test_utils;

pub use lifecycle::{
    DaemonState, Daemonizer, StopOutcome, check_if_daemon_is_running, daemonization_supported,
    get_daemon_pid_if_running, run_as_daemon, stop_daemon,
};
