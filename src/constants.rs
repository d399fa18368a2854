//! Constants and default values for the daemon lifecycle.
//!
//! This module centralizes the timeouts, paths and masks used while detaching,
//! redirecting and cleaning up a daemon process.

use std::time::Duration;

// ============================================================================
// Detachment Defaults
// ============================================================================

/// Working directory the daemon switches to unless told otherwise.
/// Staying in `/` avoids pinning a mounted filesystem.
pub const DEFAULT_WORKING_DIRECTORY: &str = "/";

/// File creation mask applied after the first fork.
pub const DEFAULT_UMASK: u32 = 0o022;

/// Null device used as stdin, and as stdout/stderr when no log file is given.
pub const DEV_NULL: &str = "/dev/null";

// ============================================================================
// Child Reaping Timing
// ============================================================================

/// How long to wait for children after each signal round (SIGTERM, then SIGKILL).
pub const CHILD_PROCESS_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between liveness checks while waiting on children.
pub const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Exit Statuses
// ============================================================================

/// Exit status of the daemon after the target returns or a termination signal is handled.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit status for fatal setup failures and panicking targets.
pub const EXIT_FAILURE: i32 = 1;
