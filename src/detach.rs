//! Double-fork detachment of the current process.
use std::path::Path;

use nix::{
    errno::Errno,
    sys::{
        stat::{Mode, umask},
        wait::{WaitStatus, waitpid},
    },
    unistd::{ForkResult, Pid, chdir, fork, setsid},
};
use tracing::{debug, error};

use crate::{constants::EXIT_FAILURE, error::DaemonError};

/// Which side of the detachment the current process ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// The original caller. The daemon is running elsewhere.
    Caller,
    /// The fully detached grandchild, which must never return to the caller's code.
    Daemon,
}

/// Detaches execution into a new background process.
///
/// The caller forks once and returns [`Detached::Caller`] as soon as the
/// short-lived intermediate process has exited. Waiting for it leaves no zombie
/// behind and turns a failing `chdir` or `setsid` into [`DaemonError::DetachFailed`]
/// for the caller. The caller never waits for the daemon itself. The intermediate changes to
/// `working_directory`, becomes a session leader, applies `mask` and forks again;
/// the grandchild is re-parented to init, is not a session leader and can never
/// reacquire a controlling terminal. The grandchild returns [`Detached::Daemon`].
///
/// Fork failures are fatal: the failing process logs and exits with a non-zero status.
pub fn detach(working_directory: &Path, mask: u32) -> Result<Detached, DaemonError> {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!("Forked intermediate process {child}");
            return wait_for_intermediate(child).map(|_| Detached::Caller);
        }
        Ok(ForkResult::Child) => {}
        Err(err) => fatal(&format!("Unable to fork (error code: {})", err as i32)),
    }

    if let Err(err) = chdir(working_directory) {
        fatal(&format!(
            "Unable to change working directory to {working_directory:?}: {err}"
        ));
    }
    if let Err(err) = setsid() {
        fatal(&format!("Unable to start a new session: {err}"));
    }
    umask(Mode::from_bits_truncate(mask as libc::mode_t));

    match unsafe { fork() } {
        // The intermediate exits so the daemon is adopted by init.
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => Ok(Detached::Daemon),
        Err(err) => fatal(&format!("Unable to fork (error code: {})", err as i32)),
    }
}

/// Reaps the intermediate process and reports how it exited.
fn wait_for_intermediate(child: Pid) -> Result<(), DaemonError> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, 0)) => return Ok(()),
            Ok(WaitStatus::Exited(_, status)) => {
                return Err(DaemonError::DetachFailed { status });
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Err(DaemonError::DetachFailed {
                    status: 128 + signal as i32,
                });
            }
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            // SIGCHLD is ignored by the caller, so the kernel reaped it already.
            Err(Errno::ECHILD) => return Ok(()),
            Err(err) => return Err(DaemonError::Io(err.into())),
        }
    }
}

/// Logs `message` and terminates the current process.
pub(crate) fn fatal(message: &str) -> ! {
    error!("{message}");
    std::process::exit(EXIT_FAILURE)
}
