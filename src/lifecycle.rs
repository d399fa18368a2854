//! Starting, stopping and querying a daemon identified by its PID file.
//!
//! A daemon moves through `Absent -> Running -> Absent` as seen from outside.
//! The transition to `Running` becomes visible once the detached process has
//! written its PID file; the transition back happens when the daemon cleans up
//! after its target returns, panics, or a termination signal arrives. [`Daemonizer::stop`]
//! only requests that transition: poll [`Daemonizer::is_running`] to observe it.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use strum_macros::IntoStaticStr;
use tracing::{error, info, warn};

use crate::{
    config::DaemonConfig,
    constants::{CHILD_PROCESS_WAIT_TIMEOUT, DEFAULT_UMASK, DEFAULT_WORKING_DIRECTORY},
    error::{ConfigError, DaemonError, PidFileError},
    pidfile::{PidFile, process_alive},
};

/// Returns whether this platform can detach processes (fork + setsid).
pub const fn daemonization_supported() -> bool {
    cfg!(unix)
}

/// What a stop request found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No PID file exists.
    NotRunning,
    /// The PID file names a process that no longer exists.
    Stale(u32),
    /// SIGTERM was delivered to the daemon.
    Signalled(u32),
}

/// Externally observable state of a daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DaemonState {
    /// No PID file.
    Absent,
    /// A PID file left behind by a daemon that did not clean up.
    Stale(u32),
    /// The PID file names a live process.
    Running(u32),
}

impl DaemonState {
    /// Short name: `absent`, `stale` or `running`.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// PID recorded in the PID file, if any.
    pub fn pid(&self) -> Option<u32> {
        match self {
            Self::Absent => None,
            Self::Stale(pid) | Self::Running(pid) => Some(*pid),
        }
    }
}

/// Runs a closure as a detached daemon tracked by a PID file.
///
/// ```no_run
/// use std::{thread, time::Duration};
/// use daemonctl::lifecycle::Daemonizer;
///
/// let daemonizer = Daemonizer::new("/tmp/sleeper.pid").log_file("/tmp/sleeper.log");
/// daemonizer
///     .start_with(
///         |period: u64| {
///             println!("I'm a daemon! Sleeping for {period} seconds.");
///             thread::sleep(Duration::from_secs(period));
///         },
///         30,
///     )
///     .expect("daemon failed to start");
/// println!("I'm the daemon's parent.");
/// ```
#[derive(Debug, Clone)]
pub struct Daemonizer {
    pid_file: PidFile,
    log_file: Option<PathBuf>,
    working_directory: PathBuf,
    umask: u32,
    child_wait_timeout: Duration,
}

impl Daemonizer {
    /// Creates a daemonizer recording its PID at `pid_file`, silenced, running in `/`.
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: PidFile::new(pid_file),
            log_file: None,
            working_directory: PathBuf::from(DEFAULT_WORKING_DIRECTORY),
            umask: DEFAULT_UMASK,
            child_wait_timeout: CHILD_PROCESS_WAIT_TIMEOUT,
        }
    }

    /// Builds a daemonizer from loaded options. `pid_file` must be set.
    pub fn from_config(config: &DaemonConfig) -> Result<Self, ConfigError> {
        let pid_file = config.pid_file.clone().ok_or(ConfigError::MissingPidFile)?;
        let mut daemonizer = Self::new(pid_file)
            .working_directory(config.working_directory())
            .umask(config.umask()?)
            .child_wait_timeout(config.child_wait_timeout()?);
        daemonizer.log_file = config.log_file.clone();
        Ok(daemonizer)
    }

    /// Sends the daemon's stdout and stderr to `log_file` instead of discarding them.
    pub fn log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());
        self
    }

    /// Directory the daemon changes into.
    pub fn working_directory(mut self, working_directory: impl Into<PathBuf>) -> Self {
        self.working_directory = working_directory.into();
        self
    }

    /// File creation mask applied in the daemon.
    pub fn umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }

    /// How long cleanup waits after SIGTERM, and again after SIGKILL, for children to exit.
    pub fn child_wait_timeout(mut self, timeout: Duration) -> Self {
        self.child_wait_timeout = timeout;
        self
    }

    /// The PID file tracking this daemon.
    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Detaches and runs `target` as a daemon.
    ///
    /// Returns in the calling process as soon as the daemon has been forked off;
    /// it does not wait for the daemon to write its PID file or run `target`.
    /// The daemon process itself never returns from this call: it exits once
    /// `target` returns (status 0) or panics (status 1), or when it receives
    /// SIGTERM, SIGINT or SIGHUP, cleaning up first in every case.
    /// Calling [`std::process::exit`] inside `target` skips that cleanup and
    /// leaves a stale PID file behind; return from `target` instead.
    ///
    /// Fails with [`DaemonError::AlreadyRunning`] without forking if the PID file
    /// exists. On platforms without fork/setsid this logs an error and does nothing.
    pub fn start<F>(&self, target: F) -> Result<(), DaemonError>
    where
        F: FnOnce(),
    {
        if !daemonization_supported() {
            error!("Daemon functionality is currently not supported on this platform.");
            return Ok(());
        }

        #[cfg(unix)]
        {
            self.start_detached(target)
        }
        #[cfg(not(unix))]
        {
            drop(target);
            Ok(())
        }
    }

    /// Like [`Daemonizer::start`], passing `args` to `target`.
    pub fn start_with<A, F>(&self, target: F, args: A) -> Result<(), DaemonError>
    where
        F: FnOnce(A),
    {
        self.start(move || target(args))
    }

    #[cfg(unix)]
    fn start_detached<F>(&self, target: F) -> Result<(), DaemonError>
    where
        F: FnOnce(),
    {
        use crate::{
            detach::{Detached, detach},
            reaper::ChildReaper,
        };

        // Absolute paths, since the daemon changes its working directory.
        let pid_file = PidFile::new(std::path::absolute(self.pid_file.path())?);
        let log_file = self
            .log_file
            .as_deref()
            .map(std::path::absolute)
            .transpose()?;
        let working_directory = std::path::absolute(&self.working_directory)?;

        if pid_file.exists() {
            return Err(DaemonError::AlreadyRunning {
                path: pid_file.path().to_path_buf(),
            });
        }

        match detach(&working_directory, self.umask)? {
            Detached::Caller => {
                info!("Daemon detached; tracking PID file {:?}", pid_file.path());
                Ok(())
            }
            Detached::Daemon => daemon_main(
                pid_file,
                log_file.as_deref(),
                ChildReaper::new(self.child_wait_timeout),
                target,
            ),
        }
    }

    /// Asks the daemon to terminate. Does not wait and does not touch the PID file.
    pub fn stop(&self) -> Result<StopOutcome, DaemonError> {
        let path = self.pid_file.path();
        let Some(pid) = self.pid_file.read()? else {
            warn!("Daemon PID file {:?} does not exist.", path);
            return Ok(StopOutcome::NotRunning);
        };

        if !process_alive(pid) {
            warn!("PID {pid} from {:?} does not exist.", path);
            return Ok(StopOutcome::Stale(pid));
        }

        if !send_terminate(pid)? {
            warn!("PID {pid} from {:?} exited before it could be signalled.", path);
            return Ok(StopOutcome::Stale(pid));
        }

        info!("Sent SIGTERM to daemon {pid}");
        Ok(StopOutcome::Signalled(pid))
    }

    /// Reports whether the daemon is absent, stale or running.
    pub fn state(&self) -> Result<DaemonState, PidFileError> {
        Ok(match self.pid_file.read()? {
            None => DaemonState::Absent,
            Some(pid) if process_alive(pid) => DaemonState::Running(pid),
            Some(pid) => DaemonState::Stale(pid),
        })
    }

    /// PID of the daemon if its PID file exists and the process is alive.
    pub fn running_pid(&self) -> Result<Option<u32>, PidFileError> {
        Ok(match self.state()? {
            DaemonState::Running(pid) => Some(pid),
            _ => None,
        })
    }

    /// Whether [`Daemonizer::running_pid`] finds a live daemon.
    pub fn is_running(&self) -> Result<bool, PidFileError> {
        Ok(self.running_pid()?.is_some())
    }
}

/// Body of the detached process: redirect, record identity, run, clean up, exit.
#[cfg(unix)]
fn daemon_main<F>(
    pid_file: PidFile,
    log_file: Option<&Path>,
    reaper: crate::reaper::ChildReaper,
    target: F,
) -> !
where
    F: FnOnce(),
{
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::Arc,
    };

    use crate::{
        constants::{EXIT_FAILURE, EXIT_SUCCESS},
        detach::fatal,
        guard::DaemonGuard,
        redirect::redirect_standard_streams,
    };

    if let Err(err) = redirect_standard_streams(log_file) {
        fatal(&format!("Unable to redirect standard streams: {err}"));
    }

    let guard = match DaemonGuard::acquire(pid_file) {
        Ok(guard) => Arc::new(guard.with_reaper(reaper)),
        Err(err) => fatal(&format!("Unable to record daemon PID: {err}")),
    };
    install_termination_handler(Arc::clone(&guard));

    let outcome = panic::catch_unwind(AssertUnwindSafe(target));
    guard.release();

    match outcome {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(_) => {
            error!("Daemon target panicked");
            std::process::exit(EXIT_FAILURE)
        }
    }
}

/// Runs cleanup and exits when SIGTERM, SIGINT or SIGHUP arrives.
#[cfg(unix)]
fn install_termination_handler(guard: std::sync::Arc<crate::guard::DaemonGuard>) {
    use nix::sys::signal::{SigHandler, Signal, signal};

    use crate::constants::EXIT_SUCCESS;

    let result = ctrlc::set_handler(move || {
        info!("Termination signal received; shutting down daemon");
        guard.release();
        std::process::exit(EXIT_SUCCESS);
    });

    if let Err(err) = result {
        // A handler inherited from the caller has no thread left to run it after
        // fork; restore default dispositions so stop requests still terminate us.
        warn!("Failed to install termination handler: {err}; cleanup will not run on signals");
        for sig in [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP] {
            if let Err(err) = unsafe { signal(sig, SigHandler::SigDfl) } {
                warn!("Failed to reset {sig} disposition: {err}");
            }
        }
    }
}

/// Sends SIGTERM; returns `false` if the process vanished first.
#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<bool, DaemonError> {
    use nix::{
        errno::Errno,
        sys::signal::{Signal, kill},
        unistd::Pid,
    };

    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(DaemonError::Signal { pid, source }),
    }
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) -> Result<bool, DaemonError> {
    error!("Cannot signal daemon {pid}: unsupported platform.");
    Ok(false)
}

/// Runs `target` as a daemon with the given PID file, log file and working directory.
pub fn run_as_daemon<F>(
    target: F,
    pid_file: impl Into<PathBuf>,
    log_file: Option<PathBuf>,
    working_directory: impl Into<PathBuf>,
) -> Result<(), DaemonError>
where
    F: FnOnce(),
{
    let mut daemonizer = Daemonizer::new(pid_file).working_directory(working_directory);
    daemonizer.log_file = log_file;
    daemonizer.start(target)
}

/// Sends SIGTERM to the daemon recorded in `pid_file`.
pub fn stop_daemon(pid_file: impl AsRef<Path>) -> Result<StopOutcome, DaemonError> {
    Daemonizer::new(pid_file.as_ref()).stop()
}

/// PID of the daemon recorded in `pid_file`, if it is running.
pub fn get_daemon_pid_if_running(pid_file: impl AsRef<Path>) -> Result<Option<u32>, PidFileError> {
    Daemonizer::new(pid_file.as_ref()).running_pid()
}

/// Whether the daemon recorded in `pid_file` is running.
pub fn check_if_daemon_is_running(pid_file: impl AsRef<Path>) -> Result<bool, PidFileError> {
    Daemonizer::new(pid_file.as_ref()).is_running()
}
