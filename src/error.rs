//! Error handling for daemonctl.
use std::{io, num::ParseIntError, path::PathBuf};

use thiserror::Error;

/// Defines all possible errors surfaced to callers of the daemon lifecycle.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A PID file already exists at the requested path.
    #[error(
        "The PID file '{}' already exists, either the daemon process is already running or something went wrong",
        path.display()
    )]
    AlreadyRunning {
        /// Path of the existing PID file.
        path: PathBuf,
    },

    /// Error for PID file.
    #[error("PID file error: {0}")]
    PidFile(#[from] PidFileError),

    /// The intermediate process exited before handing off to the daemon.
    #[error("Failed to detach daemon process (intermediate exit status {status})")]
    DetachFailed {
        /// Exit status reported by the intermediate process.
        status: i32,
    },

    /// Error delivering a signal to the daemon.
    #[cfg(unix)]
    #[error("Failed to signal PID {pid}: {source}")]
    Signal {
        /// Target process.
        pid: u32,
        /// The underlying errno.
        #[source]
        source: nix::errno::Errno,
    },

    /// Error loading daemon options.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Any other I/O failure in the caller's process.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error type for PID file operations.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// Error reading or writing a PID file.
    #[error("Failed to access PID file '{}': {source}", path.display())]
    Io {
        /// Path of the PID file.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The PID file exists but does not hold a process identifier.
    #[error("PID file '{}' is malformed (contents: {contents:?}): {source}", path.display())]
    Malformed {
        /// Path of the PID file.
        path: PathBuf,
        /// Raw (trimmed) file contents.
        contents: String,
        /// Parse failure.
        #[source]
        source: ParseIntError,
    },

    /// Another process created the PID file first.
    #[error("PID file '{}' was created by another process", path.display())]
    AlreadyExists {
        /// Path of the PID file.
        path: PathBuf,
    },
}

/// Error type for loading daemon options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading the configuration file.
    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A `${VAR}` reference names an unset variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A value could not be interpreted.
    #[error("Invalid value for '{field}': {value}")]
    InvalidValue {
        /// Offending key.
        field: &'static str,
        /// Offending raw value.
        value: String,
    },

    /// No PID file given on the command line or in the config file.
    #[error("No PID file configured; pass --pid-file or set `pid_file` in the config")]
    MissingPidFile,
}
