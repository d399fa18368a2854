//! Single-process PID file tracking.
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::error::PidFileError;

/// A PID file holding exactly one process identifier followed by a newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Creates a handle for the PID file at `path`. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the PID file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether a file currently exists at the path.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes `pid` to the file, failing if the file already exists.
    ///
    /// The file is created exclusively so that two daemons racing for the same
    /// path cannot both record themselves.
    pub fn write(&self, pid: u32) -> Result<(), PidFileError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|source| {
                if source.kind() == ErrorKind::AlreadyExists {
                    PidFileError::AlreadyExists {
                        path: self.path.clone(),
                    }
                } else {
                    self.io_error(source)
                }
            })?;

        writeln!(file, "{pid}").map_err(|source| self.io_error(source))?;
        file.sync_all().map_err(|source| self.io_error(source))?;
        Ok(())
    }

    /// Reads the recorded PID.
    ///
    /// A missing or unreadable file yields `Ok(None)`; contents that are not an
    /// integer yield [`PidFileError::Malformed`].
    pub fn read(&self) -> Result<Option<u32>, PidFileError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    debug!("Treating unreadable PID file {:?} as absent: {err}", self.path);
                }
                return Ok(None);
            }
        };

        let trimmed = contents.trim();
        trimmed
            .parse::<u32>()
            .map(Some)
            .map_err(|source| PidFileError::Malformed {
                path: self.path.clone(),
                contents: trimmed.to_string(),
                source,
            })
    }

    /// Returns `true` only if the file exists, parses, and names a live process.
    pub fn exists_and_alive(&self) -> bool {
        matches!(self.read(), Ok(Some(pid)) if process_alive(pid))
    }

    /// Deletes the file. Missing files are not an error.
    pub fn remove(&self) -> Result<(), PidFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> PidFileError {
        PidFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Returns whether `pid` refers to an existing process.
///
/// PID 0 addresses the caller's process group and is never considered a daemon.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::{errno::Errno, sys::signal, unistd::Pid};

    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Always `false`: processes cannot be probed without unix signals.
#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    false
}
