//! Standard stream redirection for detached processes.
use std::{
    fs::{File, OpenOptions},
    io,
    os::fd::{AsRawFd, RawFd},
    path::Path,
};

use crate::constants::DEV_NULL;

/// Rewires stdin to the null device and stdout/stderr to `log_file`.
///
/// When no log file is given, stdout and stderr go to the null device as well.
/// The log file is opened for append and created if missing. Must run in the
/// final daemon process, before anything writes to the standard streams.
pub fn redirect_standard_streams(log_file: Option<&Path>) -> io::Result<()> {
    let devnull = OpenOptions::new().read(true).write(true).open(DEV_NULL)?;
    let log = match log_file {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };
    let sink: &File = log.as_ref().unwrap_or(&devnull);

    dup_onto(devnull.as_raw_fd(), libc::STDIN_FILENO)?;
    dup_onto(sink.as_raw_fd(), libc::STDOUT_FILENO)?;
    dup_onto(sink.as_raw_fd(), libc::STDERR_FILENO)?;

    // The duplicated descriptors stay open; the originals close on drop.
    Ok(())
}

fn dup_onto(source: RawFd, target: RawFd) -> io::Result<()> {
    if unsafe { libc::dup2(source, target) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
