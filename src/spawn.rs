//! External commands as daemon bodies.
use std::{
    io,
    process::{Command, ExitStatus},
};

use tracing::{info, warn};

/// Runs `argv` as a child process and waits for it to finish.
///
/// The child inherits the caller's (already redirected) standard streams and
/// stays a direct child, so daemon cleanup reaps it on termination.
pub fn run_command(argv: &[String]) -> io::Result<ExitStatus> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no command given")
    })?;

    let mut child = Command::new(program).args(args).spawn()?;
    info!("Spawned '{}' with PID {}", argv.join(" "), child.id());

    let status = child.wait()?;
    if status.success() {
        info!("Command '{program}' exited successfully");
    } else {
        warn!("Command '{program}' exited with {status}");
    }
    Ok(status)
}
