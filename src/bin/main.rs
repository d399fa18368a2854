use std::{error::Error, io::IsTerminal};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use daemonctl::{
    DaemonState, Daemonizer, StopOutcome,
    cli::{Cli, Commands, Target, parse_args},
    config::{DaemonConfig, UmaskSetting, load_config},
    spawn::run_command,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    match args.command {
        Commands::Start {
            target,
            log_file,
            working_directory,
            umask,
            command,
        } => {
            let mut config = resolve_config(&target)?;
            if log_file.is_some() {
                config.log_file = log_file;
            }
            if working_directory.is_some() {
                config.working_directory = working_directory;
            }
            if let Some(mask) = umask {
                config.umask = Some(UmaskSetting::Octal(mask));
            }

            let daemonizer = Daemonizer::from_config(&config)?;
            info!("Starting daemon for '{}'", command.join(" "));
            daemonizer.start(move || {
                if let Err(err) = run_command(&command) {
                    error!("Failed to run '{}': {err}", command.join(" "));
                }
            })?;
        }
        Commands::Stop { target } => {
            let daemonizer = Daemonizer::from_config(&resolve_config(&target)?)?;
            match daemonizer.stop()? {
                StopOutcome::NotRunning => println!("not running"),
                StopOutcome::Stale(pid) => println!("stale (pid {pid})"),
                StopOutcome::Signalled(pid) => println!("stopping (pid {pid})"),
            }
        }
        Commands::Status { target, json } => {
            let daemonizer = Daemonizer::from_config(&resolve_config(&target)?)?;
            let state = daemonizer.state()?;

            if json {
                let report = serde_json::json!({
                    "pid_file": daemonizer.pid_file().path(),
                    "state": state.as_str(),
                    "pid": state.pid(),
                    "running": matches!(state, DaemonState::Running(_)),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match state {
                    DaemonState::Absent => println!("not running"),
                    DaemonState::Stale(pid) => println!("stale (pid {pid})"),
                    DaemonState::Running(pid) => println!("running (pid {pid})"),
                }
            }
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(args.command.colour_output() && std::io::stdout().is_terminal())
        .try_init();
}

/// Loads the config file, if any, and applies the `--pid-file` override.
fn resolve_config(target: &Target) -> Result<DaemonConfig, Box<dyn Error>> {
    let mut config = match &target.config {
        Some(path) => load_config(path)?,
        None => DaemonConfig::default(),
    };

    if let Some(pid_file) = &target.pid_file {
        config.pid_file = Some(pid_file.clone());
    }

    Ok(config)
}
