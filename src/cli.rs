//! Command-line interface for daemonctl.
use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" | "err" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "info" | "information" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => return Err(format!("invalid log level '{trimmed}'")),
        };

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for daemonctl.
#[derive(Parser)]
#[command(name = "dctl", version, author)]
#[command(about = "Run a command as a detached daemon tracked by a PID file", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options locating the daemon, shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct Target {
    /// YAML file with daemon options.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// PID file identifying the daemon (overrides the config file).
    #[arg(short, long)]
    pub pid_file: Option<PathBuf>,
}

/// Available commands for dctl.
#[derive(Subcommand)]
pub enum Commands {
    /// Detach and run a command as a daemon.
    Start {
        #[command(flatten)]
        target: Target,

        /// File receiving the daemon's stdout and stderr (discarded if omitted).
        #[arg(short, long)]
        log_file: Option<PathBuf>,

        /// Working directory of the daemon (defaults to `/`).
        #[arg(short = 'w', long = "workdir")]
        working_directory: Option<PathBuf>,

        /// File creation mask in octal (defaults to 022).
        #[arg(long)]
        umask: Option<String>,

        /// Command and arguments to run as the daemon body.
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Ask a running daemon to terminate.
    Stop {
        #[command(flatten)]
        target: Target,
    },

    /// Show whether the daemon is running.
    Status {
        #[command(flatten)]
        target: Target,

        /// Emit machine-readable JSON output.
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Whether log output may use ANSI colours.
    ///
    /// `start` keeps logging from the daemon after its streams point at the
    /// log file, so it always logs plain text.
    pub fn colour_output(&self) -> bool {
        !matches!(self, Commands::Start { .. })
    }
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
