//! Configuration management for daemonctl.
use regex::Regex;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constants::{CHILD_PROCESS_WAIT_TIMEOUT, DEFAULT_UMASK, DEFAULT_WORKING_DIRECTORY},
    error::ConfigError,
};

/// Daemon options as read from a YAML file.
///
/// Every key is optional so command-line flags can fill in or override values.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Where the daemon records its PID.
    pub pid_file: Option<PathBuf>,
    /// File receiving the daemon's stdout and stderr.
    pub log_file: Option<PathBuf>,
    /// Directory the daemon changes into.
    pub working_directory: Option<PathBuf>,
    /// File creation mask, e.g. `"022"`.
    pub umask: Option<UmaskSetting>,
    /// Wait per signal round when reaping children, e.g. `"5s"`.
    pub child_wait_timeout: Option<String>,
}

/// A umask written either as an octal string or as a plain number.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UmaskSetting {
    /// Octal digits, with or without a `0o` prefix.
    Octal(String),
    /// Numeric mask value.
    Bits(u32),
}

impl DaemonConfig {
    /// Resolved umask, falling back to the default.
    pub fn umask(&self) -> Result<u32, ConfigError> {
        match &self.umask {
            None => Ok(DEFAULT_UMASK),
            Some(UmaskSetting::Octal(raw)) => parse_umask(raw),
            Some(UmaskSetting::Bits(bits)) if *bits <= 0o777 => Ok(*bits),
            Some(UmaskSetting::Bits(bits)) => Err(ConfigError::InvalidValue {
                field: "umask",
                value: bits.to_string(),
            }),
        }
    }

    /// Resolved child wait timeout, falling back to the default.
    pub fn child_wait_timeout(&self) -> Result<Duration, ConfigError> {
        self.child_wait_timeout
            .as_deref()
            .map(parse_duration)
            .unwrap_or(Ok(CHILD_PROCESS_WAIT_TIMEOUT))
    }

    /// Resolved working directory, falling back to `/`.
    pub fn working_directory(&self) -> PathBuf {
        self.working_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKING_DIRECTORY))
    }

    /// Anchors relative paths at `base`.
    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.pid_file,
            &mut self.log_file,
            &mut self.working_directory,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Expands `$VAR` and `${VAR}` references from the environment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")
        .expect("environment variable pattern is valid");

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    match missing {
        Some(var_name) => Err(ConfigError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

/// Loads daemon options from a YAML file, expanding environment variables.
///
/// Relative paths in the file are resolved against the file's directory.
pub fn load_config(config_path: &Path) -> Result<DaemonConfig, ConfigError> {
    let content = fs::read_to_string(config_path).map_err(|e| {
        ConfigError::Read(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    let expanded_content = expand_env_vars(&content)?;
    let mut config: DaemonConfig = serde_yaml::from_str(&expanded_content)?;

    let base_path = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base_path);
    Ok(config)
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        field: "child_wait_timeout",
        value: raw.to_string(),
    };

    let value = raw.trim();
    if value.is_empty() {
        return Err(invalid());
    }

    if let Some(stripped) = value.strip_suffix("ms") {
        let millis: u64 = stripped.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(millis));
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

/// Parses an octal umask such as `022`, `0022` or `0o022`.
pub fn parse_umask(raw: &str) -> Result<u32, ConfigError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);

    match u32::from_str_radix(digits, 8) {
        Ok(bits) if !digits.is_empty() && bits <= 0o777 => Ok(bits),
        _ => Err(ConfigError::InvalidValue {
            field: "umask",
            value: raw.to_string(),
        }),
    }
}
