//! Configuration management for redisapp.
use regex::Regex;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::{
    constants::{CONFIG_DIR, CONFIG_FILE_NAME, DEFAULT_LOG_FILE},
    error::ConfigError,
    supervisor::{StartPolicy, StopTimeouts},
};

/// Represents the structure of the configuration file. Every section is optional.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Configuration version.
    pub version: Option<String>,
    /// Where the server keeps its data and logs.
    #[serde(default)]
    pub paths: PathsConfig,
    /// How the server is launched and stopped.
    #[serde(default)]
    pub server: ServerConfig,
    /// The interactive client.
    #[serde(default)]
    pub client: ClientConfig,
    /// Overrides the bundled vendor directory (`Vendor/redis/bin`).
    pub vendor_dir: Option<PathBuf>,
}

/// Data and log directory overrides.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Data directory passed to the server via `--dir`.
    pub data_dir: Option<PathBuf>,
    /// Directory holding the server log; defaults to `<data_dir>/Logs`.
    pub log_dir: Option<PathBuf>,
}

/// Server launch settings.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Explicit path to `redis-server`, bypassing the bundle lookup.
    pub executable: Option<PathBuf>,
    /// Log file name inside the log directory.
    pub log_file: Option<String>,
    /// What to do when asked to start while already running.
    #[serde(default)]
    pub on_conflict: StartPolicy,
    /// Upper bound on the output drain during stop (e.g. "10s").
    pub drain_timeout: Option<String>,
    /// Upper bound on reaping the process during stop (e.g. "2s").
    pub reap_timeout: Option<String>,
}

impl ServerConfig {
    /// Log file name, falling back to the default.
    pub fn log_file(&self) -> &str {
        self.log_file.as_deref().unwrap_or(DEFAULT_LOG_FILE)
    }

    /// Resolves the configured stop timeouts.
    pub fn stop_timeouts(&self) -> Result<StopTimeouts, ConfigError> {
        let defaults = StopTimeouts::default();
        Ok(StopTimeouts {
            drain: self
                .drain_timeout
                .as_deref()
                .map(parse_duration)
                .transpose()?
                .unwrap_or(defaults.drain),
            reap: self
                .reap_timeout
                .as_deref()
                .map(parse_duration)
                .transpose()?
                .unwrap_or(defaults.reap),
        })
    }
}

/// Client launch settings.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Explicit path to `redis-cli`, bypassing the bundle lookup.
    pub executable: Option<PathBuf>,
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::InvalidDuration(raw.to_string()));
    }

    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    if let Some(stripped) = value.strip_suffix("ms") {
        let amount: u64 = stripped.trim().parse().map_err(|_| invalid())?;
        return Ok(Duration::from_millis(amount));
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

/// Expands `$VAR` and `${VAR}` references within a string.
///
/// YAML comments are copied through untouched, so a commented-out `$VAR` never has to be set.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid env var pattern");

    let mut missing = None;
    let mut result = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        let (content, comment) = line.split_at(comment_start(line).unwrap_or(line.len()));
        let expanded = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| var_name.to_string());
                    String::new()
                }
            }
        });
        result.push_str(&expanded);
        result.push_str(comment);
    }

    match missing {
        Some(var) => Err(ConfigError::MissingEnvVar(var)),
        None => Ok(result),
    }
}

/// Byte offset of the `#` opening a YAML comment: outside quotes and at the start of the line
/// or after whitespace.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    for (idx, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            (None, '#') if prev.is_none_or(char::is_whitespace) => return Some(idx),
            _ => {}
        }
        prev = Some(ch);
    }
    None
}

/// Default config location: `$HOME/.config/redisapp/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILE_NAME))
}

/// Loads the configuration.
///
/// An explicit path must exist. Without one, the default location is used when present and
/// built-in defaults otherwise.
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path().filter(|path| path.exists()) {
            Some(path) => path,
            None => {
                debug!("No config file found; using defaults");
                return Ok(Config::default());
            }
        },
    };

    debug!("Loading config from {:?}", path);

    let content = fs::read_to_string(&path).map_err(|e| {
        ConfigError::Read(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, path.display()),
        ))
    })?;

    parse_config(&content)
}

/// Parses YAML configuration text after expanding environment variables.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let expanded = expand_env_vars(content)?;
    if expanded.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(&expanded)?)
}
