//! Error handling for redisapp.
use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

/// Errors raised while launching or supervising the server process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The executable could not be resolved or the OS refused to spawn it.
    #[error("Failed to launch '{}': {source}", .executable.display())]
    LaunchFailed {
        /// Executable that was being launched.
        executable: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// `start` was called while a process is already supervised.
    #[error("A supervised process is already running (PID {pid})")]
    AlreadyRunning {
        /// PID of the process that is still running.
        pid: u32,
    },

    /// The supervised process terminated without being asked to stop.
    #[error("Supervised process {pid} exited on its own: {status}")]
    Exited {
        /// PID the process ran under.
        pid: u32,
        /// How it terminated.
        status: ExitStatus,
    },
}

impl From<BundleError> for SupervisorError {
    /// A bundled executable that cannot be found is a launch failure.
    fn from(err: BundleError) -> Self {
        let executable = match &err {
            BundleError::NotFound { name, .. } => PathBuf::from(name),
        };
        SupervisorError::LaunchFailed {
            executable,
            source: io::Error::new(io::ErrorKind::NotFound, err.to_string()),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading the configuration file.
    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration references an environment variable that is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A duration value is not in `<number>[s|m|h]` form.
    #[error("Invalid duration value: '{0}'")]
    InvalidDuration(String),

    /// Neither the platform documents directory nor `HOME` is available.
    #[error("Unable to determine the user's documents directory")]
    NoDocumentsDir,
}

/// Error type for locating bundled executables.
#[derive(Debug, Error)]
pub enum BundleError {
    /// None of the candidate locations contain the executable.
    #[error("Bundled executable '{name}' not found (searched: {})", display_paths(.searched))]
    NotFound {
        /// File name of the executable.
        name: String,
        /// Every location that was checked.
        searched: Vec<PathBuf>,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error type for log inspection.
#[derive(Debug, Error)]
pub enum LogsError {
    /// The server has not written a log file yet.
    #[error("Log file unavailable: {}", .0.display())]
    LogUnavailable(PathBuf),

    /// Error while reading the log file.
    #[error("Failed to read log file: {0}")]
    Read(#[from] io::Error),
}
