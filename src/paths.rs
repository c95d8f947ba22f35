//! Data and log directory layout.
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
    config::Config,
    constants::{DATA_DIR_NAME, LOGS_DIR_NAME},
    error::ConfigError,
};

/// Directories the server writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Passed to the server via `--dir`.
    pub data_dir: PathBuf,
    /// Holds the server log file.
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// `<base>/RedisData` and `<base>/RedisData/Logs`.
    pub fn under(base: &Path) -> Self {
        let data_dir = base.join(DATA_DIR_NAME);
        let log_dir = data_dir.join(LOGS_DIR_NAME);
        Self { data_dir, log_dir }
    }

    /// Resolves the layout from configuration overrides, defaulting to the user's documents
    /// directory.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let data_dir = match &config.paths.data_dir {
            Some(dir) => expand_home(dir),
            None => documents_dir()?.join(DATA_DIR_NAME),
        };
        let log_dir = match &config.paths.log_dir {
            Some(dir) => expand_home(dir),
            None => data_dir.join(LOGS_DIR_NAME),
        };

        Ok(Self { data_dir, log_dir })
    }

    /// Full path of the server's log file.
    pub fn log_file(&self, name: &str) -> PathBuf {
        self.log_dir.join(name)
    }

    /// Creates both directories if they are missing.
    ///
    /// Existing directories are left alone and failures are logged, never returned: the
    /// server reports its own error if it cannot use them.
    pub fn create_directories(&self) {
        for dir in [&self.data_dir, &self.log_dir] {
            if let Err(err) = ensure_dir(dir) {
                warn!("Failed to create directory {:?}: {err}", dir);
            }
        }

        info!("Redis data directory: {}", self.data_dir.display());
        info!("Redis logs directory: {}", self.log_dir.display());
    }
}

fn ensure_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
}

/// Replaces a leading `~` component with the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) if rest.as_os_str().is_empty() => home,
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// The platform documents directory, falling back to `$HOME/Documents`.
fn documents_dir() -> Result<PathBuf, ConfigError> {
    dirs::document_dir()
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join("Documents")))
        .ok_or(ConfigError::NoDocumentsDir)
}
