//! Constants and default values used across redisapp.
//!
//! Directory names, bundled executable names and supervisor timings live here so the
//! runtime modules and the tests agree on them.

use std::time::Duration;

// ============================================================================
// File System Layout
// ============================================================================

/// Directory created under the user's documents folder to hold the server's data.
pub const DATA_DIR_NAME: &str = "RedisData";

/// Directory created under the data directory to hold the server's log file.
pub const LOGS_DIR_NAME: &str = "Logs";

/// Log file name handed to the server via `--logfile`.
pub const DEFAULT_LOG_FILE: &str = "server.log";

/// Name of the configuration file looked up in the user's config directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Config directory relative to `HOME`.
pub const CONFIG_DIR: &str = ".config/redisapp";

// ============================================================================
// Bundled Executables
// ============================================================================

/// Location of the vendored binaries inside the bundle resources.
pub const VENDOR_BIN_DIR: &str = "Vendor/redis/bin";

/// Resources directory of a macOS application bundle, relative to `Contents/MacOS`.
pub const BUNDLE_RESOURCES_DIR: &str = "../Resources";

/// The supervised server executable.
pub const SERVER_BINARY: &str = "redis-server";

/// The interactive client executable.
pub const CLI_BINARY: &str = "redis-cli";

/// Flag passing the data directory to the server.
pub const DATA_DIR_FLAG: &str = "--dir";

/// Flag passing the log file path to the server.
pub const LOG_FILE_FLAG: &str = "--logfile";

// ============================================================================
// Supervisor Timing
// ============================================================================

/// Maximum time `stop` waits for the output stream to close before escalating to SIGKILL.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum time `stop` waits to reap the child once its output stream closed.
pub const DEFAULT_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Extra time granted to the drain after a SIGKILL escalation.
pub const POST_KILL_DRAIN_WINDOW: Duration = Duration::from_secs(1);

/// Polling interval when waiting for a child process to exit.
pub const PROCESS_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// How often the `run` loop checks whether the server exited on its own.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

// ============================================================================
// Logging and Output
// ============================================================================

/// Default number of log lines shown by `redisapp logs`.
pub const DEFAULT_LOG_LINES: usize = 50;

/// Project page, shown in the CLI's long help.
pub const DOCS_URL: &str = "https://github.com/jpadilla/redisapp";
