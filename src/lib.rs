//! redisapp runs a bundled `redis-server` as a supervised child process. It creates the
//! data and log directories, launches the server with them, and on shutdown terminates it
//! and collects whatever it wrote to stdout. Small helpers open the bundled `redis-cli`
//! and show the server log.

/// Bundled executable lookup.
pub mod bundle;

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Shared constants.
pub mod constants;

/// Error handling.
pub mod error;

/// Logs management.
pub mod logs;

/// Data and log directory layout.
pub mod paths;

/// Lifecycle of the supervised server process.
pub mod supervisor;

#[doc(hidden)]
pub mod test_utils;
