use std::{
    error::Error,
    os::unix::process::CommandExt,
    process::Command,
    sync::mpsc::{self, RecvTimeoutError},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use redisapp::{
    bundle::Bundle,
    cli::{Cli, Commands, parse_args},
    config::{Config, load_config},
    constants::{CLI_BINARY, EXIT_POLL_INTERVAL, SERVER_BINARY},
    error::{LogsError, SupervisorError},
    logs::show_log,
    paths::AppPaths,
    supervisor::{LaunchConfig, Supervisor, log_output},
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Run => run_server(&config)?,
        Commands::Cli { args } => open_cli(&config, &args)?,
        Commands::Logs { lines } => {
            let paths = AppPaths::from_config(&config)?;
            let log_path = paths.log_file(config.server.log_file());
            match show_log(&log_path, lines) {
                Ok(()) => {}
                Err(LogsError::LogUnavailable(path)) => {
                    warn!("No server log at {}", path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Paths => {
            let paths = AppPaths::from_config(&config)?;
            println!("Data directory: {}", paths.data_dir.display());
            println!("Logs directory: {}", paths.log_dir.display());
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

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Bootstraps the directories, runs the server until a termination signal arrives or the
/// server exits by itself, then stops it and logs its remaining output.
fn run_server(config: &Config) -> Result<(), Box<dyn Error>> {
    let paths = AppPaths::from_config(config)?;
    paths.create_directories();

    let timeouts = config.server.stop_timeouts()?;
    let mut supervisor = Supervisor::new(config.server.on_conflict, timeouts);

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    let launch = Bundle::current(config.vendor_dir.as_deref())
        .resolve(SERVER_BINARY, config.server.executable.as_deref())
        .map_err(SupervisorError::from)
        .map(|executable| {
            LaunchConfig::server(
                executable,
                &paths.data_dir,
                &paths.log_file(config.server.log_file()),
            )
        });

    info!("Run {SERVER_BINARY}");
    let pid = match launch.and_then(|launch| supervisor.start(launch)) {
        Ok(pid) => pid,
        Err(err) => {
            error!("Failed to start {SERVER_BINARY}: {err}");
            return Err(err.into());
        }
    };
    info!("{SERVER_BINARY} running (PID {pid})");

    let unexpected_exit = loop {
        match shutdown_rx.recv_timeout(EXIT_POLL_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("Shutdown requested");
                break None;
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(status) = supervisor.poll_exit() {
                    warn!("{SERVER_BINARY} exited on its own: {status}");
                    break Some(status);
                }
            }
        }
    };

    info!("Terminate {SERVER_BINARY}");
    if let Some(outcome) = supervisor.stop() {
        log_output(&outcome);
    }

    match unexpected_exit {
        Some(status) => Err(SupervisorError::Exited { pid, status }.into()),
        None => Ok(()),
    }
}

/// Replaces this process with the bundled client, forwarding `args`.
fn open_cli(config: &Config, args: &[String]) -> Result<(), Box<dyn Error>> {
    let client = Bundle::current(config.vendor_dir.as_deref())
        .resolve(CLI_BINARY, config.client.executable.as_deref())?;

    info!("Opening {}", client.display());
    let err = Command::new(&client).args(args).exec();
    Err(SupervisorError::LaunchFailed {
        executable: client,
        source: err,
    }
    .into())
}
