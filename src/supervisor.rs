//! Supervisor that owns the lifecycle of the bundled server process.
//!
//! A [`Supervisor`] holds at most one child at a time. `start` spawns it with stdout piped
//! into a stream the supervisor keeps; `stop` terminates it, drains that stream to EOF and
//! reaps the child. Neither operation panics or leaves half-initialised handles behind.

use std::{
    fmt,
    io::Read,
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, ExitStatus, Stdio},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use serde::Deserialize;
use strum::{AsRefStr, EnumString};
use tracing::{debug, error, info, warn};

use crate::{
    constants::{
        DATA_DIR_FLAG, DEFAULT_DRAIN_TIMEOUT, DEFAULT_REAP_TIMEOUT, LOG_FILE_FLAG,
        POST_KILL_DRAIN_WINDOW, PROCESS_CHECK_INTERVAL,
    },
    error::SupervisorError,
};

/// Executable and arguments for one supervised launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Path of the executable to spawn.
    pub executable: PathBuf,
    /// Arguments passed verbatim, in order.
    pub args: Vec<String>,
}

impl LaunchConfig {
    /// Creates a launch config from an executable and its arguments.
    pub fn new(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
        }
    }

    /// Builds the server invocation: `--dir <data_dir> --logfile <log_file>`.
    pub fn server(executable: impl Into<PathBuf>, data_dir: &Path, log_file: &Path) -> Self {
        Self::new(
            executable,
            vec![
                DATA_DIR_FLAG.to_string(),
                data_dir.to_string_lossy().into_owned(),
                LOG_FILE_FLAG.to_string(),
                log_file.to_string_lossy().into_owned(),
            ],
        )
    }
}

/// What `start` does when a process is already supervised.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StartPolicy {
    /// Refuse with [`SupervisorError::AlreadyRunning`], leaving the running process alone.
    #[default]
    Reject,
    /// Stop the running process completely, then launch the new one.
    Restart,
}

/// Upper bounds on how long `stop` may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTimeouts {
    /// Time allowed for the output stream to reach EOF after SIGTERM.
    pub drain: Duration,
    /// Time allowed for the child to be reaped after the stream closed.
    pub reap: Duration,
}

impl Default for StopTimeouts {
    fn default() -> Self {
        Self {
            drain: DEFAULT_DRAIN_TIMEOUT,
            reap: DEFAULT_REAP_TIMEOUT,
        }
    }
}

/// Observable supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No process is supervised.
    Stopped,
    /// A process is supervised.
    Running {
        /// PID of the supervised process.
        pid: u32,
    },
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Stopped => write!(f, "stopped"),
            SupervisorState::Running { pid } => write!(f, "running (PID {pid})"),
        }
    }
}

/// Result of stopping a supervised process.
#[derive(Debug)]
pub struct StopOutcome {
    /// PID of the process that was stopped.
    pub pid: u32,
    /// Everything the process wrote to stdout that had not been read yet, decoded as UTF-8.
    /// Empty when nothing was written or the bytes were not valid UTF-8.
    pub output: String,
    /// Exit status, when the child could be reaped.
    pub exit_status: Option<ExitStatus>,
    /// Whether the process had to be killed with SIGKILL.
    pub forced: bool,
}

/// The child process together with the stream capturing its stdout.
struct SupervisedProcess {
    config: LaunchConfig,
    child: Child,
    output: Option<ChildStdout>,
    started_at: Instant,
    exit_status: Option<ExitStatus>,
}

impl SupervisedProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }
}

/// Owns the lifecycle of a single child process.
pub struct Supervisor {
    policy: StartPolicy,
    timeouts: StopTimeouts,
    active: Option<SupervisedProcess>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(StartPolicy::default(), StopTimeouts::default())
    }
}

impl Supervisor {
    /// Creates a supervisor in the `Stopped` state.
    pub fn new(policy: StartPolicy, timeouts: StopTimeouts) -> Self {
        Self {
            policy,
            timeouts,
            active: None,
        }
    }

    /// The policy applied when `start` is called while running.
    pub fn policy(&self) -> StartPolicy {
        self.policy
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        match &self.active {
            Some(process) => SupervisorState::Running { pid: process.pid() },
            None => SupervisorState::Stopped,
        }
    }

    /// Whether a process is supervised.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// PID of the supervised process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.active.as_ref().map(SupervisedProcess::pid)
    }

    /// Whether the supervisor currently holds the child's output stream.
    pub fn has_output_stream(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|process| process.output.is_some())
    }

    /// Launch configuration of the supervised process, if any.
    pub fn launch_config(&self) -> Option<&LaunchConfig> {
        self.active.as_ref().map(|process| &process.config)
    }

    /// Time elapsed since the supervised process was spawned.
    pub fn uptime(&self) -> Option<Duration> {
        self.active
            .as_ref()
            .map(|process| process.started_at.elapsed())
    }

    /// Spawns `config` and starts supervising it.
    ///
    /// Returns the PID once the OS confirmed the spawn; the server's own initialisation is
    /// not awaited. When a process is already supervised the configured [`StartPolicy`]
    /// decides between refusing and restarting.
    pub fn start(&mut self, config: LaunchConfig) -> Result<u32, SupervisorError> {
        if let Some(pid) = self.pid() {
            match self.policy {
                StartPolicy::Reject => {
                    warn!("Refusing to start {:?}: PID {pid} is still running", config.executable);
                    return Err(SupervisorError::AlreadyRunning { pid });
                }
                StartPolicy::Restart => {
                    info!("Stopping PID {pid} before starting a new instance");
                    if let Some(outcome) = self.stop() {
                        log_output(&outcome);
                    }
                }
            }
        }

        debug!("Launching {:?} with args {:?}", config.executable, config.args);

        let mut cmd = Command::new(&config.executable);
        cmd.args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                error!("Failed to start {:?}: {source}", config.executable);
                return Err(SupervisorError::LaunchFailed {
                    executable: config.executable,
                    source,
                });
            }
        };

        let output = child.stdout.take();
        let pid = child.id();
        info!("Started {:?} (PID {pid})", config.executable);

        self.active = Some(SupervisedProcess {
            config,
            child,
            output,
            started_at: Instant::now(),
            exit_status: None,
        });

        Ok(pid)
    }

    /// Checks, without blocking, whether the supervised process has exited on its own.
    ///
    /// A reaped process keeps the supervisor `Running` until [`Supervisor::stop`] releases
    /// its handles and collects the remaining output.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        let process = self.active.as_mut()?;
        if let Some(status) = process.exit_status {
            return Some(status);
        }

        match process.child.try_wait() {
            Ok(Some(status)) => {
                debug!("PID {} exited with {status}", process.pid());
                process.exit_status = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("Failed to poll PID {}: {err}", process.pid());
                None
            }
        }
    }

    /// Terminates the supervised process, drains its output and releases every handle.
    ///
    /// Returns `None` without touching the OS when nothing is supervised. Otherwise the
    /// supervisor is `Stopped` on return, whatever happened along the way.
    pub fn stop(&mut self) -> Option<StopOutcome> {
        let mut process = self.active.take()?;
        let pid = process.pid();
        let mut forced = false;

        info!("Terminating {:?} (PID {pid})", process.config.executable);

        // The child leads its own process group, so descendants holding the output pipe
        // are signalled too. Once the leader is reaped its PID is free for reuse and only
        // the group may be targeted.
        let leader_reaped = process.exit_status.is_some();
        signal_process_group(pid, Signal::SIGTERM, leader_reaped);

        let bytes = match process.output.take() {
            Some(stream) => {
                let (bytes, killed) = self.drain(stream, pid, leader_reaped);
                forced |= killed;
                bytes
            }
            None => Vec::new(),
        };

        let exit_status = match process.exit_status {
            Some(status) => Some(status),
            None => {
                let (status, killed) = self.reap(&mut process.child, pid);
                forced |= killed;
                status
            }
        };

        let output = decode_output(bytes);
        debug!("PID {pid} stopped (forced: {forced}, status: {exit_status:?})");

        Some(StopOutcome {
            pid,
            output,
            exit_status,
            forced,
        })
    }

    /// Reads the stream to EOF, escalating to SIGKILL when the drain timeout elapses.
    ///
    /// The stream moves into a helper thread so the read can be bounded; it is dropped
    /// there once the read finishes.
    fn drain(
        &self,
        mut stream: ChildStdout,
        pid: u32,
        leader_reaped: bool,
    ) -> (Vec<u8>, bool) {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(err) = stream.read_to_end(&mut buf) {
                debug!("Reading output of PID {pid} stopped early: {err}");
            }
            let _ = tx.send(buf);
        });

        match rx.recv_timeout(self.timeouts.drain) {
            Ok(buf) => (buf, false),
            Err(_) => {
                warn!(
                    "PID {pid} did not close its output within {:?}; sending SIGKILL",
                    self.timeouts.drain
                );
                signal_process_group(pid, Signal::SIGKILL, leader_reaped);
                match rx.recv_timeout(POST_KILL_DRAIN_WINDOW) {
                    Ok(buf) => (buf, true),
                    Err(_) => {
                        warn!("Abandoning output of PID {pid}; the pipe is still held open");
                        (Vec::new(), true)
                    }
                }
            }
        }
    }

    /// Waits for the child to exit, escalating to SIGKILL after the reap timeout.
    fn reap(&self, child: &mut Child, pid: u32) -> (Option<ExitStatus>, bool) {
        match wait_with_timeout(child, self.timeouts.reap) {
            Ok(Some(status)) => (Some(status), false),
            Ok(None) => {
                warn!("PID {pid} still running after its output closed; sending SIGKILL");
                signal_process_group(pid, Signal::SIGKILL, false);
                match child.wait() {
                    Ok(status) => (Some(status), true),
                    Err(err) => {
                        warn!("Failed to reap PID {pid}: {err}");
                        (None, true)
                    }
                }
            }
            Err(err) => {
                warn!("Failed to wait for PID {pid}: {err}");
                (None, false)
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(outcome) = self.stop() {
            log_output(&outcome);
        }
    }
}

/// Sends `sig` to the process group led by `pid`, falling back to the leader itself when
/// the group cannot be signalled and the leader has not been reaped yet. A group or process
/// that no longer exists counts as already stopped.
fn signal_process_group(pid: u32, sig: Signal, leader_reaped: bool) {
    let target = Pid::from_raw(pid as i32);

    match signal::killpg(target, sig) {
        Ok(()) => {
            debug!("Sent {sig} to process group {pid}");
            return;
        }
        Err(Errno::ESRCH) => {
            debug!("Process group {pid} has no members left for {sig}");
        }
        Err(Errno::EPERM) => {
            warn!(
                "Insufficient permissions to signal process group {pid}; falling back to direct signal"
            );
        }
        Err(err) => warn!("Failed to send {sig} to process group {pid}: {err}"),
    }

    if leader_reaped {
        return;
    }

    match signal::kill(target, sig) {
        Ok(()) => debug!("Sent {sig} to PID {pid}"),
        Err(Errno::ESRCH) => debug!("PID {pid} exited before {sig} could be delivered"),
        Err(err) => warn!("Failed to send {sig} to PID {pid}: {err}"),
    }
}

/// Wait for a child process with a timeout, returning `Ok(None)` on timeout.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(PROCESS_CHECK_INTERVAL);
            }
        }
    }
}

/// Decodes drained output, discarding it when it is not valid UTF-8.
fn decode_output(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| {
        debug!(
            "Discarding {} bytes of undecodable output",
            err.as_bytes().len()
        );
        String::new()
    })
}

/// Logs the output collected by `stop`, if there is any.
pub fn log_output(outcome: &StopOutcome) {
    let output = outcome.output.trim_end();
    if !output.is_empty() {
        info!("Output of PID {}:\n{output}", outcome.pid);
    }
}
