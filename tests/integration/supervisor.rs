#[path = "common/mod.rs"]
mod common;

use std::{fs, path::Path, time::Duration};

use common::{FAKE_SERVER, is_process_alive, wait_for_path};
use redisapp::{
    bundle::Bundle,
    constants::SERVER_BINARY,
    error::SupervisorError,
    paths::AppPaths,
    supervisor::{LaunchConfig, StartPolicy, StopTimeouts, Supervisor, SupervisorState},
};
use tempfile::tempdir;

/// Launches the fake server through `/bin/sh`, followed by the server arguments.
fn server_launch(dir: &Path, paths: &AppPaths) -> LaunchConfig {
    let script = dir.join("redis-server.sh");
    fs::write(&script, FAKE_SERVER).unwrap();

    let server = LaunchConfig::server(
        "/bin/sh",
        &paths.data_dir,
        &paths.log_file("server.log"),
    );
    let mut args = vec![script.to_string_lossy().into_owned()];
    args.extend(server.args);
    LaunchConfig::new("/bin/sh", args)
}

#[test]
fn server_round_trip_captures_output() {
    let temp = tempdir().unwrap();
    let paths = AppPaths::under(temp.path());
    paths.create_directories();

    let mut supervisor = Supervisor::default();
    let pid = supervisor
        .start(server_launch(temp.path(), &paths))
        .expect("start fake server");

    assert_eq!(supervisor.state(), SupervisorState::Running { pid });
    assert!(supervisor.has_output_stream());
    wait_for_path(&temp.path().join("started"));

    let args = fs::read_to_string(temp.path().join("args.txt")).unwrap();
    let expected = format!(
        "--dir\n{}\n--logfile\n{}\n",
        paths.data_dir.display(),
        paths.log_dir.join("server.log").display()
    );
    assert_eq!(args, expected);

    let outcome = supervisor.stop().expect("server was running");
    assert_eq!(outcome.pid, pid);
    assert_eq!(outcome.output, "server ready\nserver shutting down\n");
    assert!(!outcome.forced);
    assert_eq!(outcome.exit_status.and_then(|status| status.code()), Some(0));

    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert!(!supervisor.has_output_stream());
    assert!(!is_process_alive(pid));
    assert!(supervisor.stop().is_none());
}

#[test]
fn immediate_stop_yields_whatever_was_written() {
    let temp = tempdir().unwrap();
    let paths = AppPaths::under(temp.path());

    let mut supervisor = Supervisor::default();
    supervisor
        .start(server_launch(temp.path(), &paths))
        .expect("start fake server");

    let outcome = supervisor.stop().expect("server was running");
    assert!(
        outcome.output.is_empty() || outcome.output.starts_with("server ready"),
        "unexpected output: {:?}",
        outcome.output
    );
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[test]
fn second_start_is_rejected_by_default() {
    let temp = tempdir().unwrap();
    let paths = AppPaths::under(temp.path());
    let launch = server_launch(temp.path(), &paths);

    let mut supervisor = Supervisor::default();
    let first = supervisor.start(launch.clone()).unwrap();

    let err = supervisor.start(launch).unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning { pid } if pid == first));
    assert!(is_process_alive(first));
    assert_eq!(supervisor.state(), SupervisorState::Running { pid: first });

    supervisor.stop();
    assert!(!is_process_alive(first));
}

#[test]
fn second_start_restarts_when_configured() {
    let temp = tempdir().unwrap();
    let paths = AppPaths::under(temp.path());
    let launch = server_launch(temp.path(), &paths);

    let mut supervisor = Supervisor::new(
        StartPolicy::Restart,
        StopTimeouts {
            drain: Duration::from_secs(5),
            reap: Duration::from_secs(1),
        },
    );
    let first = supervisor.start(launch.clone()).unwrap();
    let second = supervisor.start(launch).unwrap();

    assert!(!is_process_alive(first));
    assert!(is_process_alive(second));
    assert_eq!(supervisor.pid(), Some(second));

    supervisor.stop();
}

#[test]
fn unresolvable_server_is_a_launch_failure() {
    let temp = tempdir().unwrap();
    let bundle = Bundle::rooted_at(temp.path(), None);

    let err = bundle
        .resolve(SERVER_BINARY, None)
        .map_err(SupervisorError::from)
        .unwrap_err();
    assert!(matches!(err, SupervisorError::LaunchFailed { .. }));
}

#[test]
fn dropping_the_supervisor_stops_the_server() {
    let temp = tempdir().unwrap();
    let paths = AppPaths::under(temp.path());

    let pid = {
        let mut supervisor = Supervisor::default();
        supervisor.start(server_launch(temp.path(), &paths)).unwrap()
    };

    assert!(!is_process_alive(pid));
}

#[test]
fn directory_bootstrap_twice_is_harmless() {
    let temp = tempdir().unwrap();
    let paths = AppPaths::under(temp.path());

    paths.create_directories();
    paths.create_directories();

    assert!(paths.data_dir.is_dir());
    assert!(paths.log_dir.is_dir());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    assert_eq!(fs::read_dir(&paths.data_dir).unwrap().count(), 1);
}
