#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock},
    thread,
    time::{Duration, Instant},
};

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Server stand-in: records its arguments, announces itself, and shuts down on SIGTERM.
pub const FAKE_SERVER: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$(dirname "$0")/args.txt"
trap 'echo "server shutting down"; exit 0' TERM
echo "server ready"
touch "$(dirname "$0")/started"
while true; do sleep 0.1; done
"#;

/// Server stand-in that exits right after writing one line.
pub const ONE_SHOT_SERVER: &str = r#"#!/bin/sh
echo "one-shot output"
exit 0
"#;

static SERIAL: OnceLock<Mutex<()>> = OnceLock::new();

/// Runs tests that write and exec scripts one at a time, so no forked child can still hold
/// a script open for writing when another test executes it.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes an executable shell script.
pub fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

/// Writes a YAML config pointing the server at `executable` and data at `data_dir`.
pub fn write_config(dir: &Path, executable: &Path, data_dir: &Path) -> PathBuf {
    let path = dir.join("redisapp.yaml");
    fs::write(
        &path,
        format!(
            r#"version: "1"
paths:
  data_dir: "{}"
server:
  executable: "{}"
  drain_timeout: "5s"
"#,
            data_dir.display(),
            executable.display()
        ),
    )
    .expect("write config");
    path
}

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}
