#[path = "common/mod.rs"]
mod common;

use std::fs;

use assert_cmd::Command;
use common::write_config;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn logs_shows_trailing_server_lines() {
    let temp = tempdir().unwrap();
    let data_dir = temp.path().join("data");
    let log_dir = data_dir.join("Logs");
    fs::create_dir_all(&log_dir).unwrap();
    fs::write(
        log_dir.join("server.log"),
        "1:C * oO0OoO0OoO0Oo Redis is starting\n1:M * Ready to accept connections tcp\n1:M # User requested shutdown...\n",
    )
    .unwrap();
    let config = write_config(temp.path(), &temp.path().join("unused"), &data_dir);

    Command::new(assert_cmd::cargo::cargo_bin!("redisapp"))
        .arg("--config")
        .arg(&config)
        .arg("logs")
        .arg("--lines")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ready to accept connections"))
        .stdout(predicate::str::contains("User requested shutdown"))
        .stdout(predicate::str::contains("Redis is starting").not());
}

#[test]
fn logs_without_log_file_warns() {
    let temp = tempdir().unwrap();
    let data_dir = temp.path().join("data");
    let config = write_config(temp.path(), &temp.path().join("unused"), &data_dir);

    Command::new(assert_cmd::cargo::cargo_bin!("redisapp"))
        .arg("--config")
        .arg(&config)
        .arg("logs")
        .assert()
        .success()
        .stdout(predicate::str::contains("No server log"));
}
