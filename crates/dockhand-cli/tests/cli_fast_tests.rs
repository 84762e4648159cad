//! Fast CLI tests using assert_cmd.
//! These test the binary directly without needing a reachable backend.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use assert_cmd::Command;
use predicates::prelude::*;

// TCP port 9 (discard) is never served; connecting fails immediately
const DEAD_BACKEND: &str = "http://127.0.0.1:9";

#[test]
fn test_help_flag() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Docker Compose dashboard CLI"));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn test_no_args_shows_help() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_subcommand_help() {
    for subcmd in &[
        "list", "show", "update", "watch", "auto", "monitor", "settings", "config",
    ] {
        Command::cargo_bin("dockhand")
            .unwrap()
            .args([subcmd, "--help"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

#[test]
fn test_settings_set_help_lists_options() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .args(["settings", "set", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--mature-after"))
        .stdout(predicate::str::contains("--dryrun"));
}

#[test]
fn test_unknown_subcommand_fails() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .arg("nonexistent-subcommand")
        .assert()
        .failure();
}

#[test]
fn test_watch_requires_services() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .arg("watch")
        .assert()
        .failure();
}

#[test]
fn test_unreachable_backend_fails() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .args(["--url", DEAD_BACKEND, "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("Could not reach the backend"));
}

#[test]
fn test_backend_url_env_var() {
    Command::cargo_bin("dockhand")
        .unwrap()
        .env("DOCKHAND_BACKEND_URL", DEAD_BACKEND)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains(DEAD_BACKEND));
}

#[test]
fn test_config_shows_output() {
    // Point the config lookup at an empty directory so the defaults show
    let tmp = tempfile::tempdir().unwrap();
    Command::cargo_bin("dockhand")
        .unwrap()
        .env("XDG_CONFIG_HOME", tmp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[backend]"));
}
