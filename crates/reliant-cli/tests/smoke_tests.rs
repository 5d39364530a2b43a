//! Smoke tests for the reliant CLI
//!
//! Runs the binary against the simulated engine with a short stability
//! window.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the reliant binary
fn reliant() -> Command {
    let mut cmd = Command::cargo_bin("reliant").expect("reliant binary should exist");
    cmd.env_remove("RELIANT_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn url_list(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("urls.txt");
    fs::write(&path, body).unwrap();
    path
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    reliant()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    reliant()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_shows_help() {
    reliant().assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    reliant()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--fail-on-timeout"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_run_completes_simulated_pages() {
    let dir = TempDir::new().unwrap();
    let list = url_list(&dir, "# smoke\nsim://home?latency=10\nsim://shop?latency=10&redirects=1\n");
    reliant()
        .args(["--color", "never", "run"])
        .arg(&list)
        .args(["--stability-delay", "50", "--timeout", "3000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DONE sim://home?latency=10 completed"))
        .stdout(predicate::str::contains("(2 loads)"))
        .stdout(predicate::str::contains("STABLE 2 URLs"));
}

#[test]
fn test_run_reports_timeout() {
    let dir = TempDir::new().unwrap();
    let list = url_list(&dir, "sim://stuck?latency=10&hang=1\n");
    reliant()
        .args(["--color", "never", "run"])
        .arg(&list)
        .args(["--stability-delay", "50", "--timeout", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TIMEOUT sim://stuck"))
        .stdout(predicate::str::contains("at 60%"));
}

#[test]
fn test_fail_on_timeout_exit_code() {
    let dir = TempDir::new().unwrap();
    let list = url_list(&dir, "sim://ok?latency=10\nsim://stuck?hang=1\n");
    reliant()
        .arg("run")
        .arg(&list)
        .args(["--stability-delay", "50", "--timeout", "200", "--fail-on-timeout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 2 URLs timed out"));
}

#[test]
fn test_run_json_lines() {
    let dir = TempDir::new().unwrap();
    let list = url_list(&dir, "sim://a?latency=10&title=Alpha\n");
    let output = reliant()
        .arg("run")
        .arg(&list)
        .args(["--stability-delay", "50", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let line = stdout.lines().next().unwrap();
    let report: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(report["outcome"], "Completed");
    assert_eq!(report["title"], "Alpha");
}

#[test]
fn test_run_reads_stdin() {
    reliant()
        .args(["--color", "never", "run", "-", "--stability-delay", "50"])
        .write_stdin("sim://piped?latency=10\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("DONE sim://piped"));
}

#[test]
fn test_run_empty_list_fails() {
    let dir = TempDir::new().unwrap();
    let list = url_list(&dir, "# nothing here\n\n");
    reliant()
        .arg("run")
        .arg(&list)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no URLs"));
}

#[test]
fn test_run_missing_list_fails() {
    reliant()
        .args(["run", "/nonexistent/urls.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read URL list"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_shows_defaults() {
    reliant()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("stability_delay_ms: 500"))
        .stdout(predicate::str::contains("script_timeout_threshold: 2"));
}

#[test]
fn test_config_file_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reliant.yaml");
    fs::write(&path, "stability_delay_ms: 750\n").unwrap();
    reliant()
        .args(["config", "--json", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stability_delay_ms\": 750"));
}

#[test]
fn test_config_rejects_zero_window() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reliant.yaml");
    fs::write(&path, "stability_delay_ms: 0\n").unwrap();
    reliant()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
