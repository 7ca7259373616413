//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! State must carry over between invocations through the data directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a CLI command with a temporary data directory
fn cli_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fastedh").expect("Failed to find fastedh binary");
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd
}

/// Write a config with a fast clock so timer tests finish quickly
fn fast_clock(data_dir: &TempDir, policy: &str) {
    let config = format!(
        r#"{{ "expiry_policy": "{}", "tick_period_ms": 20 }}"#,
        policy
    );
    std::fs::write(data_dir.path().join("config.json"), config).unwrap();
}

fn seat(data_dir: &TempDir, args: &[&str]) {
    cli_cmd(data_dir)
        .args(["player", "add"])
        .args(args)
        .assert()
        .success();
}

// ============================================================================
// Info Command Tests
// ============================================================================

#[test]
fn test_info_command() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fast EDH"))
        .stdout(predicate::str::contains("Data directory:"))
        .stdout(predicate::str::contains("Players seated: 0"));
}

#[test]
fn test_malformed_config_fails() {
    let data_dir = TempDir::new().unwrap();
    std::fs::write(data_dir.path().join("config.json"), "{ nope").unwrap();

    cli_cmd(&data_dir)
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config error"));
}

// ============================================================================
// Player Command Tests
// ============================================================================

#[test]
fn test_player_add_uses_default_life() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["player", "add", "1", "--name", "Atraxa"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seated player 1"))
        .stdout(predicate::str::contains("Life: 40"));
}

#[test]
fn test_player_add_twice_fails() {
    let data_dir = TempDir::new().unwrap();
    seat(&data_dir, &["1"]);

    cli_cmd(&data_dir)
        .args(["player", "add", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already seated"));
}

#[test]
fn test_player_add_rejects_bad_rotation() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["player", "add", "1", "--rotation", "45"])
        .assert()
        .failure();
}

#[test]
fn test_life_changes_persist_across_runs() {
    let data_dir = TempDir::new().unwrap();
    seat(&data_dir, &["2", "--name", "Kinnan"]);

    cli_cmd(&data_dir)
        .args(["player", "life", "2", "-45"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Player 2 life: -5"));

    cli_cmd(&data_dir)
        .args(["player", "life", "2", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Player 2 life: -2"));

    cli_cmd(&data_dir)
        .args(["player", "show", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Player 2: Kinnan"))
        .stdout(predicate::str::contains("Life: -2"));
}

#[test]
fn test_extreme_life_changes_saturate() {
    let data_dir = TempDir::new().unwrap();
    seat(&data_dir, &["3"]);

    for _ in 0..2 {
        cli_cmd(&data_dir)
            .args(["player", "life", "3", "9223372036854775807"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Player 3 life: 9223372036854775807"));
    }
}

#[test]
fn test_rename_and_list() {
    let data_dir = TempDir::new().unwrap();
    seat(&data_dir, &["1", "--name", "Tymna"]);
    seat(&data_dir, &["2"]);

    cli_cmd(&data_dir)
        .args(["player", "rename", "2", "Thrasios"])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .args(["player", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tymna"))
        .stdout(predicate::str::contains("Thrasios"));
}

#[test]
fn test_rotate_cycles_quarter_turns() {
    let data_dir = TempDir::new().unwrap();
    seat(&data_dir, &["3", "--rotation", "270"]);

    cli_cmd(&data_dir)
        .args(["player", "rotate", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rotation: 0°"));

    cli_cmd(&data_dir)
        .args(["player", "rotate", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rotation: 90°"));
}

#[test]
fn test_unknown_player_fails() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["player", "show", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No player with id 9"));
}

// ============================================================================
// Timer Command Tests
// ============================================================================

#[test]
fn test_timer_run_counts_down_and_persists() {
    let data_dir = TempDir::new().unwrap();
    fast_clock(&data_dir, "overtime");
    seat(&data_dir, &["1", "--time", "65"]);

    cli_cmd(&data_dir)
        .args(["timer", "run", "1", "--seconds", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("01:00 after 5 ticks"));

    cli_cmd(&data_dir)
        .args(["timer", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Player 1 clock: 01:00"));
}

#[test]
fn test_timer_floors_at_zero() {
    let data_dir = TempDir::new().unwrap();
    fast_clock(&data_dir, "floor_at_zero");
    seat(&data_dir, &["1", "--time", "2"]);

    cli_cmd(&data_dir)
        .args(["timer", "run", "1", "--seconds", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("00:00 after 2 ticks"));

    cli_cmd(&data_dir)
        .args(["timer", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Player 1 clock: 00:00"));
}

#[test]
fn test_timer_overtime_goes_negative_then_resets() {
    let data_dir = TempDir::new().unwrap();
    fast_clock(&data_dir, "overtime");
    seat(&data_dir, &["1", "--time", "1"]);

    cli_cmd(&data_dir)
        .args(["timer", "run", "1", "--seconds", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-00:02"));

    cli_cmd(&data_dir)
        .args(["timer", "reset", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Player 1 clock: 00:01"));
}

// ============================================================================
// Cache Command Tests
// ============================================================================

#[test]
fn test_cache_plan_lists_assets() {
    let data_dir = TempDir::new().unwrap();
    let manifest = data_dir.path().join("manifest.json");
    std::fs::write(
        &manifest,
        r#"{ "version": "1718", "build": ["/fast-edh/_app/start.js"], "files": ["/fast-edh/offline.html"] }"#,
    )
    .unwrap();

    cli_cmd(&data_dir)
        .args(["cache", "plan"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache: cache-1718"))
        .stdout(predicate::str::contains("Assets (3):"))
        .stdout(predicate::str::contains("/fast-edh/_app/start.js"));
}

#[test]
fn test_cache_plan_rejects_versionless_manifest() {
    let data_dir = TempDir::new().unwrap();
    let manifest = data_dir.path().join("manifest.json");
    std::fs::write(&manifest, r#"{ "build": [] }"#).unwrap();

    cli_cmd(&data_dir)
        .args(["cache", "plan"])
        .arg(&manifest)
        .assert()
        .failure();
}

// ============================================================================
// Logging Tests
// ============================================================================

#[test]
fn test_log_dir_receives_jsonl() {
    let data_dir = TempDir::new().unwrap();
    let logs = data_dir.path().join("logs");

    cli_cmd(&data_dir)
        .args(["-vv", "player", "add", "1"])
        .arg("--log-dir")
        .arg(&logs)
        .assert()
        .success();

    let raw: Vec<_> = std::fs::read_dir(logs.join("raw")).unwrap().collect();
    assert_eq!(raw.len(), 1);
    let content = std::fs::read_to_string(raw[0].as_ref().unwrap().path()).unwrap();
    assert!(content.contains("\"context\":\"cli\""));
}
