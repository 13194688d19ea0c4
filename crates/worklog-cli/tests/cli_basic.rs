//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against a throwaway data
//! directory and verify outputs. CRM-backed commands are exercised only
//! on their offline paths, so no network or keyring state is required.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command against the given data directory and return
/// (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "worklog-cli", "--quiet", "--"])
        .args(args)
        .env("WORKLOG_DATA_DIR", data_dir)
        .env("WORKLOG_USER", "42")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_timer_new_start_stop_roundtrip() {
    let dir = TempDir::new().expect("tempdir");

    let output = run_cli(dir.path(), &["timer", "new", "design", "--tag", "2"]);
    assert_eq!(output.2, 0, "timer new failed: {}", output.1);
    assert!(output.0.contains("Timer 'design (non-qc)' created."));

    let output = run_cli(dir.path(), &["timer", "start", "design"]);
    assert_eq!(output.2, 0, "timer start failed: {}", output.1);
    assert!(output.0.contains("Timer 'design' started!"));

    let output = run_cli(dir.path(), &["timer", "stop", "design"]);
    assert_eq!(output.2, 0, "timer stop failed: {}", output.1);
    assert!(output.0.contains("Timer 'design' stopped:"));
    assert!(output.0.contains("Total: 0h 0m."));
}

#[test]
fn test_timer_stop_all_closes_sessions_and_greets() {
    let dir = TempDir::new().expect("tempdir");
    run_cli(dir.path(), &["timer", "new", "design"]);
    run_cli(dir.path(), &["timer", "start", "design"]);

    let output = run_cli(dir.path(), &["timer", "stop-all"]);
    assert_eq!(output.2, 0, "timer stop-all failed: {}", output.1);
    assert!(output.0.contains("Closed 1 open session(s)."));
    assert!(output.0.contains("Work log ready."));

    let output = run_cli(dir.path(), &["timer", "stop-all"]);
    assert_eq!(output.2, 0, "timer stop-all failed: {}", output.1);
    assert!(!output.0.contains("Closed"));
    assert!(output.0.contains("Work log ready."));
}

#[test]
fn test_timer_list_shows_labels_in_creation_order() {
    let dir = TempDir::new().expect("tempdir");
    run_cli(dir.path(), &["timer", "new", "design", "--tag", "2"]);
    run_cli(dir.path(), &["timer", "new", "audit", "--tag", "3"]);

    let output = run_cli(dir.path(), &["timer", "list"]);
    assert_eq!(output.2, 0, "timer list failed: {}", output.1);
    assert_eq!(output.0, "design (non-qc)\naudit (qc)\n");
}

#[test]
fn test_timer_add_updates_stats() {
    let dir = TempDir::new().expect("tempdir");
    run_cli(dir.path(), &["timer", "new", "design"]);

    let output = run_cli(dir.path(), &["timer", "add", "design", "90"]);
    assert_eq!(output.2, 0, "timer add failed: {}", output.1);
    assert!(output.0.contains("Added 90 min to 'design'. Total: 1h 30m."));

    let output = run_cli(dir.path(), &["stats", "today"]);
    assert_eq!(output.2, 0, "stats today failed: {}", output.1);
    assert!(output.0.contains("1.50h (1h 30m)"));
}

#[test]
fn test_stats_today_with_no_timers() {
    let dir = TempDir::new().expect("tempdir");
    let output = run_cli(dir.path(), &["stats", "today"]);
    assert_eq!(output.2, 0, "stats today failed: {}", output.1);
    assert!(output.0.contains("No timers for today."));
}

#[test]
fn test_unknown_timer_reports_politely() {
    let dir = TempDir::new().expect("tempdir");
    let output = run_cli(dir.path(), &["timer", "start", "ghost"]);
    assert_eq!(output.2, 0, "timer start should not hard-fail: {}", output.1);
    assert!(output.0.contains("No timer named 'ghost' today."));
}

#[test]
fn test_account_link_and_show() {
    let dir = TempDir::new().expect("tempdir");

    let output = run_cli(dir.path(), &["account", "link", "555", "Jay"]);
    assert_eq!(output.2, 0, "account link failed: {}", output.1);
    assert!(output.0.contains("Account linked: Jay (CRM user 555)."));

    let output = run_cli(dir.path(), &["account", "show"]);
    assert_eq!(output.2, 0, "account show failed: {}", output.1);
    assert!(output.0.contains("\"crm_id\": 555"));
}

#[test]
fn test_report_without_linked_account() {
    let dir = TempDir::new().expect("tempdir");
    run_cli(dir.path(), &["timer", "new", "design"]);

    let output = run_cli(dir.path(), &["report"]);
    assert_eq!(output.2, 0, "report should not hard-fail: {}", output.1);
    assert!(output.0.contains("No linked account."));
}

#[test]
fn test_auth_status_on_fresh_install() {
    let dir = TempDir::new().expect("tempdir");
    let output = run_cli(dir.path(), &["auth", "status"]);
    assert_eq!(output.2, 0, "auth status failed: {}", output.1);
    assert!(output.0.contains("Portal not configured."));
}
