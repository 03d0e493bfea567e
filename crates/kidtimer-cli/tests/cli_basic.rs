//! Basic CLI E2E tests.
//!
//! Each test gets its own HOME so config and snapshots land in a temp dir.

use std::path::Path;
use std::process::Command;

const EMMA: &str = "6f1c2a9e-3b7d-4c1e-9a52-0d8e4f6b7a10";
const READING: &str = "0b5e7d21-8c4a-4f3b-a1d6-92e3c4b5f678";

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_kidtimer"))
        .args(args)
        .env("HOME", home)
        .env("KIDTIMER_ENV", "dev")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn with_family(home: &Path) {
    let children = format!(r#"[{{"id":"{EMMA}","name":"Emma","age":7}}]"#);
    let categories =
        format!(r#"[{{"id":"{READING}","name":"Reading","icon":"book","recommended_minutes":20}}]"#);
    run_ok(home, &["config", "set", "children", &children]);
    run_ok(home, &["config", "set", "categories", &categories]);
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_presets_list() {
    let home = tempfile::tempdir().unwrap();
    let presets = json(&run_ok(home.path(), &["presets"]));
    assert_eq!(presets.as_array().unwrap().len(), 7);

    let for_five = json(&run_ok(home.path(), &["presets", "--age", "5"]));
    assert!(for_five
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p["min_age"].as_u64().unwrap() <= 5 && p["max_age"].as_u64().unwrap() >= 5));
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(run_ok(home.path(), &["config", "get", "timer.tick_interval_ms"]).trim(), "1000");
    run_ok(home.path(), &["config", "set", "timer.tick_interval_ms", "500"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "timer.tick_interval_ms"]).trim(), "500");

    let (_, _, code) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_status_empty() {
    let home = tempfile::tempdir().unwrap();
    let states = json(&run_ok(home.path(), &["timer", "status"]));
    assert_eq!(states, serde_json::json!([]));
}

#[test]
fn test_unknown_child_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["timer", "start", "Nobody", "Reading"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown child"));
}

#[test]
fn test_timer_lifecycle_across_launches() {
    let home = tempfile::tempdir().unwrap();
    with_family(home.path());

    let started = json(&run_ok(home.path(), &["timer", "start", "emma", "reading"]));
    assert_eq!(started["state"], "running");
    assert_eq!(started["child_id"], EMMA);

    let paused = json(&run_ok(home.path(), &["timer", "pause", "Emma"]));
    assert_eq!(paused["state"], "paused");
    let remaining = paused["remaining_ms"].as_u64().unwrap();
    assert!(remaining <= 20 * 60_000);

    // A separate process sees the same frozen remaining time.
    let status = json(&run_ok(home.path(), &["timer", "status", "Emma"]));
    assert_eq!(status["state"], "paused");
    assert_eq!(status["remaining_ms"].as_u64().unwrap(), remaining);

    let (_, _, code) = run_cli(home.path(), &["timer", "pause", "Emma"]);
    assert_ne!(code, 0, "pausing twice should be rejected");

    json(&run_ok(home.path(), &["timer", "resume", "Emma"]));
    let added = json(&run_ok(home.path(), &["timer", "add", "Emma", "-5"]));
    assert_eq!(added["state"], "running");

    let stopped = json(&run_ok(home.path(), &["timer", "stop", "Emma"]));
    assert_eq!(stopped["state"], "idle");
    // Stopping with nothing running is fine.
    run_ok(home.path(), &["timer", "stop", "Emma"]);
}

#[test]
fn test_pending_start_round_trip() {
    let home = tempfile::tempdir().unwrap();
    with_family(home.path());

    run_ok(home.path(), &["timer", "queue-start", "Emma", "Reading"]);
    let pending = json(&run_ok(home.path(), &["timer", "consume-start"]));
    assert_eq!(pending["child_id"], EMMA);
    assert_eq!(pending["category_id"], READING);
    assert_eq!(run_ok(home.path(), &["timer", "consume-start"]).trim(), "null");
}

#[test]
fn test_default_duration_applies_without_recommendation() {
    let home = tempfile::tempdir().unwrap();
    let children = format!(r#"[{{"id":"{EMMA}","name":"Emma"}}]"#);
    let categories = format!(r#"[{{"id":"{READING}","name":"Reading"}}]"#);
    run_ok(home.path(), &["config", "set", "children", &children]);
    run_ok(home.path(), &["config", "set", "categories", &categories]);
    run_ok(home.path(), &["config", "set", "timer.default_duration_min", "7"]);

    run_ok(home.path(), &["timer", "start", "Emma", "Reading"]);
    let paused = json(&run_ok(home.path(), &["timer", "pause", "Emma"]));
    let remaining = paused["remaining_ms"].as_u64().unwrap();
    assert!(remaining <= 7 * 60_000 && remaining > 6 * 60_000, "{remaining}");
}

#[test]
fn test_unknown_visualization_lists_choices() {
    let home = tempfile::tempdir().unwrap();
    with_family(home.path());
    run_ok(home.path(), &["timer", "start", "Emma", "Reading"]);

    let (_, stderr, code) = run_cli(home.path(), &["timer", "visual", "Emma", "lava"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("circular, bar, analog, space, ocean, pomodoro"), "{stderr}");
}
