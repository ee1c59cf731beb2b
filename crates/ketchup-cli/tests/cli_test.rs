//! Integration tests for the `ketchup` binary.
//!
//! Each test runs the compiled binary with an isolated `XDG_CONFIG_HOME` and a
//! scrubbed `KETCHUP_*` environment. Generation tests point the model at a
//! closed local port, so they exercise the fallback path without a server.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const KETCHUP_VARS: &[&str] = &[
    "KETCHUP_MODEL_BASE_URL",
    "KETCHUP_MODEL",
    "KETCHUP_MODEL_API_KEY",
    "KETCHUP_MAPS_API_KEY",
    "KETCHUP_PLANNER_FALLBACK",
    "KETCHUP_MAX_TOOL_ROUNDS",
    "KETCHUP_DEFAULT_LOCATION",
];

/// Helper: a `ketchup` command with config isolated under `config_home`.
fn ketchup(config_home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ketchup"));
    for var in KETCHUP_VARS {
        cmd.env_remove(var);
    }
    cmd.env("XDG_CONFIG_HOME", config_home).env("RUST_LOG", "warn");
    cmd
}

/// Helper: run and capture, panicking if the process cannot start.
fn run(cmd: &mut Command) -> Output {
    cmd.output()
        .unwrap_or_else(|e| panic!("failed to run ketchup: {e}"))
}

/// Helper: a base URL on which nothing is listening.
fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{addr}/v1")
}

/// Helper: write a two-member group context and return its path.
fn write_context(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("group.json");
    let context = serde_json::json!({
        "group": {"name": "Thursday Crew"},
        "members": [
            {"name": "Ana", "default_location": "Cambridge, MA", "activity_likes": ["bowling"]},
            {"email": "bo@x.io"}
        ],
        "recent_events": [{"title": "Karaoke", "event_date": "2026-09-01T23:00:00Z"}]
    });
    std::fs::write(&path, context.to_string()).expect("write context");
    path
}

#[test]
fn completions_prints_script() {
    let tmp = TempDir::new().expect("tempdir");
    let output = run(ketchup(tmp.path()).args(["completions", "bash"]));
    assert!(output.status.success());
    let script = String::from_utf8_lossy(&output.stdout);
    assert!(script.contains("ketchup"), "unexpected script: {script}");
}

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let tmp = TempDir::new().expect("tempdir");

    let output = run(ketchup(tmp.path()).args([
        "--base-url",
        "http://gpu:9000/v1",
        "init",
        "--maps-api-key",
        "secret",
    ]));
    assert!(output.status.success(), "init failed: {output:?}");

    let path = tmp.path().join("ketchup").join("config.toml");
    let contents = std::fs::read_to_string(&path).expect("config should exist");
    assert!(contents.contains("base_url = \"http://gpu:9000/v1\""), "{contents}");
    assert!(contents.contains("api_key = \"secret\""), "{contents}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("secret"));

    let again = run(ketchup(tmp.path()).arg("init"));
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));

    let forced = run(ketchup(tmp.path()).args(["init", "--force"]));
    assert!(forced.status.success());
}

#[test]
fn generate_falls_back_to_templates_when_model_is_down() {
    let tmp = TempDir::new().expect("tempdir");
    let context = write_context(tmp.path());
    let out_file = tmp.path().join("plans.json");

    let output = run(ketchup(tmp.path())
        .args(["--base-url", &closed_endpoint(), "generate", "--context"])
        .arg(&context)
        .args(["--notes", "somewhere indoors", "--output"])
        .arg(&out_file));
    assert!(output.status.success(), "generate failed: {output:?}");

    let written = std::fs::read_to_string(&out_file).expect("plans file");
    let value: Value = serde_json::from_str(&written).expect("plans JSON");
    let plans = value["plans"].as_array().expect("plans array");
    assert_eq!(plans.len(), 5);
    let vibes: Vec<&str> = plans.iter().filter_map(|p| p["vibe_type"].as_str()).collect();
    assert_eq!(vibes, ["anchor", "pivot", "reach", "chill", "wildcard"]);
    assert!(plans.iter().all(|p| p["logistics"]["source"] == "fallback"));
    assert!(plans.iter().all(|p| p["location"] == "Cambridge, MA"));
    assert_eq!(plans[0]["logistics"]["refinement_notes"], "somewhere indoors");
    assert_eq!(value["fallback"]["source"], "fallback");
}

#[test]
fn generate_without_fallback_fails() {
    let tmp = TempDir::new().expect("tempdir");
    let context = write_context(tmp.path());

    let output = run(ketchup(tmp.path())
        .args(["--base-url", &closed_endpoint(), "generate", "--no-fallback", "--context"])
        .arg(&context));
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("plan generation failed"), "stderr: {stderr}");
}

#[test]
fn generate_reports_missing_context_file() {
    let tmp = TempDir::new().expect("tempdir");
    let output = run(ketchup(tmp.path()).args(["generate", "--context", "/nonexistent/group.json"]));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read group context"), "stderr: {stderr}");
}

#[test]
fn ping_reports_unreachable_endpoint() {
    let tmp = TempDir::new().expect("tempdir");
    let output = run(ketchup(tmp.path()).args(["--base-url", &closed_endpoint(), "ping"]));
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not reachable"), "stderr: {stderr}");
}
