mod common;

use common::{DoseWatchProcess, compliant_recording, small_window_config};
use serde_json::Value;

fn stdout_lines(output: &std::process::Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("stdout line should be JSON"))
        .collect()
}

// ============================================================================
// defaults / validate
// ============================================================================

#[test]
fn defaults_output_validates() {
    let output = DoseWatchProcess::spawn_command(&["defaults"]);
    assert!(output.status.success());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("defaults.yaml");
    std::fs::write(&path, &output.stdout).unwrap();

    let output =
        DoseWatchProcess::spawn_command(&["validate", "--strict", DoseWatchProcess::arg(&path)]);
    assert!(
        output.status.success(),
        "defaults should validate strictly: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains(": ok"));
}

#[test]
fn invalid_config_exits_with_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "timing:\n  frame_rate: 0\n").unwrap();

    let output = DoseWatchProcess::spawn_command(&["validate", DoseWatchProcess::arg(&path)]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("timing.frame_rate"), "{stderr}");
}

// ============================================================================
// demo
// ============================================================================

#[test]
fn demo_prints_passing_verdict() {
    let output = DoseWatchProcess::spawn_command(&["--quiet", "demo", "--patient", "cli-demo"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["patient_id"], "cli-demo");
    assert_eq!(lines[0]["frame_count"], 173);
    assert_eq!(lines[0]["final_status"]["status"], "VERIFIED_PASS");
}

// ============================================================================
// run
// ============================================================================

#[test]
fn run_replays_recorded_frames() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, small_window_config(3)).unwrap();
    let frames = dir.path().join("frames.jsonl");
    std::fs::write(&frames, compliant_recording(3).join("\n")).unwrap();
    let audit = dir.path().join("audit/verdicts.jsonl");

    let output = DoseWatchProcess::spawn_command(&[
        "--quiet",
        "run",
        "--config",
        DoseWatchProcess::arg(&config),
        "--patient",
        "p-42",
        "--audit-file",
        DoseWatchProcess::arg(&audit),
        DoseWatchProcess::arg(&frames),
    ]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let verdicts = stdout_lines(&output);
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0]["patient_id"], "p-42");
    assert_eq!(verdicts[0]["final_status"]["status"], "VERIFIED_PASS");
    assert_eq!(verdicts[0]["final_phase"], 6);

    let records = std::fs::read_to_string(&audit).unwrap();
    let record: Value = serde_json::from_str(records.lines().next().unwrap()).unwrap();
    assert_eq!(record["session_id"], verdicts[0]["session_id"]);
    assert_eq!(record["model_ids"][0], "recorded");
}

#[test]
fn run_with_missing_file_fails() {
    let output = DoseWatchProcess::spawn_command(&["--quiet", "run", "/nonexistent/frames.jsonl"]);
    assert_eq!(output.status.code(), Some(3));
}
