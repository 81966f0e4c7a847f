//! Shared integration-test helpers: observation builders, scripted
//! protocol runs and a harness for invoking the `dosewatch` binary.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use dosewatch::detection::{LipLandmarks, RawDetection, RawFrame};
use dosewatch::observation::{Detection, DetectionClass, Observation, Rect};
use dosewatch::protocol::{EngineSettings, PhaseEvent, ProtocolEngine};

// ============================================================================
// Observations
// ============================================================================

/// Face visible, nothing detected, mouth closed.
pub fn face() -> Observation {
    Observation::absent().with_face(true)
}

/// Satisfies phase 1.
pub fn pill_shown() -> Observation {
    face().with_confidence(DetectionClass::Pill, 0.95)
}

/// Satisfies phases 2, 5 and 6.
pub fn mouth_open() -> Observation {
    face()
        .with_confidence(DetectionClass::TongueNoPill, 0.9)
        .with_jaw(30.0)
}

/// Satisfies phase 3.
pub fn pill_on_tongue() -> Observation {
    face()
        .with_detection(
            DetectionClass::PillOnTongue,
            Detection::with_bbox(0.9, Rect::new(320.0, 260.0, 12.0, 8.0)),
        )
        .with_jaw(30.0)
}

/// Satisfies phase 4.
pub fn mouth_closed() -> Observation {
    face().with_jaw(1.0)
}

/// Face lost, everything else absent.
pub fn face_hidden() -> Observation {
    Observation::absent().with_jaw(30.0)
}

// ============================================================================
// Scripted runs
// ============================================================================

/// Feeds `obs` `count` times and returns the last event.
pub fn feed(engine: &mut ProtocolEngine, obs: &Observation, count: u32) -> Option<PhaseEvent> {
    (0..count).map(|_| engine.process_frame(obs)).last()
}

/// Drives a fresh engine through phases 1 to 4 so it is waiting at phase 5.
pub fn engine_at_reopen(settings: EngineSettings) -> ProtocolEngine {
    let mut engine = ProtocolEngine::new(settings);
    feed(&mut engine, &pill_shown(), 1);
    feed(&mut engine, &mouth_open(), 1);
    feed(&mut engine, &pill_on_tongue(), settings.pill_stationary_frames);
    feed(&mut engine, &mouth_closed(), settings.concealment_frames);
    engine
}

/// Drives a fresh engine through phases 1 to 3 so it is waiting at phase 4.
pub fn engine_at_close(settings: EngineSettings) -> ProtocolEngine {
    let mut engine = ProtocolEngine::new(settings);
    feed(&mut engine, &pill_shown(), 1);
    feed(&mut engine, &mouth_open(), 1);
    feed(&mut engine, &pill_on_tongue(), settings.pill_stationary_frames);
    engine
}

// ============================================================================
// Recorded frames
// ============================================================================

const FRAME_HEIGHT: f32 = 480.0;

fn raw_line(detections: Vec<RawDetection>, mouth_open: bool) -> String {
    let gap = if mouth_open { 0.1 } else { 0.0 };
    let frame = RawFrame {
        detections,
        landmarks: Some(LipLandmarks {
            upper_lip_y: 0.5,
            lower_lip_y: 0.5 + gap,
        }),
        frame_height: FRAME_HEIGHT,
    };
    serde_json::to_string(&frame).expect("raw frame serializes")
}

fn detected(label: &str) -> Vec<RawDetection> {
    vec![RawDetection::new(label, 0.9, [300.0, 250.0, 340.0, 270.0])]
}

/// Recorded frames for a compliant session with every window set to
/// `window` frames.
pub fn compliant_recording(window: usize) -> Vec<String> {
    let mut lines = vec![raw_line(detected("pill"), false)];
    lines.push(raw_line(detected("tongue-no-pill"), true));
    lines.extend(std::iter::repeat_n(raw_line(detected("pill-on-tongue"), true), window));
    lines.extend(std::iter::repeat_n(raw_line(Vec::new(), false), window));
    lines.push(raw_line(detected("tongue-no-pill"), true));
    lines.extend(std::iter::repeat_n(raw_line(detected("tongue-no-pill"), true), window));
    lines
}

/// YAML configuration with every stability window set to `window` frames.
pub fn small_window_config(window: usize) -> String {
    format!(
        "windows:\n  pill_stationary: {window}\n  concealment: {window}\n  final_confirmation: {window}\n"
    )
}

// ============================================================================
// Binary
// ============================================================================

/// Runs the `dosewatch` binary to completion.
pub struct DoseWatchProcess;

impl DoseWatchProcess {
    /// Runs `dosewatch` with `args` and captures its output.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_dosewatch"))
            .args(args)
            .env_remove("DOSEWATCH_LOG_LEVEL")
            .env_remove("DOSEWATCH_CONFIG")
            .env_remove("DOSEWATCH_AUDIT_FILE")
            .env_remove("DOSEWATCH_EVENTS_FILE")
            .output()
            .expect("failed to run dosewatch")
    }

    /// Path as a `&str` argument.
    #[allow(clippy::missing_panics_doc)]
    pub fn arg(path: &Path) -> &str {
        path.to_str().expect("non-UTF-8 path")
    }
}
