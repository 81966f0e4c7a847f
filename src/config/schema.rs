//! Configuration schema types
//!
//! Every tunable of the verification protocol lives here. All sections and
//! fields default, so an empty YAML mapping is a complete configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Root
// ============================================================================

/// Root configuration shared read-only by every session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Per-class confidence thresholds
    pub thresholds: Thresholds,

    /// Jaw-distance thresholds in pixels
    pub jaw: JawThresholds,

    /// Stability and guardrail windows
    pub windows: Windows,

    /// Frame pacing
    pub timing: Timing,

    /// Session manager policy
    pub session: SessionPolicy,

    /// Detection adapter settings
    pub detection: DetectionSettings,
}

/// Top-level section names, used for unknown-key detection.
pub const ROOT_KEYS: &[&str] = &["thresholds", "jaw", "windows", "timing", "session", "detection"];

// ============================================================================
// Thresholds
// ============================================================================

/// Per-class confidence thresholds.
///
/// `*_min` values are inclusive lower bounds, `*_max` values are exclusive
/// upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Pill confidence that completes phase 1
    pub pill_p1_min: f32,
    /// Pill-on-tongue confidence that qualifies a phase 3 frame; also the
    /// reappearance bar in phases 4 and 5
    pub pill_p3_min: f32,
    /// Tongue-without-pill confidence for phases 2, 5 and 6
    pub tongue_min: f32,
    /// Tongue-without-pill must stay under this while the mouth is closed
    pub tongue_p4_max: f32,
    /// Pill must stay under this during the swallow check
    pub pill_p6_max: f32,
    /// Hand confidence used for phase 1 feedback
    pub hand_min: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pill_p1_min: 0.8,
            pill_p3_min: 0.4,
            tongue_min: 0.5,
            tongue_p4_max: 0.2,
            pill_p6_max: 0.1,
            hand_min: 0.75,
        }
    }
}

/// Keys accepted under `thresholds`.
pub const THRESHOLD_KEYS: &[&str] = &[
    "pill_p1_min",
    "pill_p3_min",
    "tongue_min",
    "tongue_p4_max",
    "pill_p6_max",
    "hand_min",
];

/// Jaw-distance thresholds in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JawThresholds {
    /// Jaw distance strictly above this counts as mouth open wide
    pub mouth_open_threshold: f32,
    /// Jaw distance strictly below this counts as mouth closed
    pub mouth_closure_threshold: f32,
}

impl Default for JawThresholds {
    fn default() -> Self {
        Self {
            mouth_open_threshold: 20.0,
            mouth_closure_threshold: 5.0,
        }
    }
}

/// Keys accepted under `jaw`.
pub const JAW_KEYS: &[&str] = &["mouth_open_threshold", "mouth_closure_threshold"];

// ============================================================================
// Windows
// ============================================================================

/// Size of a frame-count window.
///
/// Either a plain frame count or a duration string (`"2s"`, `"500ms"`)
/// converted with the configured frame rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSize {
    /// Exact number of frames
    Frames(u32),
    /// Wall-clock duration, converted via frame rate
    Duration(String),
}

impl WindowSize {
    /// Resolves the window to a frame count at `frame_rate` frames/second.
    ///
    /// Durations round up and never resolve below one frame.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the duration string does
    /// not parse or the frame rate is not positive.
    pub fn to_frames(&self, frame_rate: f64) -> Result<u32, String> {
        match self {
            Self::Frames(n) => Ok(*n),
            Self::Duration(text) => {
                let duration = humantime::parse_duration(text.trim())
                    .map_err(|e| format!("invalid duration '{text}': {e}"))?;
                frames_for(duration, frame_rate)
            }
        }
    }
}

impl From<u32> for WindowSize {
    fn from(frames: u32) -> Self {
        Self::Frames(frames)
    }
}

impl std::fmt::Display for WindowSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frames(n) => write!(f, "{n} frames"),
            Self::Duration(d) => f.write_str(d),
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn frames_for(duration: Duration, frame_rate: f64) -> Result<u32, String> {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Err(format!("frame rate must be positive, got {frame_rate}"));
    }
    let frames = (duration.as_secs_f64() * frame_rate).ceil();
    if frames > f64::from(u32::MAX) {
        return Err(format!("duration {duration:?} is too long"));
    }
    Ok((frames as u32).max(1))
}

/// Stability and guardrail windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Windows {
    /// Consecutive pill-on-tongue frames required in phase 3
    pub pill_stationary: WindowSize,
    /// Consecutive closed-mouth frames required in phase 4
    pub concealment: WindowSize,
    /// Consecutive swallow-confirmed frames required in phase 6
    pub final_confirmation: WindowSize,
    /// Consecutive face-absent frames tolerated from phase 4 on
    pub face_loss_grace: WindowSize,
    /// Session-opening frames during which the face guardrail is inert
    pub face_guardrail_warmup: WindowSize,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            pill_stationary: WindowSize::Frames(60),
            concealment: WindowSize::Frames(50),
            final_confirmation: WindowSize::Frames(60),
            face_loss_grace: WindowSize::Frames(60),
            face_guardrail_warmup: WindowSize::Frames(0),
        }
    }
}

/// Keys accepted under `windows`.
pub const WINDOW_KEYS: &[&str] = &[
    "pill_stationary",
    "concealment",
    "final_confirmation",
    "face_loss_grace",
    "face_guardrail_warmup",
];

// ============================================================================
// Timing / Session / Detection
// ============================================================================

/// Frame pacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Nominal input frame rate in frames per second
    pub frame_rate: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self { frame_rate: 30.0 }
    }
}

/// Keys accepted under `timing`.
pub const TIMING_KEYS: &[&str] = &["frame_rate"];

/// Session manager policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Wall-clock inactivity after which a live session is abandoned
    pub idle_timeout: String,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_timeout: "5m".to_owned(),
        }
    }
}

impl SessionPolicy {
    /// Parses `idle_timeout`.
    ///
    /// # Errors
    ///
    /// Returns the parser message when the string is not a duration.
    pub fn idle_timeout(&self) -> Result<Duration, String> {
        humantime::parse_duration(self.idle_timeout.trim())
            .map_err(|e| format!("invalid duration '{}': {e}", self.idle_timeout))
    }
}

/// Keys accepted under `session`.
pub const SESSION_KEYS: &[&str] = &["idle_timeout"];

/// Detection adapter settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Raw detections under this confidence are discarded
    pub min_confidence: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.1,
        }
    }
}

/// Keys accepted under `detection`.
pub const DETECTION_KEYS: &[&str] = &["min_confidence"];

/// Returns the accepted keys for a top-level section.
#[must_use]
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    match section {
        "thresholds" => Some(THRESHOLD_KEYS),
        "jaw" => Some(JAW_KEYS),
        "windows" => Some(WINDOW_KEYS),
        "timing" => Some(TIMING_KEYS),
        "session" => Some(SESSION_KEYS),
        "detection" => Some(DETECTION_KEYS),
        _ => None,
    }
}
