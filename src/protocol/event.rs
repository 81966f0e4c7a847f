//! Per-frame output of the protocol engine.

use serde::{Deserialize, Serialize};

use crate::observation::Point;
use crate::protocol::{Phase, ResultStatus};

/// Non-fatal warning raised on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// Mouth reopened wide during phase 4 with no pill on the tongue
    MedicationMissing,
    /// Phase 4 progress lost to a frame that was not fully closed
    MouthOpenedEarly,
}

impl Warning {
    /// Text shown alongside the status line.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MedicationMissing => "MEDICATION MISSING (Resetting phase 4)",
            Self::MouthOpenedEarly => "Mouth opened too early!",
        }
    }
}

/// A phase advance that happened on this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Phase left
    pub from_phase: Phase,
    /// Phase entered
    pub to_phase: Phase,
}

/// Counter values after the frame was applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CountersSnapshot {
    /// Frames processed by the engine
    pub frame_count: u64,
    /// Consecutive qualifying phase 3 frames
    pub pill_window: usize,
    /// Phase 3 target
    pub pill_window_target: u32,
    /// Latest pill-on-tongue centroid in the window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pill_centroid: Option<Point>,
    /// Consecutive closed-mouth phase 4 frames
    pub phase4_counter: u32,
    /// Phase 4 target
    pub concealment_target: u32,
    /// Consecutive swallow-confirmed phase 6 frames
    pub final_confirm_counter: u32,
    /// Phase 6 target
    pub final_confirmation_target: u32,
    /// Consecutive face-absent frames
    pub face_loss_counter: u32,
    /// Face-loss grace window
    pub face_loss_grace: u32,
}

/// Result of feeding one observation to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEvent {
    /// Current phase after the frame
    pub phase: Phase,
    /// Status after the frame
    pub result_status: ResultStatus,
    /// Short status line (progress, success or failure)
    pub status_text: String,
    /// Prompt and feedback for the patient
    pub message: String,
    /// Non-fatal warning raised on this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Warning>,
    /// Phase advance performed on this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<PhaseTransition>,
    /// Jaw distance the frame was evaluated with
    pub jaw_distance: f32,
    /// Counter values after the frame
    pub counters: CountersSnapshot,
}

impl PhaseEvent {
    /// `true` when the session is finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.result_status.is_terminal()
    }
}
