//! Session outcome records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{FailureReason, Phase, ResultStatus};

use super::SessionId;

/// Final, immutable outcome of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Session id
    pub session_id: SessionId,
    /// Patient the session belonged to
    pub patient_id: String,
    /// Terminal status
    pub final_status: ResultStatus,
    /// Phase reached when the session ended
    pub final_phase: Phase,
    /// Frames processed while running
    pub frame_count: u64,
    /// `frame_count` divided by the nominal frame rate
    pub duration_estimate_secs: f64,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub ended_at: DateTime<Utc>,
}

impl Verdict {
    /// `true` for a verified pass.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.final_status == ResultStatus::VerifiedPass
    }
}

/// Estimated session duration from a frame count.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn duration_estimate_secs(frame_count: u64, frame_rate: f64) -> f64 {
    if frame_rate > 0.0 {
        frame_count as f64 / frame_rate
    } else {
        0.0
    }
}

/// Row persisted by audit sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the verdict was reached
    pub timestamp: DateTime<Utc>,
    /// Session id
    pub session_id: SessionId,
    /// Patient id
    pub patient_id: String,
    /// Terminal status
    pub final_status: ResultStatus,
    /// Failure reason, for fatal failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    /// Phase at the end
    pub phase_at_end: Phase,
    /// Frames processed
    pub frame_count: u64,
    /// Approximate duration in seconds
    pub duration_estimate_secs: f64,
    /// Detector and tracker identifiers
    #[serde(default)]
    pub model_ids: Vec<String>,
}

impl AuditRecord {
    /// Builds the audit row for a verdict.
    #[must_use]
    pub fn from_verdict(verdict: &Verdict, model_ids: &[String]) -> Self {
        Self {
            timestamp: verdict.ended_at,
            session_id: verdict.session_id,
            patient_id: verdict.patient_id.clone(),
            final_status: verdict.final_status,
            failure_reason: verdict.final_status.failure_reason(),
            phase_at_end: verdict.final_phase,
            frame_count: verdict.frame_count,
            duration_estimate_secs: verdict.duration_estimate_secs,
            model_ids: model_ids.to_vec(),
        }
    }
}
