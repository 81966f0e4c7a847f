//! Replay of recorded perception output.
//!
//! Each frame is one JSON line holding a serialized [`RawFrame`].

use tracing::warn;

use crate::observation::Observation;

use super::DetectionAdapter;
use super::raw::{RawFrame, normalize};

/// Adapter that decodes JSON lines into observations.
#[derive(Debug, Clone)]
pub struct RecordedAdapter {
    min_confidence: f32,
    decoded: u64,
    malformed: u64,
}

impl RecordedAdapter {
    /// Creates an adapter applying the given detection floor.
    #[must_use]
    pub const fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence,
            decoded: 0,
            malformed: 0,
        }
    }

    /// Lines that decoded cleanly.
    #[must_use]
    pub const fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Lines that failed to decode and were replaced by absence.
    #[must_use]
    pub const fn malformed(&self) -> u64 {
        self.malformed
    }
}

impl DetectionAdapter for RecordedAdapter {
    type Frame = str;

    fn observe(&mut self, line: &str) -> Observation {
        match serde_json::from_str::<RawFrame>(line) {
            Ok(raw) => {
                self.decoded += 1;
                normalize(&raw, self.min_confidence)
            }
            Err(e) => {
                self.malformed += 1;
                warn!(error = %e, "malformed recorded frame, treating as empty");
                Observation::absent()
            }
        }
    }
}
