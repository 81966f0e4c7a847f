//! Structured session event stream.
//!
//! Discrete, typed events emitted by the session manager. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::protocol::{Phase, ResultStatus, Warning};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Which guardrail fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailKind {
    /// Phase 4 reopened with no pill visible
    MedicationMissing,
    /// Phase 4 closure interrupted
    MouthOpenedEarly,
    /// Face lost for the whole grace window
    FaceLost,
    /// Pill seen again in phase 5
    PillReappeared,
}

impl GuardrailKind {
    /// Stable label, also used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MedicationMissing => "medication_missing",
            Self::MouthOpenedEarly => "mouth_opened_early",
            Self::FaceLost => "face_lost",
            Self::PillReappeared => "pill_reappeared",
        }
    }

    /// `true` when the guardrail ended the session.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::FaceLost | Self::PillReappeared)
    }
}

impl From<Warning> for GuardrailKind {
    fn from(warning: Warning) -> Self {
        match warning {
            Warning::MedicationMissing => Self::MedicationMissing,
            Warning::MouthOpenedEarly => Self::MouthOpenedEarly,
        }
    }
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during session processing.
///
/// Tagged with `"type"` when serialized so consumers can dispatch on the
/// event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A session was started at phase 1.
    SessionStarted {
        /// When the session started.
        timestamp: DateTime<Utc>,
        /// Session id.
        session_id: String,
        /// Patient the session belongs to.
        patient_id: String,
    },

    /// A session moved to the next phase.
    PhaseAdvanced {
        /// When the transition happened.
        timestamp: DateTime<Utc>,
        /// Session id.
        session_id: String,
        /// Phase left.
        from_phase: Phase,
        /// Phase entered.
        to_phase: Phase,
        /// Frame on which the transition happened.
        frame: u64,
    },

    /// A guardrail reset progress or ended the session.
    GuardrailTriggered {
        /// When the guardrail fired.
        timestamp: DateTime<Utc>,
        /// Session id.
        session_id: String,
        /// Guardrail kind.
        kind: GuardrailKind,
        /// Phase during which it fired.
        phase: Phase,
        /// Whether the session ended.
        fatal: bool,
    },

    /// A session reached a terminal status.
    SessionEnded {
        /// When the session ended.
        timestamp: DateTime<Utc>,
        /// Session id.
        session_id: String,
        /// Patient the session belonged to.
        patient_id: String,
        /// Terminal status.
        final_status: ResultStatus,
        /// Phase at the end.
        final_phase: Phase,
        /// Frames processed.
        frame_count: u64,
    },

    /// An operation was rejected.
    FrameRejected {
        /// When the operation was rejected.
        timestamp: DateTime<Utc>,
        /// Session id the caller addressed.
        session_id: String,
        /// Why it was rejected.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) increments the sequence counter,
/// serializes the event as one JSON line and flushes. Serialization or I/O
/// failures are dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that appends to the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Flushes the underlying writer.
    pub fn flush(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
