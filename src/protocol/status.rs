//! Session result status.

use serde::{Deserialize, Serialize};

/// Why a session ended in fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Face lost for the whole grace window once the pill was in the mouth
    MouthCovered,
    /// Pill seen on the tongue again after the mouth was closed
    PillReappeared,
    /// No frames arrived for the configured idle timeout
    Abandoned,
}

impl FailureReason {
    /// Stable reason string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MouthCovered => "mouth_covered",
            Self::PillReappeared => "pill_reappeared",
            Self::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a session.
///
/// Every variant except [`Running`](Self::Running) is terminal, and a
/// terminal status is never replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    /// Protocol still in progress
    #[default]
    Running,
    /// Ingestion verified
    VerifiedPass,
    /// Protocol failed with evidence of concealment or loss of view
    FatalFailure(FailureReason),
    /// Session stopped on request
    UserQuit,
}

impl ResultStatus {
    /// `true` for every status except `Running`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Status name without the failure reason, for metric labels.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::VerifiedPass => "verified_pass",
            Self::FatalFailure(_) => "fatal_failure",
            Self::UserQuit => "user_quit",
        }
    }

    /// The failure reason, if this is a fatal failure.
    #[must_use]
    pub const fn failure_reason(self) -> Option<FailureReason> {
        match self {
            Self::FatalFailure(reason) => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("RUNNING"),
            Self::VerifiedPass => f.write_str("VERIFIED_PASS"),
            Self::FatalFailure(reason) => write!(f, "FATAL_FAILURE({reason})"),
            Self::UserQuit => f.write_str("USER_QUIT"),
        }
    }
}
