//! The six ordered steps of the ingestion ritual.

use serde::{Deserialize, Serialize};

/// One step of the verification protocol.
///
/// Serialized as its 1-based number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    /// Hold the pill up to the camera
    ShowPill = 1,
    /// Open the mouth wide with the tongue visible
    OpenMouth = 2,
    /// Place the pill on the tongue and hold it there
    PlaceOnTongue = 3,
    /// Close the mouth and keep it closed
    CloseMouth = 4,
    /// Reopen the mouth for inspection
    Reopen = 5,
    /// Show an empty tongue until the swallow is confirmed
    SwallowCheck = 6,
}

impl Phase {
    /// All phases in protocol order.
    pub const ALL: [Self; 6] = [
        Self::ShowPill,
        Self::OpenMouth,
        Self::PlaceOnTongue,
        Self::CloseMouth,
        Self::Reopen,
        Self::SwallowCheck,
    ];

    /// 1-based phase number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// The phase that follows this one, or `None` for the last phase.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::ShowPill => Some(Self::OpenMouth),
            Self::OpenMouth => Some(Self::PlaceOnTongue),
            Self::PlaceOnTongue => Some(Self::CloseMouth),
            Self::CloseMouth => Some(Self::Reopen),
            Self::Reopen => Some(Self::SwallowCheck),
            Self::SwallowCheck => None,
        }
    }

    /// Instruction shown to the patient during this phase.
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::ShowPill => "PHASE 1: Hold medication up",
            Self::OpenMouth => "PHASE 2: Open mouth WIDE",
            Self::PlaceOnTongue => "PHASE 3: Place pill on your tongue",
            Self::CloseMouth => "PHASE 4: Close mouth",
            Self::Reopen => "PHASE 5: Open mouth for check",
            Self::SwallowCheck => "PHASE 6: SWALLOW CHECK",
        }
    }

    /// Short machine-friendly name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ShowPill => "show_pill",
            Self::OpenMouth => "open_mouth",
            Self::PlaceOnTongue => "place_on_tongue",
            Self::CloseMouth => "close_mouth",
            Self::Reopen => "reopen",
            Self::SwallowCheck => "swallow_check",
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase.number()
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|p| p.number() == n)
            .ok_or_else(|| format!("phase must be within 1..=6, got {n}"))
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}
