//! Six-phase ingestion verification state machine.
//!
//! The [`ProtocolEngine`] consumes one [`Observation`](crate::observation::Observation)
//! per frame and reports a [`PhaseEvent`]. It has no knowledge of cameras,
//! models or sessions; those live in [`crate::detection`] and
//! [`crate::session`].

pub mod engine;
pub mod event;
pub mod phase;
pub mod status;
pub mod window;

pub use engine::{EngineSettings, ProtocolEngine};
pub use event::{CountersSnapshot, PhaseEvent, PhaseTransition, Warning};
pub use phase::Phase;
pub use status::{FailureReason, ResultStatus};
pub use window::StabilityWindow;
