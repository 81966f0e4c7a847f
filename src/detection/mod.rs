//! Detection adapters
//!
//! Adapters turn whatever a frame source produces into a well-formed
//! [`Observation`]. They never fail: inference or decoding problems are
//! logged and yield an observation with nothing detected and no face.
//!
//! - [`ModelAdapter`] wraps a shared [`ObjectDetector`] and a per-session
//!   [`LandmarkTracker`]
//! - [`RecordedAdapter`] replays JSON-encoded [`RawFrame`]s
//! - [`MockAdapter`] returns compliant observations for a given phase

pub mod mock;
pub mod model;
pub mod raw;
pub mod recorded;

pub use mock::MockAdapter;
pub use model::{Frame, LandmarkTracker, ModelAdapter, ObjectDetector};
pub use raw::{LipLandmarks, RawDetection, RawFrame, normalize};
pub use recorded::RecordedAdapter;

use crate::observation::Observation;

/// Turns one input frame into an [`Observation`].
///
/// Implementations must not panic or block indefinitely, and must return a
/// valid observation for every frame.
pub trait DetectionAdapter {
    /// Input consumed per frame.
    type Frame: ?Sized;

    /// Produces the observation for `frame`.
    fn observe(&mut self, frame: &Self::Frame) -> Observation;
}
