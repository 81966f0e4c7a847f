//! Phase-scripted test double.

use crate::observation::{Detection, DetectionClass, Observation, Rect};
use crate::protocol::Phase;

use super::DetectionAdapter;

/// Adapter that returns a canned, compliant observation for the phase it
/// is asked about.
///
/// Feeding it the engine's current phase each frame walks a session to
/// `VERIFIED_PASS`. Used by the `demo` command and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockAdapter;

impl MockAdapter {
    /// Creates the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DetectionAdapter for MockAdapter {
    type Frame = Phase;

    fn observe(&mut self, phase: &Phase) -> Observation {
        let face = Observation::absent().with_face(true);
        let open_tongue = face
            .with_detection(
                DetectionClass::TongueNoPill,
                Detection::with_bbox(0.9, Rect::new(350.0, 450.0, 110.0, 55.0)),
            )
            .with_jaw(30.0);
        match phase {
            Phase::ShowPill => face.with_detection(
                DetectionClass::Pill,
                Detection::with_bbox(0.95, Rect::new(100.0, 100.0, 20.0, 20.0)),
            ),
            Phase::OpenMouth | Phase::Reopen | Phase::SwallowCheck => open_tongue,
            Phase::PlaceOnTongue => face
                .with_detection(
                    DetectionClass::PillOnTongue,
                    Detection::with_bbox(0.9, Rect::new(450.0, 500.0, 15.0, 15.0)),
                )
                .with_jaw(30.0),
            Phase::CloseMouth => face.with_jaw(2.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ProtocolEngine, ResultStatus};

    #[test]
    fn drives_engine_to_pass() {
        let mut engine = ProtocolEngine::default();
        let mut adapter = MockAdapter::new();
        for _ in 0..1_000 {
            let obs = adapter.observe(&engine.phase());
            if engine.process_frame(&obs).is_terminal() {
                break;
            }
        }
        assert_eq!(engine.status(), ResultStatus::VerifiedPass);
        assert_eq!(engine.phase(), Phase::SwallowCheck);
        // 1 + 1 + 60 + 50 + 1 + 60
        assert_eq!(engine.frame_count(), 173);
    }
}
