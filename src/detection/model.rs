//! Adapter over live perception models.
//!
//! The object detector is loaded once per process and shared read-only
//! between sessions. The landmark tracker keeps per-stream state, so each
//! session owns its own.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use crate::error::DetectorError;
use crate::observation::Observation;

use super::DetectionAdapter;
use super::raw::{LipLandmarks, RawDetection, RawFrame, normalize};

/// One decoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Packed pixel data
    pub pixels: Bytes,
}

/// Object detector producing labelled boxes.
pub trait ObjectDetector: Send + Sync {
    /// Runs inference on one frame.
    ///
    /// # Errors
    ///
    /// Returns `DetectorError` when inference fails.
    fn detect(&self, frame: &Frame) -> Result<Vec<RawDetection>, DetectorError>;

    /// Identifier recorded in the audit trail.
    fn model_id(&self) -> &str;
}

/// Facial landmark tracker.
pub trait LandmarkTracker: Send {
    /// Locates the lips, returning `Ok(None)` when no face is found.
    ///
    /// # Errors
    ///
    /// Returns `DetectorError` when tracking fails.
    fn track(&mut self, frame: &Frame) -> Result<Option<LipLandmarks>, DetectorError>;

    /// Identifier recorded in the audit trail.
    fn model_id(&self) -> &str;
}

/// Detection adapter over a shared detector and a session-owned tracker.
///
/// Model failures are logged and degrade to absence for the affected part
/// of the frame.
pub struct ModelAdapter {
    detector: Arc<dyn ObjectDetector>,
    tracker: Box<dyn LandmarkTracker>,
    min_confidence: f32,
}

impl ModelAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(
        detector: Arc<dyn ObjectDetector>,
        tracker: Box<dyn LandmarkTracker>,
        min_confidence: f32,
    ) -> Self {
        Self {
            detector,
            tracker,
            min_confidence,
        }
    }

    /// Identifiers of the models behind this adapter.
    #[must_use]
    pub fn model_ids(&self) -> Vec<String> {
        vec![
            self.detector.model_id().to_string(),
            self.tracker.model_id().to_string(),
        ]
    }
}

impl std::fmt::Debug for ModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("detector", &self.detector.model_id())
            .field("tracker", &self.tracker.model_id())
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

impl DetectionAdapter for ModelAdapter {
    type Frame = Frame;

    fn observe(&mut self, frame: &Frame) -> Observation {
        let detections = self.detector.detect(frame).unwrap_or_else(|e| {
            warn!(model = self.detector.model_id(), error = %e, "object detection failed");
            Vec::new()
        });
        let landmarks = self.tracker.track(frame).unwrap_or_else(|e| {
            warn!(model = self.tracker.model_id(), error = %e, "landmark tracking failed");
            None
        });

        #[allow(clippy::cast_precision_loss)]
        let raw = RawFrame {
            detections,
            landmarks,
            frame_height: frame.height as f32,
        };
        normalize(&raw, self.min_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(Result<Vec<RawDetection>, DetectorError>);

    impl ObjectDetector for FixedDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<RawDetection>, DetectorError> {
            self.0.clone()
        }

        fn model_id(&self) -> &str {
            "fixed-detector"
        }
    }

    struct FixedTracker(Result<Option<LipLandmarks>, DetectorError>);

    impl LandmarkTracker for FixedTracker {
        fn track(&mut self, _frame: &Frame) -> Result<Option<LipLandmarks>, DetectorError> {
            self.0.clone()
        }

        fn model_id(&self) -> &str {
            "fixed-tracker"
        }
    }

    fn frame() -> Frame {
        Frame {
            width: 640,
            height: 400,
            pixels: Bytes::from_static(&[0; 16]),
        }
    }

    #[test]
    fn combines_detector_and_tracker() {
        let detector = Arc::new(FixedDetector(Ok(vec![RawDetection::new(
            "tongue-no-pill",
            0.9,
            [0.0, 0.0, 10.0, 10.0],
        )])));
        let tracker = Box::new(FixedTracker(Ok(Some(LipLandmarks {
            upper_lip_y: 0.5,
            lower_lip_y: 0.6,
        }))));
        let mut adapter = ModelAdapter::new(detector, tracker, 0.1);

        let obs = adapter.observe(&frame());
        assert!((obs.tongue_no_pill.confidence - 0.9).abs() < f32::EPSILON);
        assert!(obs.face_present);
        assert!((obs.jaw_distance - 40.0).abs() < 1e-3);
        assert_eq!(adapter.model_ids(), vec!["fixed-detector", "fixed-tracker"]);
    }

    #[test]
    fn failures_degrade_to_absence() {
        let detector = Arc::new(FixedDetector(Err(DetectorError::Inference("boom".into()))));
        let tracker = Box::new(FixedTracker(Err(DetectorError::Unavailable("gone".into()))));
        let mut adapter = ModelAdapter::new(detector, tracker, 0.1);
        assert_eq!(adapter.observe(&frame()), Observation::absent());
    }

    #[test]
    fn detector_is_shared_between_adapters() {
        let detector: Arc<dyn ObjectDetector> = Arc::new(FixedDetector(Ok(Vec::new())));
        let a = ModelAdapter::new(Arc::clone(&detector), Box::new(FixedTracker(Ok(None))), 0.1);
        let b = ModelAdapter::new(Arc::clone(&detector), Box::new(FixedTracker(Ok(None))), 0.1);
        assert_eq!(Arc::strong_count(&detector), 3);
        drop((a, b));
        assert_eq!(Arc::strong_count(&detector), 1);
    }
}
