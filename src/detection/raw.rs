//! Raw detector and tracker output, and its normalization into an
//! [`Observation`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::trace;

use crate::observation::{Detection, DetectionClass, Observation, Rect};

/// One box reported by the object detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Class label as emitted by the model
    pub label: String,
    /// Detector confidence
    pub confidence: f32,
    /// Corner coordinates `[x1, y1, x2, y2]` in pixels
    #[serde(default)]
    pub xyxy: [f32; 4],
}

impl RawDetection {
    /// Creates a raw detection.
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32, xyxy: [f32; 4]) -> Self {
        Self {
            label: label.into(),
            confidence,
            xyxy,
        }
    }
}

/// Normalized vertical positions of the inner lip landmarks.
///
/// Values are fractions of the frame height, as emitted by face-mesh
/// trackers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LipLandmarks {
    /// Upper inner lip
    pub upper_lip_y: f32,
    /// Lower inner lip
    pub lower_lip_y: f32,
}

impl LipLandmarks {
    /// Vertical lip separation in pixels for a frame of `frame_height`.
    #[must_use]
    pub fn jaw_distance(&self, frame_height: f32) -> f32 {
        (self.lower_lip_y - self.upper_lip_y).abs() * frame_height
    }
}

/// Everything the perception models reported for one frame.
///
/// Decoding is lenient per field: a detection entry that does not fit
/// [`RawDetection`] is dropped on its own, and unusable landmarks or height
/// fall back to their defaults without discarding the rest of the frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawFrame {
    /// Object detections, in any order
    #[serde(default, deserialize_with = "each_detection")]
    pub detections: Vec<RawDetection>,
    /// Lip landmarks, `None` when no face was found
    #[serde(default, deserialize_with = "or_default")]
    pub landmarks: Option<LipLandmarks>,
    /// Frame height in pixels
    #[serde(default, deserialize_with = "or_default")]
    pub frame_height: f32,
}

fn each_detection<'de, D>(deserializer: D) -> Result<Vec<RawDetection>, D::Error>
where
    D: Deserializer<'de>,
{
    let serde_json::Value::Array(entries) = serde_json::Value::deserialize(deserializer)? else {
        trace!("detections is not a list, treating as empty");
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(detection) => Some(detection),
            Err(e) => {
                trace!(error = %e, "dropping malformed detection");
                None
            }
        })
        .collect())
}

fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        trace!(error = %e, "unusable frame field, using default");
        T::default()
    }))
}

/// Reduces a raw frame to an [`Observation`].
///
/// Detections under `min_confidence` or with an unknown label are ignored.
/// For each class the most confident detection wins. The face is present
/// exactly when landmarks were found.
#[must_use]
pub fn normalize(frame: &RawFrame, min_confidence: f32) -> Observation {
    let mut obs = Observation::absent();

    for raw in &frame.detections {
        if !raw.confidence.is_finite() || raw.confidence < min_confidence {
            continue;
        }
        let Some(class) = DetectionClass::from_label(&raw.label) else {
            trace!(label = %raw.label, "ignoring unknown detection label");
            continue;
        };
        let slot = obs.detection_mut(class);
        if raw.confidence > slot.confidence {
            let [x1, y1, x2, y2] = raw.xyxy;
            *slot = Detection::with_bbox(raw.confidence, Rect::from_corners(x1, y1, x2, y2));
        }
    }

    if let Some(landmarks) = frame.landmarks {
        obs.face_present = true;
        obs.jaw_distance = landmarks.jaw_distance(frame.frame_height);
    }

    obs.sanitized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_detection_per_class_wins() {
        let frame = RawFrame {
            detections: vec![
                RawDetection::new("pill", 0.5, [0.0, 0.0, 10.0, 10.0]),
                RawDetection::new("pill", 0.7, [20.0, 20.0, 40.0, 30.0]),
                RawDetection::new("pill", 0.6, [0.0, 0.0, 1.0, 1.0]),
            ],
            ..RawFrame::default()
        };
        let obs = normalize(&frame, 0.1);
        assert!((obs.pill.confidence - 0.7).abs() < f32::EPSILON);
        assert_eq!(obs.pill.bbox, Some(Rect::new(30.0, 25.0, 20.0, 10.0)));
    }

    #[test]
    fn floor_and_unknown_labels_are_dropped() {
        let frame = RawFrame {
            detections: vec![
                RawDetection::new("hand", 0.05, [0.0; 4]),
                RawDetection::new("cup", 0.99, [0.0; 4]),
                RawDetection::new("tongue-no-pill", f32::NAN, [0.0; 4]),
            ],
            ..RawFrame::default()
        };
        let obs = normalize(&frame, 0.1);
        assert_eq!(obs, Observation::absent());
    }

    #[test]
    fn landmarks_give_face_and_jaw() {
        let frame = RawFrame {
            landmarks: Some(LipLandmarks {
                upper_lip_y: 0.60,
                lower_lip_y: 0.55,
            }),
            frame_height: 480.0,
            ..RawFrame::default()
        };
        let obs = normalize(&frame, 0.1);
        assert!(obs.face_present);
        assert!((obs.jaw_distance - 24.0).abs() < 1e-3);
    }

    #[test]
    fn bad_detection_entry_keeps_rest_of_frame() {
        let frame: RawFrame = serde_json::from_str(
            r#"{"detections":[
                {"label":"pill","confidence":0.95,"xyxy":[0,0,10,10]},
                {"label":"hand","confidence":null},
                {"label":"tongue-no-pill"},
                "noise"
            ],"landmarks":{"upper_lip_y":0.5,"lower_lip_y":0.52},"frame_height":500}"#,
        )
        .unwrap();
        assert_eq!(frame.detections.len(), 1);

        let obs = normalize(&frame, 0.1);
        assert!(obs.face_present);
        assert!((obs.pill.confidence - 0.95).abs() < f32::EPSILON);
        assert!((obs.jaw_distance - 10.0).abs() < 1e-3);
        assert!(obs.hand.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn unusable_fields_fall_back_to_defaults() {
        let frame: RawFrame = serde_json::from_str(
            r#"{"detections":{"label":"pill"},"landmarks":{"upper_lip_y":"high"},"frame_height":null}"#,
        )
        .unwrap();
        assert_eq!(frame, RawFrame::default());
    }

    #[test]
    fn missing_landmarks_mean_no_face() {
        let obs = normalize(&RawFrame::default(), 0.1);
        assert!(!obs.face_present);
        assert!(obs.jaw_distance.abs() < f32::EPSILON);
    }
}
