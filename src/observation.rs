//! Per-frame observation record.
//!
//! An [`Observation`] is the fixed-schema evidence the protocol engine reads
//! each frame: one [`Detection`] per known class plus jaw distance and face
//! presence. It is never partially missing; absent detections carry
//! confidence `0.0`.

use serde::{Deserialize, Serialize};

/// A point in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

/// Centre-based bounding box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Centre x
    pub cx: f32,
    /// Centre y
    pub cy: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
}

impl Rect {
    /// Creates a box from its centre and size.
    #[must_use]
    pub const fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    /// Creates a box from corner coordinates `(x1, y1, x2, y2)`.
    ///
    /// Corners may be given in either order.
    #[must_use]
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (left, right) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (top, bottom) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        let w = right - left;
        let h = bottom - top;
        Self {
            cx: left + w / 2.0,
            cy: top + h / 2.0,
            w,
            h,
        }
    }

    /// Returns the centre of the box.
    #[must_use]
    pub const fn centroid(&self) -> Point {
        Point {
            x: self.cx,
            y: self.cy,
        }
    }

    fn is_finite(&self) -> bool {
        self.cx.is_finite() && self.cy.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

/// The object classes the detector is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    /// Pill held up in front of the camera
    Pill,
    /// Pill resting on the tongue
    PillOnTongue,
    /// Tongue visible with no pill on it
    TongueNoPill,
    /// Hand
    Hand,
}

impl DetectionClass {
    /// All known classes in schema order.
    pub const ALL: [Self; 4] = [Self::Pill, Self::PillOnTongue, Self::TongueNoPill, Self::Hand];

    /// Returns the detector label for this class.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pill => "pill",
            Self::PillOnTongue => "pill-on-tongue",
            Self::TongueNoPill => "tongue-no-pill",
            Self::Hand => "hand",
        }
    }

    /// Maps a detector label to a class.
    ///
    /// Accepts the hyphenated model labels and their snake-case spellings.
    /// Unknown labels return `None`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|c| c.label() == normalized)
    }
}

impl std::fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Best detection of one class in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Detection {
    /// Confidence in `[0, 1]`; `0.0` means not detected
    #[serde(default)]
    pub confidence: f32,
    /// Bounding box, when the detector reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Rect>,
}

impl Detection {
    /// A detection that was not found.
    pub const ABSENT: Self = Self {
        confidence: 0.0,
        bbox: None,
    };

    /// Creates a detection without a bounding box.
    #[must_use]
    pub const fn new(confidence: f32) -> Self {
        Self {
            confidence,
            bbox: None,
        }
    }

    /// Creates a detection with a bounding box.
    #[must_use]
    pub const fn with_bbox(confidence: f32, bbox: Rect) -> Self {
        Self {
            confidence,
            bbox: Some(bbox),
        }
    }

    /// `true` when confidence reaches `min` (inclusive).
    #[must_use]
    pub fn is_at_least(&self, min: f32) -> bool {
        self.confidence >= min
    }

    /// `true` when confidence stays strictly under `max`.
    #[must_use]
    pub fn is_below(&self, max: f32) -> bool {
        self.confidence < max
    }

    /// Centre of the bounding box, if any.
    #[must_use]
    pub fn centroid(&self) -> Option<Point> {
        self.bbox.as_ref().map(Rect::centroid)
    }

    /// Replaces non-finite or out-of-range values with their absent form.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            confidence,
            bbox: self.bbox.filter(Rect::is_finite),
        }
    }
}

/// Normalized per-frame evidence consumed by the protocol engine.
///
/// Every field defaults to its absent form when deserialized, so a partial
/// record still yields a well-formed observation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Pill held up
    #[serde(default)]
    pub pill: Detection,
    /// Pill on tongue
    #[serde(default)]
    pub pill_on_tongue: Detection,
    /// Tongue without pill
    #[serde(default)]
    pub tongue_no_pill: Detection,
    /// Hand
    #[serde(default)]
    pub hand: Detection,
    /// Vertical lip separation in pixels
    #[serde(default)]
    pub jaw_distance: f32,
    /// Whether the landmark tracker found a face
    #[serde(default)]
    pub face_present: bool,
}

impl Observation {
    /// Nothing detected, face absent.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            pill: Detection::ABSENT,
            pill_on_tongue: Detection::ABSENT,
            tongue_no_pill: Detection::ABSENT,
            hand: Detection::ABSENT,
            jaw_distance: 0.0,
            face_present: false,
        }
    }

    /// Returns the detection for `class`.
    #[must_use]
    pub const fn detection(&self, class: DetectionClass) -> &Detection {
        match class {
            DetectionClass::Pill => &self.pill,
            DetectionClass::PillOnTongue => &self.pill_on_tongue,
            DetectionClass::TongueNoPill => &self.tongue_no_pill,
            DetectionClass::Hand => &self.hand,
        }
    }

    /// Returns a mutable reference to the detection for `class`.
    pub const fn detection_mut(&mut self, class: DetectionClass) -> &mut Detection {
        match class {
            DetectionClass::Pill => &mut self.pill,
            DetectionClass::PillOnTongue => &mut self.pill_on_tongue,
            DetectionClass::TongueNoPill => &mut self.tongue_no_pill,
            DetectionClass::Hand => &mut self.hand,
        }
    }

    /// Sets a class confidence, keeping any existing box.
    #[must_use]
    pub fn with_confidence(mut self, class: DetectionClass, confidence: f32) -> Self {
        self.detection_mut(class).confidence = confidence;
        self
    }

    /// Sets a class detection including its box.
    #[must_use]
    pub fn with_detection(mut self, class: DetectionClass, detection: Detection) -> Self {
        *self.detection_mut(class) = detection;
        self
    }

    /// Sets the jaw distance.
    #[must_use]
    pub const fn with_jaw(mut self, jaw_distance: f32) -> Self {
        self.jaw_distance = jaw_distance;
        self
    }

    /// Sets face presence.
    #[must_use]
    pub const fn with_face(mut self, face_present: bool) -> Self {
        self.face_present = face_present;
        self
    }

    /// Coerces malformed values to absence.
    ///
    /// Confidences are clamped to `[0, 1]` (NaN becomes `0.0`), a negative
    /// or non-finite jaw distance becomes `0.0`, and boxes with non-finite
    /// coordinates are dropped.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let jaw_distance = if self.jaw_distance.is_finite() && self.jaw_distance > 0.0 {
            self.jaw_distance
        } else {
            0.0
        };
        Self {
            pill: self.pill.sanitized(),
            pill_on_tongue: self.pill_on_tongue.sanitized(),
            tongue_no_pill: self.tongue_no_pill.sanitized(),
            hand: self.hand.sanitized(),
            jaw_distance,
            face_present: self.face_present,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_default() {
        assert_eq!(Observation::absent(), Observation::default());
        assert!(!Observation::absent().face_present);
    }

    #[test]
    fn rect_from_corners_is_centre_based() {
        let r = Rect::from_corners(10.0, 20.0, 30.0, 60.0);
        assert_eq!(r, Rect::new(20.0, 40.0, 20.0, 40.0));
        assert_eq!(Rect::from_corners(30.0, 60.0, 10.0, 20.0), r);
        assert_eq!(r.centroid(), Point { x: 20.0, y: 40.0 });
    }

    #[test]
    fn class_labels_round_trip() {
        for class in DetectionClass::ALL {
            assert_eq!(DetectionClass::from_label(class.label()), Some(class));
        }
        assert_eq!(
            DetectionClass::from_label("Pill_On_Tongue"),
            Some(DetectionClass::PillOnTongue)
        );
        assert_eq!(DetectionClass::from_label("cup"), None);
    }

    #[test]
    fn thresholds_are_inclusive_and_exclusive() {
        let d = Detection::new(0.4);
        assert!(d.is_at_least(0.4));
        assert!(!d.is_below(0.4));
        assert!(d.is_below(0.41));
    }

    #[test]
    fn sanitize_clamps_and_zeroes() {
        let obs = Observation::absent()
            .with_confidence(DetectionClass::Pill, f32::NAN)
            .with_confidence(DetectionClass::Hand, 1.7)
            .with_confidence(DetectionClass::TongueNoPill, -0.3)
            .with_detection(
                DetectionClass::PillOnTongue,
                Detection::with_bbox(0.5, Rect::new(f32::INFINITY, 1.0, 1.0, 1.0)),
            )
            .with_jaw(-4.0)
            .sanitized();

        assert!(obs.pill.confidence.abs() < f32::EPSILON);
        assert!((obs.hand.confidence - 1.0).abs() < f32::EPSILON);
        assert!(obs.tongue_no_pill.confidence.abs() < f32::EPSILON);
        assert!(obs.pill_on_tongue.bbox.is_none());
        assert!((obs.pill_on_tongue.confidence - 0.5).abs() < f32::EPSILON);
        assert!(obs.jaw_distance.abs() < f32::EPSILON);
    }

    #[test]
    fn partial_json_degrades_to_absent_fields() {
        let obs: Observation =
            serde_json::from_str(r#"{"pill": {"confidence": 0.9}, "face_present": true}"#)
                .unwrap();
        assert!((obs.pill.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(obs.pill_on_tongue, Detection::ABSENT);
        assert!(obs.jaw_distance.abs() < f32::EPSILON);
        assert!(obs.face_present);
    }
}
