//! Classifier candidates and canonical per-face detections.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingRegion, Point};

/// Raw face classifier output, already deduplicated by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaceCandidate {
    pub region: BoundingRegion,
    /// Detection quality score reported by the cascade.
    pub score: f32,
}

impl FaceCandidate {
    pub fn new(region: BoundingRegion, score: f32) -> Self {
        Self { region, score }
    }
}

/// Canonical per-face result.
///
/// Optional fields are absent when the corresponding sub-detector failed.
/// `mouth` keeps every landmark in cascade call order, including `(0,0)`
/// sentinels for points that were not found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    pub face: BoundingRegion,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_eye: Option<Point>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_eye: Option<Point>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mouth: Vec<Point>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nose: Option<Point>,
}

impl Detection {
    /// Detection carrying only the face region.
    pub fn face_only(face: BoundingRegion) -> Self {
        Self {
            face,
            left_eye: None,
            right_eye: None,
            mouth: Vec::new(),
            nose: None,
        }
    }

    pub fn with_eyes(mut self, left: Option<Point>, right: Option<Point>) -> Self {
        self.left_eye = left;
        self.right_eye = right;
        self
    }

    pub fn with_mouth(mut self, mouth: Vec<Point>) -> Self {
        self.mouth = mouth;
        self
    }

    pub fn with_nose(mut self, nose: Option<Point>) -> Self {
        self.nose = nose;
        self
    }

    /// Landmark points that were actually localized.
    pub fn found_mouth_points(&self) -> impl Iterator<Item = &Point> {
        self.mouth.iter().filter(|p| p.is_found())
    }

    /// True when no sub-detector produced anything.
    pub fn is_face_only(&self) -> bool {
        self.left_eye.is_none()
            && self.right_eye.is_none()
            && self.mouth.is_empty()
            && self.nose.is_none()
    }
}
