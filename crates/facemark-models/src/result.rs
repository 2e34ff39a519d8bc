//! Pipeline result stored in the result cache.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::Detection;

/// Outcome of one detection run, keyed by the input fingerprint.
///
/// `output_image` is the file name of the annotated preview, relative to the
/// configured output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineResult {
    #[serde(default)]
    pub detections: Vec<Detection>,
    pub output_image: String,
}

impl PipelineResult {
    pub fn new(detections: Vec<Detection>, output_image: impl Into<String>) -> Self {
        Self {
            detections,
            output_image: output_image.into(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.detections.len()
    }
}
