//! Classifier capability.
//!
//! The pipeline only talks to face/pupil/landmark detection through
//! [`ClassifierCapability`]. Backends are loaded once per process through
//! [`ClassifierService`] and shared read-only between requests.

mod refine;
mod seeta;
mod service;

pub use refine::{IntensityRefiner, LandmarkFamily, DEFAULT_FAMILIES, NOSE_ANCHOR};
pub use seeta::{SeetaClassifier, SeetaModelConfig};
pub use service::ClassifierService;

use facemark_models::{BoundingRegion, FaceCandidate, Point};

use crate::decode::GrayFrame;

/// Face cascade search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeParams {
    /// Smallest face side searched, in pixels.
    pub min_size: u32,
    /// Largest face side searched, in pixels.
    pub max_size: u32,
    /// Sliding window step as a fraction of the window side.
    pub shift_factor: f32,
    /// Scale multiplier between pyramid levels.
    pub scale_factor: f32,
    /// IoU above which raw hits are merged into one candidate.
    pub overlap_threshold: f32,
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            min_size: 20,
            max_size: 4000,
            shift_factor: 0.1,
            scale_factor: 1.1,
            overlap_threshold: 0.2,
        }
    }
}

/// Square search window centered on `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    pub row: i32,
    pub col: i32,
    pub scale: f32,
}

impl SearchWindow {
    pub fn new(row: i32, col: i32, scale: f32) -> Self {
        Self { row, col, scale }
    }
}

/// Detection primitives supplied by a classifier backend.
///
/// Implementations are loaded once and called concurrently from blocking
/// worker threads, so they must not rely on interior mutation.
pub trait ClassifierCapability: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Find faces over the whole frame. Output is already deduplicated.
    fn detect_face_candidates(&self, frame: &GrayFrame, params: &CascadeParams)
        -> Vec<FaceCandidate>;

    /// Localize a pupil inside `window`. Returns [`Point::NOT_FOUND`] on failure.
    fn locate_pupil(&self, frame: &GrayFrame, window: &SearchWindow, perturbations: u32) -> Point;

    /// Number of sub-cascades in a landmark family. Unknown families have none.
    fn landmark_cascade_count(&self, family: &str) -> usize;

    /// Localize one landmark relative to the raw pupil results.
    fn locate_landmark_point(
        &self,
        frame: &GrayFrame,
        family: &str,
        index: usize,
        left_eye: Point,
        right_eye: Point,
        perturbations: u32,
    ) -> Point;

    /// Localize the nose tip. Backends without a nose model report not found.
    fn locate_nose(
        &self,
        _frame: &GrayFrame,
        _left_eye: Point,
        _right_eye: Point,
        _perturbations: u32,
    ) -> Point {
        Point::NOT_FOUND
    }
}

/// Merge raw hits whose IoU exceeds `overlap_threshold`.
///
/// Hits are visited by descending score; each cluster is replaced by the
/// average region of its members and the sum of their scores.
pub fn merge_overlapping(mut hits: Vec<FaceCandidate>, overlap_threshold: f32) -> Vec<FaceCandidate> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));

    let threshold = f64::from(overlap_threshold);
    let mut assigned = vec![false; hits.len()];
    let mut merged = Vec::new();

    for i in 0..hits.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;

        let seed = hits[i].region;
        let mut members = vec![hits[i]];
        for j in (i + 1)..hits.len() {
            if !assigned[j] && seed.iou(&hits[j].region) > threshold {
                assigned[j] = true;
                members.push(hits[j]);
            }
        }

        let n = members.len() as i64;
        let mean = |f: fn(&BoundingRegion) -> i32| -> i32 {
            let total: i64 = members.iter().map(|m| i64::from(f(&m.region))).sum();
            (total / n) as i32
        };
        let region = BoundingRegion::new(
            mean(|r| r.row),
            mean(|r| r.col),
            mean(|r| r.width),
            mean(|r| r.height),
        );
        let score = members.iter().map(|m| m.score).sum();
        merged.push(FaceCandidate::new(region, score));
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cascade_params() {
        let params = CascadeParams::default();
        assert_eq!(params.min_size, 20);
        assert_eq!(params.max_size, 4000);
        assert!((params.shift_factor - 0.1).abs() < f32::EPSILON);
        assert!((params.scale_factor - 1.1).abs() < f32::EPSILON);
        assert!((params.overlap_threshold - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge_overlapping_clusters_hits() {
        let hits = vec![
            FaceCandidate::new(BoundingRegion::square(100, 100, 40), 3.0),
            FaceCandidate::new(BoundingRegion::square(102, 104, 40), 4.0),
            FaceCandidate::new(BoundingRegion::square(400, 400, 40), 2.0),
        ];

        let merged = merge_overlapping(hits, 0.2);
        assert_eq!(merged.len(), 2);

        assert_eq!(merged[0].region, BoundingRegion::square(101, 102, 40));
        assert!((merged[0].score - 7.0).abs() < 1e-6);
        assert_eq!(merged[1].region, BoundingRegion::square(400, 400, 40));
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_overlapping(Vec::new(), 0.2).is_empty());
    }
}
