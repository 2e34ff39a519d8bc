//! Bundled classifier backend.
//!
//! Faces come from the SeetaFace frontal cascade (`rustface`); pupils,
//! landmarks and the nose tip come from [`IntensityRefiner`].

use std::io::Read;
use std::path::PathBuf;

use facemark_models::{BoundingRegion, FaceCandidate, Point};
use tracing::{debug, info, warn};

use super::refine::{IntensityRefiner, NOSE_ANCHOR};
use super::{merge_overlapping, CascadeParams, ClassifierCapability, SearchWindow};
use crate::decode::GrayFrame;
use crate::error::{MediaError, MediaResult};

const MODEL_FILE: &str = "seeta_fd_frontal_v1.0.bin";

/// rustface never searches below this side length.
const SEETA_MIN_FACE: u32 = 20;

/// Scanning window of the SeetaFace cascade.
const SEETA_WINDOW: f32 = 40.0;

/// Raw cascade score below which hits are discarded before merging.
const SEETA_SCORE_THRESH: f64 = 2.0;

/// Where to find the SeetaFace model file.
#[derive(Debug, Clone)]
pub struct SeetaModelConfig {
    /// Explicit model path. Takes precedence over the search paths.
    pub model_path: Option<PathBuf>,
    /// Directories searched for the model file, in order.
    pub search_paths: Vec<PathBuf>,
}

impl Default for SeetaModelConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            search_paths: vec![
                PathBuf::from("/app/models"),
                PathBuf::from("./models"),
                PathBuf::from("/usr/share/facemark/models"),
            ],
        }
    }
}

impl SeetaModelConfig {
    /// Reads `FACEMARK_FACE_MODEL` for an explicit model path.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("FACEMARK_FACE_MODEL") {
            if !path.is_empty() {
                config.model_path = Some(PathBuf::from(path));
            }
        }
        config
    }

    /// Resolve the model file to load.
    pub fn resolve(&self) -> MediaResult<PathBuf> {
        if let Some(path) = &self.model_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(MediaError::classifier_unavailable(format!(
                "face model not found at {}",
                path.display()
            )));
        }

        for dir in &self.search_paths {
            let path = dir.join(MODEL_FILE);
            if path.is_file() {
                debug!("Found face model at {}", path.display());
                return Ok(path);
            }
        }

        Err(MediaError::classifier_unavailable(format!(
            "{} not found in any of {:?}",
            MODEL_FILE, self.search_paths
        )))
    }
}

/// SeetaFace face cascade plus intensity refinement.
pub struct SeetaClassifier {
    // Read-only; each call builds its detector from a clone.
    model: rustface::Model,
    refiner: IntensityRefiner,
}

impl SeetaClassifier {
    /// Locate and load the model file.
    pub fn load(config: &SeetaModelConfig) -> MediaResult<Self> {
        let path = config.resolve()?;
        let file = std::fs::File::open(&path)?;
        let classifier = Self::from_reader(std::io::BufReader::new(file))?;
        info!(path = %path.display(), "Loaded SeetaFace model");
        Ok(classifier)
    }

    /// Parse a model from any reader.
    pub fn from_reader(reader: impl Read) -> MediaResult<Self> {
        let model = rustface::read_model(reader)
            .map_err(|e| MediaError::classifier_unavailable(format!("invalid face model: {}", e)))?;
        Ok(Self {
            model,
            refiner: IntensityRefiner::default(),
        })
    }
}

impl ClassifierCapability for SeetaClassifier {
    fn name(&self) -> &'static str {
        "seetaface"
    }

    fn detect_face_candidates(&self, frame: &GrayFrame, params: &CascadeParams) -> Vec<FaceCandidate> {
        let min_size = params.min_size.max(SEETA_MIN_FACE);
        if frame.rows() < min_size || frame.cols() < min_size {
            return Vec::new();
        }

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(min_size);
        detector.set_max_face_size(params.max_size.max(min_size));
        detector.set_score_thresh(SEETA_SCORE_THRESH);
        detector.set_pyramid_scale_factor(1.0 / params.scale_factor.max(1.01));
        let step = ((params.shift_factor * SEETA_WINDOW).round() as u32).max(1);
        detector.set_slide_window_step(step, step);

        let faces = detector.detect(&rustface::ImageData::new(
            frame.pixels(),
            frame.cols(),
            frame.rows(),
        ));

        let hits: Vec<FaceCandidate> = faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                let region = BoundingRegion::from_top_left(
                    bbox.y(),
                    bbox.x(),
                    bbox.width() as i32,
                    bbox.height() as i32,
                );
                FaceCandidate::new(region, face.score() as f32)
            })
            .collect();

        let raw = hits.len();
        let merged = merge_overlapping(hits, params.overlap_threshold);
        if merged.len() < raw {
            debug!(raw, merged = merged.len(), "Merged overlapping face hits");
        }
        merged
    }

    fn locate_pupil(&self, frame: &GrayFrame, window: &SearchWindow, perturbations: u32) -> Point {
        self.refiner.refine(frame, window, perturbations)
    }

    fn landmark_cascade_count(&self, family: &str) -> usize {
        match self.refiner.family(family) {
            Some(f) => f.cascade_count(),
            None => {
                warn!(family, "Unknown landmark family");
                0
            }
        }
    }

    fn locate_landmark_point(
        &self,
        frame: &GrayFrame,
        family: &str,
        index: usize,
        left_eye: Point,
        right_eye: Point,
        perturbations: u32,
    ) -> Point {
        self.refiner
            .landmark(frame, family, index, left_eye, right_eye, perturbations)
    }

    fn locate_nose(
        &self,
        frame: &GrayFrame,
        left_eye: Point,
        right_eye: Point,
        perturbations: u32,
    ) -> Point {
        self.refiner
            .anchored(frame, left_eye, right_eye, NOSE_ANCHOR, perturbations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_explicit_path() {
        let config = SeetaModelConfig {
            model_path: Some(PathBuf::from("/definitely/not/a/model.bin")),
            search_paths: Vec::new(),
        };
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, MediaError::ClassifierUnavailable(_)));
    }

    #[test]
    fn test_resolve_searches_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE), b"stub").unwrap();

        let config = SeetaModelConfig {
            model_path: None,
            search_paths: vec![PathBuf::from("/nope"), dir.path().to_path_buf()],
        };
        assert_eq!(config.resolve().unwrap(), dir.path().join(MODEL_FILE));
    }

    #[test]
    fn test_corrupt_model_is_classifier_unavailable() {
        let result = SeetaClassifier::from_reader(std::io::empty());
        assert!(matches!(result, Err(MediaError::ClassifierUnavailable(_))));
    }

    #[test]
    fn test_classifier_shares_model_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<rustface::Model>();
        assert_send_sync::<SeetaClassifier>();
    }
}
