//! Per-face landmark derivation.
//!
//! Turns raw face candidates into [`Detection`] records: quality gating,
//! eye search windows, pupil and landmark localization.

use facemark_models::{BoundingRegion, Detection, FaceCandidate};
use tracing::{debug, trace};

use crate::classifier::{ClassifierCapability, SearchWindow};
use crate::decode::GrayFrame;

/// Landmark families queried by default, in call order.
pub const DEFAULT_LANDMARK_FAMILIES: &[&str] = &["lp93", "lp84", "lp82", "lp81"];

// Eye window geometry, as fractions of the face scale.
const EYE_ROW_OFFSET: f64 = 0.075;
const LEFT_EYE_COL_OFFSET: f64 = 0.175;
const RIGHT_EYE_COL_OFFSET: f64 = 0.185;
const EYE_WINDOW_SCALE: f64 = 0.25;

/// Locator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorConfig {
    /// Candidates scoring at or below this are dropped.
    pub quality_threshold: f32,
    /// Faces smaller than this get no feature search.
    pub min_feature_scale: i32,
    /// Jittered windows per pupil/landmark search.
    pub perturbations: u32,
    /// Landmark families, in call order.
    pub landmark_families: Vec<String>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 5.0,
            min_feature_scale: 50,
            perturbations: 63,
            landmark_families: DEFAULT_LANDMARK_FAMILIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl LocatorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            quality_threshold: std::env::var("FACEMARK_QUALITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.quality_threshold),
            min_feature_scale: std::env::var("FACEMARK_MIN_FEATURE_SCALE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_feature_scale),
            perturbations: std::env::var("FACEMARK_PERTURBATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.perturbations),
            landmark_families: std::env::var("FACEMARK_LANDMARK_FAMILIES")
                .ok()
                .map(|s| parse_families(&s))
                .filter(|f| !f.is_empty())
                .unwrap_or(defaults.landmark_families),
        }
    }
}

fn parse_families(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Left and right pupil search windows for a face region.
///
/// Computed in floating point and floored to pixel coordinates.
pub fn eye_windows(face: &BoundingRegion) -> (SearchWindow, SearchWindow) {
    let row = f64::from(face.row);
    let col = f64::from(face.col);
    let scale = f64::from(face.scale());

    let eye_row = (row - EYE_ROW_OFFSET * scale).floor() as i32;
    let eye_scale = (EYE_WINDOW_SCALE * scale) as f32;

    let left = SearchWindow::new(
        eye_row,
        (col - LEFT_EYE_COL_OFFSET * scale).floor() as i32,
        eye_scale,
    );
    let right = SearchWindow::new(
        eye_row,
        (col + RIGHT_EYE_COL_OFFSET * scale).floor() as i32,
        eye_scale,
    );
    (left, right)
}

/// Derives detections from face candidates.
#[derive(Debug, Clone, Default)]
pub struct LandmarkLocator {
    config: LocatorConfig,
}

impl LandmarkLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Derive a detection for one candidate.
    ///
    /// Returns `None` when the candidate fails the quality gate, and a
    /// face-only detection when the face is too small for feature search.
    pub fn locate(
        &self,
        classifier: &dyn ClassifierCapability,
        frame: &GrayFrame,
        candidate: &FaceCandidate,
    ) -> Option<Detection> {
        if candidate.score <= self.config.quality_threshold {
            trace!(score = candidate.score, "Dropping low quality candidate");
            return None;
        }

        let face = candidate.region;
        if face.scale() < self.config.min_feature_scale {
            debug!(scale = face.scale(), "Face too small for feature search");
            return Some(Detection::face_only(face));
        }

        let perturbations = self.config.perturbations;
        let (left_window, right_window) = eye_windows(&face);
        let left = classifier.locate_pupil(frame, &left_window, perturbations);
        let right = classifier.locate_pupil(frame, &right_window, perturbations);

        let mut mouth = Vec::new();
        for family in &self.config.landmark_families {
            for index in 0..classifier.landmark_cascade_count(family) {
                mouth.push(classifier.locate_landmark_point(
                    frame,
                    family,
                    index,
                    left,
                    right,
                    perturbations,
                ));
            }
        }

        let nose = classifier.locate_nose(frame, left, right, perturbations);

        Some(
            Detection::face_only(face)
                .with_eyes(left.found(), right.found())
                .with_mouth(mouth)
                .with_nose(nose.found()),
        )
    }

    /// Derive detections for every candidate, in input order.
    pub fn locate_all(
        &self,
        classifier: &dyn ClassifierCapability,
        frame: &GrayFrame,
        candidates: &[FaceCandidate],
    ) -> Vec<Detection> {
        let detections: Vec<Detection> = candidates
            .iter()
            .filter_map(|c| self.locate(classifier, frame, c))
            .collect();
        debug!(
            candidates = candidates.len(),
            detections = detections.len(),
            "Located landmarks"
        );
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CascadeParams;
    use facemark_models::Point;
    use std::sync::Mutex;

    /// Returns window centers as pupils and records every call.
    #[derive(Default)]
    struct ScriptedClassifier {
        calls: Mutex<Vec<String>>,
        nose: Option<Point>,
    }

    impl ScriptedClassifier {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ClassifierCapability for ScriptedClassifier {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn detect_face_candidates(&self, _: &GrayFrame, _: &CascadeParams) -> Vec<FaceCandidate> {
            Vec::new()
        }

        fn locate_pupil(&self, _: &GrayFrame, window: &SearchWindow, perturbations: u32) -> Point {
            self.calls.lock().unwrap().push(format!(
                "pupil {} {} {} p{}",
                window.row, window.col, window.scale, perturbations
            ));
            Point::new(window.row, window.col)
        }

        fn landmark_cascade_count(&self, family: &str) -> usize {
            match family {
                "lp93" | "lp84" | "lp82" => 1,
                "lp81" => 2,
                _ => 0,
            }
        }

        fn locate_landmark_point(
            &self,
            _: &GrayFrame,
            family: &str,
            index: usize,
            left: Point,
            _: Point,
            _: u32,
        ) -> Point {
            self.calls
                .lock()
                .unwrap()
                .push(format!("landmark {} {}", family, index));
            if family == "lp82" {
                return Point::NOT_FOUND;
            }
            Point::new(left.row + 100 + index as i32, left.col)
        }

        fn locate_nose(&self, _: &GrayFrame, _: Point, _: Point, _: u32) -> Point {
            self.nose.unwrap_or(Point::NOT_FOUND)
        }
    }

    fn frame() -> GrayFrame {
        GrayFrame::new(vec![0; 16], 4, 4).unwrap()
    }

    #[test]
    fn test_eye_windows_scenario() {
        let (left, right) = eye_windows(&BoundingRegion::square(909, 298, 705));
        assert_eq!((left.row, left.col), (856, 174));
        assert_eq!((right.row, right.col), (856, 428));
        assert!((left.scale - 176.25).abs() < 1e-4);
        assert!((right.scale - 176.25).abs() < 1e-4);
    }

    #[test]
    fn test_eye_windows_deterministic() {
        let face = BoundingRegion::square(321, 654, 233);
        assert_eq!(eye_windows(&face), eye_windows(&face));
    }

    #[test]
    fn test_quality_gate_is_strict() {
        let locator = LandmarkLocator::default();
        let classifier = ScriptedClassifier::default();
        let face = BoundingRegion::square(200, 200, 120);

        let at = FaceCandidate::new(face, 5.0);
        assert!(locator.locate(&classifier, &frame(), &at).is_none());

        let above = FaceCandidate::new(face, 5.01);
        assert!(locator.locate(&classifier, &frame(), &above).is_some());
    }

    #[test]
    fn test_scale_gate() {
        let locator = LandmarkLocator::default();
        let classifier = ScriptedClassifier::default();

        let small = FaceCandidate::new(BoundingRegion::square(200, 200, 49), 10.0);
        let det = locator.locate(&classifier, &frame(), &small).unwrap();
        assert!(det.is_face_only());
        assert!(classifier.calls().is_empty());

        let large = FaceCandidate::new(BoundingRegion::square(200, 200, 51), 10.0);
        let det = locator.locate(&classifier, &frame(), &large).unwrap();
        assert!(det.left_eye.is_some());
        assert!(det.right_eye.is_some());
    }

    #[test]
    fn test_face_box_passes_through() {
        let locator = LandmarkLocator::default();
        let classifier = ScriptedClassifier::default();
        let face = BoundingRegion::square(753, 1257, 986);

        let det = locator
            .locate(&classifier, &frame(), &FaceCandidate::new(face, 12.5))
            .unwrap();
        assert_eq!(det.face, face);
    }

    #[test]
    fn test_mouth_keeps_call_order_and_sentinels() {
        let locator = LandmarkLocator::default();
        let classifier = ScriptedClassifier::default();
        let face = BoundingRegion::square(909, 298, 705);

        let det = locator
            .locate(&classifier, &frame(), &FaceCandidate::new(face, 9.0))
            .unwrap();

        assert_eq!(det.left_eye, Some(Point::new(856, 174)));
        assert_eq!(det.right_eye, Some(Point::new(856, 428)));
        assert_eq!(
            det.mouth,
            vec![
                Point::new(956, 174),
                Point::new(956, 174),
                Point::NOT_FOUND,
                Point::new(956, 174),
                Point::new(957, 174),
            ]
        );
        assert_eq!(
            classifier.calls()[2..],
            [
                "landmark lp93 0",
                "landmark lp84 0",
                "landmark lp82 0",
                "landmark lp81 0",
                "landmark lp81 1",
            ]
        );
        assert!(det.nose.is_none());
    }

    #[test]
    fn test_pupil_calls_use_configured_perturbations() {
        let locator = LandmarkLocator::new(LocatorConfig {
            perturbations: 7,
            landmark_families: Vec::new(),
            ..Default::default()
        });
        let classifier = ScriptedClassifier::default();
        let face = BoundingRegion::square(909, 298, 705);
        locator.locate(&classifier, &frame(), &FaceCandidate::new(face, 9.0));

        assert_eq!(
            classifier.calls(),
            vec!["pupil 856 174 176.25 p7", "pupil 856 428 176.25 p7"]
        );
    }

    #[test]
    fn test_nose_filled_when_found() {
        let locator = LandmarkLocator::default();
        let classifier = ScriptedClassifier {
            nose: Some(Point::new(300, 310)),
            ..Default::default()
        };
        let face = BoundingRegion::square(300, 300, 200);

        let det = locator
            .locate(&classifier, &frame(), &FaceCandidate::new(face, 9.0))
            .unwrap();
        assert_eq!(det.nose, Some(Point::new(300, 310)));
    }

    #[test]
    fn test_locate_all_preserves_order_and_drops_low_scores() {
        let locator = LandmarkLocator::default();
        let classifier = ScriptedClassifier::default();
        let candidates = vec![
            FaceCandidate::new(BoundingRegion::square(100, 100, 30), 8.0),
            FaceCandidate::new(BoundingRegion::square(500, 500, 200), 1.0),
            FaceCandidate::new(BoundingRegion::square(300, 300, 30), 8.0),
        ];

        let detections = locator.locate_all(&classifier, &frame(), &candidates);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].face.row, 100);
        assert_eq!(detections[1].face.row, 300);
    }

    #[test]
    fn test_parse_families() {
        assert_eq!(parse_families(" lp93, lp81 ,,"), vec!["lp93", "lp81"]);
    }
}
