//! End-to-end run: fingerprint, cache lookup, detection, rendering, cache fill.
//!
//! ```text
//! Start → Fingerprinted → CacheChecked ─┬─ CacheHit → Done
//!                                       └─ CacheMiss → Decoded → Detected
//!                                            → Rendered → Cached → Done
//! ```
//!
//! Cache failures never fail a run. A render failure keeps the detections,
//! skips `Rendered`/`Cached` and leaves the result uncached.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use facemark_cache::{build_cache, decode_result, encode_result, ResultCache};
use facemark_media::{
    decode_image, fingerprint_bytes, CascadeParams, ClassifierService, LandmarkLocator, Renderer,
};
use facemark_models::{Fingerprint, PipelineResult};
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, RunResult};
use crate::logging::RequestLogger;
use crate::metrics;

/// States a run passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Fingerprinted,
    CacheChecked,
    CacheHit,
    CacheMiss,
    Decoded,
    Detected,
    Rendered,
    Cached,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Fingerprinted => "fingerprinted",
            Self::CacheChecked => "cache_checked",
            Self::CacheHit => "cache_hit",
            Self::CacheMiss => "cache_miss",
            Self::Decoded => "decoded",
            Self::Detected => "detected",
            Self::Rendered => "rendered",
            Self::Cached => "cached",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub result: PipelineResult,
    pub fingerprint: Fingerprint,
    /// True when the result came from the cache.
    pub cached: bool,
    /// Set when rendering failed; detections are still valid.
    pub render_error: Option<String>,
    /// Stages visited, in order.
    pub stages: Vec<PipelineStage>,
    pub elapsed: Duration,
}

/// Stage trail plus logging for one run.
struct RunTrace {
    logger: RequestLogger,
    stages: Vec<PipelineStage>,
}

impl RunTrace {
    fn new(logger: RequestLogger) -> Self {
        Self {
            logger,
            stages: vec![PipelineStage::Start, PipelineStage::Fingerprinted],
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        self.logger.log_stage(stage);
        self.stages.push(stage);
    }
}

/// Runs the detection pipeline against a shared classifier and cache.
pub struct PipelineOrchestrator {
    classifier: Arc<ClassifierService>,
    cache: Arc<dyn ResultCache>,
    locator: LandmarkLocator,
    renderer: Renderer,
    cascade: CascadeParams,
    output_dir: PathBuf,
}

impl PipelineOrchestrator {
    pub fn new(
        config: &PipelineConfig,
        classifier: Arc<ClassifierService>,
        cache: Arc<dyn ResultCache>,
    ) -> Self {
        Self {
            classifier,
            cache,
            locator: LandmarkLocator::new(config.locator.clone()),
            renderer: Renderer::new(config.render),
            cascade: config.cascade,
            output_dir: config.output_dir.clone(),
        }
    }

    /// Build the orchestrator with the bundled classifier and configured cache.
    pub fn from_config(config: &PipelineConfig) -> RunResult<Self> {
        let cache = build_cache(&config.cache).map_err(|e| PipelineError::config(e.to_string()))?;
        let classifier = Arc::new(ClassifierService::seeta(config.model.clone()));
        Ok(Self::new(config, classifier, cache))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn classifier(&self) -> &Arc<ClassifierService> {
        &self.classifier
    }

    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    /// Read an image file and run the pipeline on its bytes.
    ///
    /// The output keeps the input's extension.
    pub async fn run_file(&self, path: &Path) -> RunResult<PipelineOutcome> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::input_read(path.display().to_string(), e))?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.run_bytes(bytes, &extension).await
    }

    /// Run the pipeline on in-memory image bytes.
    ///
    /// `extension` selects the output format (`png`, `jpg`, `jpeg`, or empty
    /// for JPEG); a leading dot is accepted.
    pub async fn run_bytes(&self, bytes: Vec<u8>, extension: &str) -> RunResult<PipelineOutcome> {
        let start = Instant::now();
        let fingerprint = fingerprint_bytes(&bytes);
        let logger = RequestLogger::new(&fingerprint);
        let span = logger.create_span();
        logger.log_start(bytes.len());

        self.run_inner(bytes, extension, fingerprint, logger, start)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        bytes: Vec<u8>,
        extension: &str,
        fingerprint: Fingerprint,
        logger: RequestLogger,
        start: Instant,
    ) -> RunResult<PipelineOutcome> {
        let mut trace = RunTrace::new(logger);

        let cached = self.lookup(&fingerprint, &trace.logger).await;
        trace.enter(PipelineStage::CacheChecked);

        if let Some(result) = cached {
            trace.enter(PipelineStage::CacheHit);
            metrics::record_cache_hit();
            return Ok(self.finish(trace, result, fingerprint, true, None, start));
        }

        trace.enter(PipelineStage::CacheMiss);
        metrics::record_cache_miss();

        let decoded = tokio::task::spawn_blocking(move || decode_image(&bytes)).await??;
        trace.enter(PipelineStage::Decoded);

        let classifier_service = Arc::clone(&self.classifier);
        let locator = self.locator.clone();
        let cascade = self.cascade;
        let (decoded, detections) = tokio::task::spawn_blocking(move || {
            let classifier = classifier_service.get()?;
            let candidates = classifier.detect_face_candidates(&decoded.gray, &cascade);
            let detections = locator.locate_all(classifier.as_ref(), &decoded.gray, &candidates);
            Ok::<_, facemark_media::MediaError>((decoded, detections))
        })
        .await??;
        trace.enter(PipelineStage::Detected);
        metrics::record_faces_detected(detections.len());

        let file_name = output_file_name(&fingerprint, extension);
        let path = self.output_dir.join(&file_name);
        let renderer = self.renderer.clone();
        let to_draw = detections.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render_to_path(&decoded.color, &to_draw, &path)
        })
        .await?;

        match rendered {
            Ok(_) => {
                trace.enter(PipelineStage::Rendered);
                let result = PipelineResult::new(detections, file_name);
                if self.store(&fingerprint, &result, &trace.logger).await {
                    trace.enter(PipelineStage::Cached);
                }
                Ok(self.finish(trace, result, fingerprint, false, None, start))
            }
            Err(e) => {
                trace
                    .logger
                    .log_warning(&format!("render failed, result not cached: {}", e));
                let result = PipelineResult::new(detections, String::new());
                Ok(self.finish(trace, result, fingerprint, false, Some(e.to_string()), start))
            }
        }
    }

    /// Cache lookup. Errors and corrupt payloads count as a miss.
    async fn lookup(&self, fingerprint: &Fingerprint, logger: &RequestLogger) -> Option<PipelineResult> {
        match self.cache.get(fingerprint).await {
            Ok(Some(payload)) => decode_result(fingerprint, &payload),
            Ok(None) => None,
            Err(e) => {
                metrics::record_cache_error("get");
                logger.log_warning(&format!("cache lookup failed, treating as miss: {}", e));
                None
            }
        }
    }

    /// Best-effort cache fill. Returns whether the value was stored.
    async fn store(&self, fingerprint: &Fingerprint, result: &PipelineResult, logger: &RequestLogger) -> bool {
        let payload = match encode_result(result) {
            Ok(payload) => payload,
            Err(e) => {
                logger.log_warning(&format!("failed to encode result: {}", e));
                return false;
            }
        };

        match self.cache.set(fingerprint, &payload).await {
            Ok(()) => true,
            Err(e) => {
                metrics::record_cache_error("set");
                logger.log_warning(&format!("cache store failed: {}", e));
                false
            }
        }
    }

    fn finish(
        &self,
        mut trace: RunTrace,
        result: PipelineResult,
        fingerprint: Fingerprint,
        cached: bool,
        render_error: Option<String>,
        start: Instant,
    ) -> PipelineOutcome {
        trace.enter(PipelineStage::Done);
        let elapsed = start.elapsed();

        let outcome = match (cached, render_error.is_some()) {
            (true, _) => "hit",
            (false, false) => "miss",
            (false, true) => "render_failed",
        };
        metrics::record_pipeline_duration(outcome, elapsed.as_secs_f64());
        trace
            .logger
            .log_completion(cached, result.face_count(), elapsed.as_millis() as u64);

        PipelineOutcome {
            result,
            fingerprint,
            cached,
            render_error,
            stages: trace.stages,
            elapsed,
        }
    }
}

/// Output file name: the fingerprint plus the normalized input extension.
pub fn output_file_name(fingerprint: &Fingerprint, extension: &str) -> String {
    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if extension.is_empty() {
        fingerprint.to_string()
    } else {
        format!("{}.{}", fingerprint, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use facemark_cache::{CacheError, CacheResult, InMemoryResultCache};
    use facemark_media::{ClassifierCapability, GrayFrame, MediaError, SearchWindow};
    use facemark_models::{BoundingRegion, FaceCandidate, Point};
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use PipelineStage::*;

    /// One good face per image; pupils at the window centers.
    #[derive(Default)]
    struct OneFaceClassifier {
        detect_calls: AtomicUsize,
    }

    impl ClassifierCapability for OneFaceClassifier {
        fn name(&self) -> &'static str {
            "one-face"
        }

        fn detect_face_candidates(&self, _: &GrayFrame, _: &CascadeParams) -> Vec<FaceCandidate> {
            self.detect_calls.fetch_add(1, Ordering::SeqCst);
            vec![
                FaceCandidate::new(BoundingRegion::square(40, 40, 60), 9.0),
                FaceCandidate::new(BoundingRegion::square(10, 10, 20), 1.0),
            ]
        }

        fn locate_pupil(&self, _: &GrayFrame, window: &SearchWindow, _: u32) -> Point {
            Point::new(window.row, window.col)
        }

        fn landmark_cascade_count(&self, family: &str) -> usize {
            usize::from(family == "lp93")
        }

        fn locate_landmark_point(
            &self,
            _: &GrayFrame,
            _: &str,
            _: usize,
            left: Point,
            _: Point,
            _: u32,
        ) -> Point {
            Point::new(left.row + 20, left.col + 10)
        }
    }

    /// Cache whose every operation fails.
    struct BrokenCache;

    #[async_trait]
    impl ResultCache for BrokenCache {
        async fn get(&self, _: &Fingerprint) -> CacheResult<Option<String>> {
            Err(CacheError::unavailable("connection refused"))
        }

        async fn set(&self, _: &Fingerprint, _: &str) -> CacheResult<()> {
            Err(CacheError::unavailable("connection refused"))
        }

        async fn health_check(&self) -> CacheResult<()> {
            Err(CacheError::unavailable("connection refused"))
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    fn png_bytes(seed: u8) -> Vec<u8> {
        let image = RgbImage::from_pixel(80, 80, Rgb([seed, 200, 200]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    struct Harness {
        orchestrator: PipelineOrchestrator,
        classifier: Arc<OneFaceClassifier>,
        cache: Arc<InMemoryResultCache>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let classifier = Arc::new(OneFaceClassifier::default());
        let cache = Arc::new(InMemoryResultCache::new());
        let config = PipelineConfig {
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let orchestrator = PipelineOrchestrator::new(
            &config,
            Arc::new(ClassifierService::preloaded(classifier.clone())),
            cache.clone(),
        );
        Harness {
            orchestrator,
            classifier,
            cache,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let h = harness();
        let bytes = png_bytes(1);

        let first = h.orchestrator.run_bytes(bytes.clone(), ".png").await.unwrap();
        assert_eq!(
            first.stages,
            vec![Start, Fingerprinted, CacheChecked, CacheMiss, Decoded, Detected, Rendered, Cached, Done]
        );
        assert!(!first.cached);
        assert!(first.render_error.is_none());
        assert_eq!(first.result.face_count(), 1);
        assert_eq!(first.result.output_image, format!("{}.png", first.fingerprint));
        assert!(h
            .orchestrator
            .output_dir()
            .join(&first.result.output_image)
            .is_file());

        let second = h.orchestrator.run_bytes(bytes, "png").await.unwrap();
        assert_eq!(second.stages, vec![Start, Fingerprinted, CacheChecked, CacheHit, Done]);
        assert!(second.cached);
        assert_eq!(second.result, first.result);
        assert_eq!(h.classifier.detect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detection_contents() {
        let h = harness();
        let outcome = h.orchestrator.run_bytes(png_bytes(2), "jpg").await.unwrap();

        let det = &outcome.result.detections[0];
        assert_eq!(det.face, BoundingRegion::square(40, 40, 60));
        // Eye windows for a 60px face centered at (40, 40).
        assert_eq!(det.left_eye, Some(Point::new(35, 29)));
        assert_eq!(det.right_eye, Some(Point::new(35, 51)));
        assert_eq!(det.mouth, vec![Point::new(55, 39)]);
    }

    #[tokio::test]
    async fn test_cache_outage_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let orchestrator = PipelineOrchestrator::new(
            &config,
            Arc::new(ClassifierService::preloaded(Arc::new(OneFaceClassifier::default()))),
            Arc::new(BrokenCache),
        );

        let outcome = orchestrator.run_bytes(png_bytes(3), "png").await.unwrap();
        assert_eq!(
            outcome.stages,
            vec![Start, Fingerprinted, CacheChecked, CacheMiss, Decoded, Detected, Rendered, Done]
        );
        assert_eq!(outcome.result.face_count(), 1);
    }

    #[tokio::test]
    async fn test_render_failure_keeps_detections_and_skips_cache() {
        let h = harness();
        let outcome = h.orchestrator.run_bytes(png_bytes(4), ".gif").await.unwrap();

        assert_eq!(
            outcome.stages,
            vec![Start, Fingerprinted, CacheChecked, CacheMiss, Decoded, Detected, Done]
        );
        assert!(outcome.render_error.is_some());
        assert_eq!(outcome.result.face_count(), 1);
        assert!(outcome.result.output_image.is_empty());
        assert!(h.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_corrupt_cached_payload_is_recomputed() {
        let h = harness();
        let bytes = png_bytes(5);
        let fingerprint = fingerprint_bytes(&bytes);
        h.cache.set(&fingerprint, "{broken").await.unwrap();

        let outcome = h.orchestrator.run_bytes(bytes, "png").await.unwrap();
        assert!(!outcome.cached);
        assert!(outcome.stages.contains(&Cached));

        let stored = h.cache.get(&fingerprint).await.unwrap().unwrap();
        assert_eq!(decode_result(&fingerprint, &stored), Some(outcome.result));
    }

    #[tokio::test]
    async fn test_concurrent_population_is_idempotent() {
        let h = harness();
        let bytes = png_bytes(6);

        let (a, b) = tokio::join!(
            h.orchestrator.run_bytes(bytes.clone(), "png"),
            h.orchestrator.run_bytes(bytes, "png"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.result, b.result);
        assert_eq!(h.cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_undecodable_input_aborts() {
        let h = harness();
        let err = h
            .orchestrator
            .run_bytes(b"not an image".to_vec(), "png")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Media(MediaError::InputDecode(_))));
        assert!(err.is_bad_input());
    }

    #[tokio::test]
    async fn test_classifier_unavailable_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let orchestrator = PipelineOrchestrator::new(
            &config,
            Arc::new(ClassifierService::new(|| {
                Err(MediaError::classifier_unavailable("no model"))
            })),
            Arc::new(InMemoryResultCache::new()),
        );

        let err = orchestrator.run_bytes(png_bytes(7), "png").await.unwrap_err();
        assert!(matches!(err, PipelineError::Media(MediaError::ClassifierUnavailable(_))));
    }

    #[tokio::test]
    async fn test_run_file_missing_input() {
        let h = harness();
        let err = h
            .orchestrator
            .run_file(Path::new("/definitely/not/here.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InputRead { .. }));
    }

    #[tokio::test]
    async fn test_run_file_uses_input_extension() {
        let h = harness();
        let input = h._dir.path().join("face.PNG");
        std::fs::write(&input, png_bytes(8)).unwrap();

        let outcome = h.orchestrator.run_file(&input).await.unwrap();
        assert!(outcome.result.output_image.ends_with(".png"));
    }

    #[test]
    fn test_output_file_name() {
        let fp = Fingerprint::parse("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(output_file_name(&fp, ".JPG"), "00112233445566778899aabbccddeeff.jpg");
        assert_eq!(output_file_name(&fp, "png"), "00112233445566778899aabbccddeeff.png");
        assert_eq!(output_file_name(&fp, ""), "00112233445566778899aabbccddeeff");
    }
}
