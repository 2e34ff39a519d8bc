//! Once-only classifier loading.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tracing::{error, info};

use super::{ClassifierCapability, SeetaClassifier, SeetaModelConfig};
use crate::error::{MediaError, MediaResult};

type Loader = Box<dyn Fn() -> MediaResult<Arc<dyn ClassifierCapability>> + Send + Sync>;

/// Lazily loaded, process-wide classifier handle.
///
/// The loader runs at most once, even under concurrent first access. A load
/// failure is remembered and reported to every later caller.
pub struct ClassifierService {
    cell: OnceLock<Result<Arc<dyn ClassifierCapability>, String>>,
    loader: Option<Loader>,
}

impl ClassifierService {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> MediaResult<Arc<dyn ClassifierCapability>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            loader: Some(Box::new(loader)),
        }
    }

    /// Service backed by the bundled SeetaFace classifier.
    pub fn seeta(config: SeetaModelConfig) -> Self {
        Self::new(move || {
            let classifier = SeetaClassifier::load(&config)?;
            Ok(Arc::new(classifier) as Arc<dyn ClassifierCapability>)
        })
    }

    /// Service wrapping an already loaded classifier.
    pub fn preloaded(classifier: Arc<dyn ClassifierCapability>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(classifier));
        Self { cell, loader: None }
    }

    /// Get the classifier, loading it on first use.
    pub fn get(&self) -> MediaResult<Arc<dyn ClassifierCapability>> {
        let outcome = self.cell.get_or_init(|| {
            let start = Instant::now();
            let loaded = match &self.loader {
                Some(load) => load().map_err(|e| match e {
                    MediaError::ClassifierUnavailable(message) => message,
                    other => other.to_string(),
                }),
                None => Err("no classifier loader configured".to_string()),
            };
            match &loaded {
                Ok(classifier) => info!(
                    backend = classifier.name(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Classifier loaded"
                ),
                Err(e) => error!(error = %e, "Classifier failed to load"),
            }
            loaded
        });

        match outcome {
            Ok(classifier) => Ok(Arc::clone(classifier)),
            Err(message) => Err(MediaError::classifier_unavailable(message.clone())),
        }
    }

    /// Whether a load has been attempted and succeeded.
    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }
}

impl std::fmt::Debug for ClassifierService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierService")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{CascadeParams, SearchWindow};
    use crate::decode::GrayFrame;
    use facemark_models::{FaceCandidate, Point};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullClassifier;

    impl ClassifierCapability for NullClassifier {
        fn name(&self) -> &'static str {
            "null"
        }

        fn detect_face_candidates(&self, _: &GrayFrame, _: &CascadeParams) -> Vec<FaceCandidate> {
            Vec::new()
        }

        fn locate_pupil(&self, _: &GrayFrame, _: &SearchWindow, _: u32) -> Point {
            Point::NOT_FOUND
        }

        fn landmark_cascade_count(&self, _: &str) -> usize {
            0
        }

        fn locate_landmark_point(
            &self,
            _: &GrayFrame,
            _: &str,
            _: usize,
            _: Point,
            _: Point,
            _: u32,
        ) -> Point {
            Point::NOT_FOUND
        }
    }

    #[test]
    fn test_loader_runs_once_under_concurrency() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let service = ClassifierService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(NullClassifier) as Arc<dyn ClassifierCapability>)
        });

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert_eq!(service.get().unwrap().name(), "null");
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(service.is_loaded());
    }

    #[test]
    fn test_load_failure_is_remembered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let service = ClassifierService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(MediaError::classifier_unavailable("model missing"))
        });

        for _ in 0..3 {
            let Err(err) = service.get() else {
                panic!("expected the load to fail");
            };
            assert!(matches!(err, MediaError::ClassifierUnavailable(ref m) if m.contains("model missing")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!service.is_loaded());
    }

    #[test]
    fn test_preloaded_never_calls_loader() {
        let service = ClassifierService::preloaded(Arc::new(NullClassifier));
        assert!(service.is_loaded());
        assert_eq!(service.get().unwrap().name(), "null");
    }
}
