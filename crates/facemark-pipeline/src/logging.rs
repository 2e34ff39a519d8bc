//! Structured run logging.
//!
//! Consistent lifecycle logs for a single pipeline run, keyed by a run id
//! and the input fingerprint.

use tracing::{info, warn, Span};
use uuid::Uuid;

use facemark_models::Fingerprint;

use crate::orchestrator::PipelineStage;

/// Per-run logger carrying the run id and fingerprint.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    run_id: String,
    fingerprint: String,
}

impl RequestLogger {
    pub fn new(fingerprint: &Fingerprint) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            fingerprint: fingerprint.to_string(),
        }
    }

    pub fn log_start(&self, size: usize) {
        info!(
            run_id = %self.run_id,
            fingerprint = %self.fingerprint,
            size,
            "Run started"
        );
    }

    /// Log a state transition.
    pub fn log_stage(&self, stage: PipelineStage) {
        tracing::debug!(
            run_id = %self.run_id,
            fingerprint = %self.fingerprint,
            stage = stage.as_str(),
            "Run stage"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            fingerprint = %self.fingerprint,
            "Run warning: {}", message
        );
    }

    pub fn log_completion(&self, cached: bool, faces: usize, elapsed_ms: u64) {
        info!(
            run_id = %self.run_id,
            fingerprint = %self.fingerprint,
            cached,
            faces,
            elapsed_ms,
            "Run completed"
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "pipeline_run",
            run_id = %self.run_id,
            fingerprint = %self.fingerprint
        )
    }
}
