//! Application state.

use std::sync::Arc;

use facemark_pipeline::{PipelineConfig, PipelineOrchestrator};

use crate::config::ApiConfig;
use crate::fetch::ImageFetcher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub fetcher: ImageFetcher,
}

impl AppState {
    /// Create new application state from API and pipeline configuration.
    pub fn new(
        config: ApiConfig,
        pipeline: &PipelineConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let orchestrator = PipelineOrchestrator::from_config(pipeline)?;
        Self::with_orchestrator(config, Arc::new(orchestrator))
    }

    /// Create state around an existing orchestrator.
    pub fn with_orchestrator(
        config: ApiConfig,
        orchestrator: Arc<PipelineOrchestrator>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let fetcher = ImageFetcher::new(
            config.fetch_timeout,
            config.max_body_size,
            config.allow_private_urls,
        )?;

        Ok(Self {
            config,
            orchestrator,
            fetcher,
        })
    }
}
