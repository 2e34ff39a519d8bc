//! Pipeline configuration.

use std::path::PathBuf;

use facemark_cache::CacheConfig;
use facemark_media::{CascadeParams, LocatorConfig, RenderConfig, SeetaModelConfig};

/// Configuration for a pipeline orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory receiving annotated output images
    pub output_dir: PathBuf,
    /// Face cascade search parameters
    pub cascade: CascadeParams,
    /// Gating and landmark settings
    pub locator: LocatorConfig,
    /// Output resolution and encoding
    pub render: RenderConfig,
    /// Face model discovery
    pub model: SeetaModelConfig,
    /// Result cache backend
    pub cache: CacheConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/tmp/images/out"),
            cascade: CascadeParams::default(),
            locator: LocatorConfig::default(),
            render: RenderConfig::default(),
            model: SeetaModelConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            output_dir: std::env::var("FACEMARK_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/images/out")),
            cascade: CascadeParams::default(),
            locator: LocatorConfig::from_env(),
            render: RenderConfig::from_env(),
            model: SeetaModelConfig::from_env(),
            cache: CacheConfig::from_env(),
        }
    }
}
