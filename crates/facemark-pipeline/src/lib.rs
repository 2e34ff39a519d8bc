//! Detection pipeline orchestration.
//!
//! This crate provides:
//! - `PipelineOrchestrator`: fingerprint, cache lookup, detect, render, cache fill
//! - Environment-driven configuration for every pipeline component
//! - Structured per-run logging and Prometheus-style metrics
//! - The `facemark-detect` command line tool

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;

pub use config::PipelineConfig;
pub use error::{PipelineError, RunResult};
pub use logging::RequestLogger;
pub use orchestrator::{output_file_name, PipelineOrchestrator, PipelineOutcome, PipelineStage};
