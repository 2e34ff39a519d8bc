//! Run the detection pipeline on one image and print the result as JSON.
//!
//! Usage: `facemark-detect <image>`, or `facemark-detect --schema` to print
//! the JSON schema of the stored result.

use std::path::PathBuf;

use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use facemark_models::PipelineResult;
use facemark_pipeline::{PipelineConfig, PipelineOrchestrator};

#[derive(Serialize)]
struct DetectOutput<'a> {
    fingerprint: &'a str,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    render_error: Option<&'a str>,
    stages: Vec<&'static str>,
    elapsed_ms: u64,
    #[serde(flatten)]
    result: &'a PipelineResult,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for Redis over TLS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(EnvFilter::from_default_env().add_directive("facemark=info".parse()?))
        .init();

    let arg = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: facemark-detect <image> | --schema"))?;

    if arg == "--schema" {
        let schema = schemars::schema_for!(PipelineResult);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }
    let input = PathBuf::from(arg);

    let config = PipelineConfig::from_env();
    let orchestrator = PipelineOrchestrator::from_config(&config)?;
    let outcome = orchestrator.run_file(&input).await?;

    let output = DetectOutput {
        fingerprint: outcome.fingerprint.as_str(),
        cached: outcome.cached,
        render_error: outcome.render_error.as_deref(),
        stages: outcome.stages.iter().map(|s| s.as_str()).collect(),
        elapsed_ms: outcome.elapsed.as_millis() as u64,
        result: &outcome.result,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
