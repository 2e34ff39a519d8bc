//! Detection endpoints: multipart upload and URL submission.

use std::io::Write;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};
use validator::Validate;

use facemark_models::PipelineResult;
use facemark_pipeline::PipelineOutcome;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{allowed_extension, validate_image_url, EXTENSION_HINT};
use crate::state::AppState;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

/// Route prefix under which output images are served.
pub const IMAGES_ROUTE: &str = "/images";

/// Response for both detection endpoints.
///
/// Carries the cached [`PipelineResult`] fields unchanged, plus per-request
/// details.
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(flatten)]
    pub result: PipelineResult,
    /// URL path of the annotated preview, empty when rendering failed
    pub output_url: String,
    /// Wall time for the request in milliseconds
    pub time_took: u64,
    /// Whether the result came from the cache
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_error: Option<String>,
}

impl DetectResponse {
    fn from_outcome(outcome: PipelineOutcome, start: Instant) -> Self {
        let output_url = if outcome.result.output_image.is_empty() {
            String::new()
        } else {
            format!("{}/{}", IMAGES_ROUTE, outcome.result.output_image)
        };
        Self {
            result: outcome.result,
            output_url,
            time_took: start.elapsed().as_millis() as u64,
            cached: outcome.cached,
            render_error: outcome.render_error,
        }
    }
}

/// `POST /submit` form.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitForm {
    #[validate(url, length(max = 2048))]
    pub image_url: String,
}

/// Run detection on an uploaded image (`multipart/form-data`, field `file`).
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    let start = Instant::now();

    let (file_name, bytes) = read_upload_field(&mut multipart).await?;
    let extension =
        allowed_extension(&file_name).ok_or_else(|| ApiError::bad_request(EXTENSION_HINT))?;

    info!(file_name = %file_name, bytes = bytes.len(), "Received upload");

    let outcome = run_with_temp_file(&state, bytes, &extension).await?;
    Ok(Json(DetectResponse::from_outcome(outcome, start)))
}

/// Run detection on an image fetched from a URL (form field `image_url`).
pub async fn submit(
    State(state): State<AppState>,
    Form(form): Form<SubmitForm>,
) -> ApiResult<Json<DetectResponse>> {
    let start = Instant::now();

    form.validate()
        .map_err(|e| ApiError::bad_request(format!("invalid image_url: {}", e)))?;
    let url = validate_image_url(&form.image_url, state.config.allow_private_urls)
        .map_err(ApiError::bad_request)?;
    let extension =
        allowed_extension(url.path()).ok_or_else(|| ApiError::bad_request(EXTENSION_HINT))?;

    let bytes = state.fetcher.fetch(&url).await?;
    metrics::record_image_fetch(bytes.len());
    info!(url = %url, bytes = bytes.len(), "Fetched submitted image");

    let outcome = run_with_temp_file(&state, Bytes::from(bytes), &extension).await?;
    Ok(Json(DetectResponse::from_outcome(outcome, start)))
}

/// Fallback for unknown routes.
pub async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::not_found(uri.path().to_string())
}

async fn read_upload_field(multipart: &mut Multipart) -> ApiResult<(String, Bytes)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("uploaded file is empty"));
        }
        return Ok((file_name, bytes));
    }
    Err(ApiError::bad_request(format!(
        "missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::bad_request(format!("invalid input file: {}", e.body_text()))
    }
}

/// Write the input to a request-scoped temp file and run the pipeline on it.
///
/// The file is removed when the handle drops, whether or not the run succeeded.
async fn run_with_temp_file(
    state: &AppState,
    bytes: Bytes,
    extension: &str,
) -> ApiResult<PipelineOutcome> {
    let temp_dir = state.config.temp_dir.clone();
    let suffix = format!(".{}", extension);

    let temp = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
        std::fs::create_dir_all(&temp_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("input-")
            .suffix(&suffix)
            .tempfile_in(&temp_dir)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(file)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))?
    .map_err(|e| ApiError::internal(format!("temporary file creation failed: {}", e)))?;

    let outcome = state.orchestrator.run_file(temp.path()).await?;

    if let Some(err) = &outcome.render_error {
        warn!(fingerprint = %outcome.fingerprint, error = %err, "Preview not rendered");
    }

    Ok(outcome)
}
