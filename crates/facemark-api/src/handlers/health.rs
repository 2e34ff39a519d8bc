//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub cache: CheckStatus,
    pub classifier: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(backend: &str, latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            backend: Some(backend.to_string()),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(backend: Option<&str>, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            backend: backend.map(str::to_string),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness).
///
/// Pings the result cache and makes sure the classifier model is loaded,
/// loading it on first call. Only a classifier failure answers 503; a cache
/// outage is reported as degraded while detection keeps serving uncached.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let cache = state.orchestrator.cache();
    let cache_check = {
        let start = Instant::now();
        match cache.health_check().await {
            Ok(()) => CheckStatus::ok(cache.backend(), start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(Some(cache.backend()), e.to_string()),
        }
    };

    let classifier = state.orchestrator.classifier().clone();
    let classifier_check = {
        let start = Instant::now();
        match tokio::task::spawn_blocking(move || classifier.get()).await {
            Ok(Ok(loaded)) => CheckStatus::ok(loaded.name(), start.elapsed().as_millis() as u64),
            Ok(Err(e)) => CheckStatus::error(None, e.to_string()),
            Err(e) => CheckStatus::error(None, e.to_string()),
        }
    };

    let serving = classifier_check.is_ok();
    let all_ok = serving && cache_check.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            cache: cache_check,
            classifier: classifier_check,
        },
    };

    if serving {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
