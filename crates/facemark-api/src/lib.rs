//! Axum HTTP API for face landmark detection.
//!
//! This crate provides:
//! - `POST /upload` (multipart) and `POST /submit` (image URL) detection endpoints
//! - Static serving of annotated previews under `/images`
//! - Liveness, readiness and Prometheus metrics endpoints
//! - Per-IP rate limiting, request ids and security headers

pub mod config;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use fetch::ImageFetcher;
pub use routes::create_router;
pub use state::AppState;
