//! Download of submitted image URLs.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::security::is_restricted_url;

const MAX_REDIRECTS: usize = 5;

/// HTTP client for `/submit` image URLs with a size cap.
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl ImageFetcher {
    /// Build a fetcher. When `allow_private` is false, redirects into
    /// restricted address ranges are not followed.
    pub fn new(timeout: Duration, max_bytes: usize, allow_private: bool) -> ApiResult<Self> {
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if !allow_private && is_restricted_url(attempt.url()) {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .timeout(timeout)
            .redirect(policy)
            .user_agent(concat!("facemark/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, max_bytes })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Download the body of `url`, failing on non-2xx or oversized responses.
    pub async fn fetch(&self, url: &Url) -> ApiResult<Vec<u8>> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ApiError::bad_gateway(format!("image fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Image fetch returned error status");
            return Err(ApiError::bad_gateway(format!(
                "image fetch returned {}",
                status
            )));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(self.too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ApiError::bad_gateway(format!("image fetch interrupted: {}", e)))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = body.len(), "Fetched image");
        Ok(body)
    }

    fn too_large(&self) -> ApiError {
        ApiError::payload_too_large(format!("image exceeds {} bytes", self.max_bytes))
    }
}
