//! Content fingerprinting for cache keys.
//!
//! SHA-256 over the exact input bytes, truncated to 128 bits. Byte-identical
//! inputs always share a fingerprint; there is no near-duplicate matching.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::MediaResult;
use facemark_models::Fingerprint;

/// Fingerprint an in-memory image.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let digest = Sha256::digest(bytes);
    Fingerprint::from_digest(&digest)
}

/// Read a file and fingerprint its contents.
///
/// I/O errors are propagated unchanged.
pub async fn fingerprint_file(path: impl AsRef<Path>) -> MediaResult<Fingerprint> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let fingerprint = fingerprint_bytes(&bytes);
    debug!(path = %path.display(), size = bytes.len(), fingerprint = %fingerprint, "Fingerprinted input file");
    Ok(fingerprint)
}
