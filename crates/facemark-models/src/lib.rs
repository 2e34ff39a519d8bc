//! Shared data models for the facemark service.
//!
//! This crate provides Serde-serializable types for:
//! - Pixel geometry (points and face regions)
//! - Raw classifier candidates and canonical per-face detections
//! - The cached pipeline result
//! - Content fingerprints used as cache keys
//!
//! All coordinates use `row` (vertical) and `col` (horizontal) pixel
//! positions in the source image.

pub mod detection;
pub mod fingerprint;
pub mod geometry;
pub mod result;

pub use detection::{Detection, FaceCandidate};
pub use fingerprint::{Fingerprint, FingerprintParseError, FINGERPRINT_BYTES};
pub use geometry::{BoundingRegion, Point};
pub use result::PipelineResult;
