//! Image analysis for the facemark service.
//!
//! This crate provides:
//! - Content fingerprinting of input images
//! - Decoding to a grayscale pixel buffer
//! - The classifier capability trait, a once-only loader and the bundled
//!   SeetaFace backend
//! - Landmark derivation (quality/size gating, eye windows, mouth and nose)
//! - Annotated preview rendering to PNG or JPEG

pub mod classifier;
pub mod decode;
pub mod error;
pub mod fingerprint;
pub mod locator;
pub mod renderer;

pub use classifier::{
    merge_overlapping, CascadeParams, ClassifierCapability, ClassifierService, SearchWindow,
    SeetaClassifier, SeetaModelConfig,
};
pub use decode::{decode_image, DecodedImage, GrayFrame};
pub use error::{MediaError, MediaResult};
pub use fingerprint::{fingerprint_bytes, fingerprint_file};
pub use locator::{eye_windows, LandmarkLocator, LocatorConfig, DEFAULT_LANDMARK_FAMILIES};
pub use renderer::{Canvas, OutputFormat, RenderConfig, Renderer};
