//! Annotated preview rendering.
//!
//! Each render draws on its own [`Canvas`], resizes to the configured output
//! resolution and encodes to PNG or JPEG.

use std::io::{BufWriter, Write};
use std::path::Path;

use facemark_models::{Detection, Point};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageEncoder, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

const FACE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const PUPIL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const EYE_BOX_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

const LINE_WIDTH: u32 = 2;

/// Encoded output format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Map an extension (leading dot optional, any case) to a format.
    ///
    /// An empty extension means JPEG.
    pub fn from_extension(extension: &str) -> MediaResult<Self> {
        let normalized = extension.trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "png" => Ok(Self::Png),
            "" | "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(MediaError::unsupported_format(extension)),
        }
    }

    pub fn from_path(path: &Path) -> MediaResult<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_extension(&extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            jpeg_quality: 100,
        }
    }
}

impl RenderConfig {
    /// Reads `FACEMARK_OUTPUT_WIDTH` and `FACEMARK_OUTPUT_HEIGHT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            width: std::env::var("FACEMARK_OUTPUT_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|w| *w > 0)
                .unwrap_or(defaults.width),
            height: std::env::var("FACEMARK_OUTPUT_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|h| *h > 0)
                .unwrap_or(defaults.height),
            ..defaults
        }
    }
}

/// Request-scoped drawing surface.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// Copy the source into a fresh RGB buffer.
    pub fn from_image(source: &DynamicImage) -> Self {
        Self {
            image: source.to_rgb8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Stroke a rectangle inward from its outer edge.
    pub fn stroke_rect(&mut self, top_left: Point, width: u32, height: u32, line_width: u32, color: Rgb<u8>) {
        for inset in 0..line_width {
            let w = width.saturating_sub(2 * inset);
            let h = height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(top_left.col + inset as i32, top_left.row + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut self.image, rect, color);
        }
    }

    /// Filled dot. Radius is clamped to at least one pixel.
    pub fn fill_dot(&mut self, center: Point, radius: f32, color: Rgb<u8>) {
        let radius = (radius.round() as i32).max(1);
        draw_filled_circle_mut(&mut self.image, (center.col, center.row), radius, color);
    }

    /// Draw every annotation for one detection.
    pub fn draw_detection(&mut self, detection: &Detection) {
        let face = detection.face;
        self.stroke_rect(
            face.top_left(),
            face.width.max(0) as u32,
            face.height.max(0) as u32,
            LINE_WIDTH,
            FACE_COLOR,
        );

        // Eye radius is the pupil search scale.
        let eye_radius = 0.25 * face.scale() as f32;
        for eye in [detection.left_eye, detection.right_eye].into_iter().flatten() {
            self.fill_dot(eye, 0.15 * eye_radius, PUPIL_COLOR);
            let side = (3.0 * eye_radius).round().max(1.0) as u32;
            let half = (side / 2) as i32;
            self.stroke_rect(
                Point::new(eye.row - half, eye.col - half),
                side,
                side,
                LINE_WIDTH,
                EYE_BOX_COLOR,
            );
        }

        let landmark_radius = 0.15 * (eye_radius * 0.5);
        for point in detection.found_mouth_points() {
            self.fill_dot(*point, landmark_radius, LANDMARK_COLOR);
        }
        if let Some(nose) = detection.nose {
            self.fill_dot(nose, landmark_radius, LANDMARK_COLOR);
        }
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Draws detections and encodes the preview.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Annotate `source`, resize and encode into `sink`.
    pub fn render<W: Write>(
        &self,
        source: &DynamicImage,
        detections: &[Detection],
        format: OutputFormat,
        sink: &mut W,
    ) -> MediaResult<()> {
        let mut canvas = Canvas::from_image(source);
        for detection in detections {
            canvas.draw_detection(detection);
        }

        let resized = imageops::resize(
            &canvas.into_image(),
            self.config.width,
            self.config.height,
            FilterType::Lanczos3,
        );

        let (width, height) = resized.dimensions();
        let encoded = match format {
            OutputFormat::Png => {
                PngEncoder::new(sink).write_image(resized.as_raw(), width, height, ColorType::Rgb8)
            }
            OutputFormat::Jpeg => JpegEncoder::new_with_quality(sink, self.config.jpeg_quality)
                .write_image(resized.as_raw(), width, height, ColorType::Rgb8),
        };
        encoded.map_err(|e| MediaError::render_encode(e.to_string()))
    }

    /// Render to a file, choosing the format from its extension.
    ///
    /// The output is written to a temporary file next to `path` and renamed
    /// into place, so readers never observe a partial file.
    pub fn render_to_path(
        &self,
        source: &DynamicImage,
        detections: &[Detection],
        path: &Path,
    ) -> MediaResult<OutputFormat> {
        let format = OutputFormat::from_path(path)?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.render(source, detections, format, &mut writer)?;
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| MediaError::Io(e.error))?;

        debug!(
            path = %path.display(),
            format = format.as_str(),
            faces = detections.len(),
            "Rendered output image"
        );
        Ok(format)
    }
}
