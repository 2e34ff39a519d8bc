//! Input decoding.
//!
//! Produces both the original colour image (for rendering) and the
//! grayscale pixel buffer the classifier works on.

use image::{DynamicImage, GrayImage};

use crate::error::{MediaError, MediaResult};

/// Row-major 8-bit grayscale buffer with known dimensions.
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pixels: Vec<u8>,
    rows: u32,
    cols: u32,
}

impl GrayFrame {
    /// Wrap a raw buffer. Fails when the length does not match `rows * cols`.
    pub fn new(pixels: Vec<u8>, rows: u32, cols: u32) -> MediaResult<Self> {
        let expected = rows as usize * cols as usize;
        if pixels.len() != expected {
            return Err(MediaError::input_decode(format!(
                "pixel buffer has {} bytes, expected {} ({}x{})",
                pixels.len(),
                expected,
                rows,
                cols
            )));
        }
        Ok(Self { pixels, rows, cols })
    }

    pub fn from_luma(image: GrayImage) -> Self {
        let (cols, rows) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            rows,
            cols,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Intensity at `(row, col)`, `None` outside the frame.
    pub fn get(&self, row: i32, col: i32) -> Option<u8> {
        if row < 0 || col < 0 || row as u32 >= self.rows || col as u32 >= self.cols {
            return None;
        }
        self.pixels
            .get(row as usize * self.cols as usize + col as usize)
            .copied()
    }
}

/// A decoded input image.
pub struct DecodedImage {
    pub color: DynamicImage,
    pub gray: GrayFrame,
}

impl DecodedImage {
    pub fn rows(&self) -> u32 {
        self.gray.rows()
    }

    pub fn cols(&self) -> u32 {
        self.gray.cols()
    }
}

/// Decode an encoded image (JPEG, PNG, ...) from memory.
pub fn decode_image(bytes: &[u8]) -> MediaResult<DecodedImage> {
    let color = image::load_from_memory(bytes).map_err(|e| MediaError::input_decode(e.to_string()))?;
    if color.width() == 0 || color.height() == 0 {
        return Err(MediaError::input_decode("image has zero size"));
    }
    let gray = GrayFrame::from_luma(color.to_luma8());
    Ok(DecodedImage { color, gray })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Luma, RgbImage};
    use std::io::Cursor;

    fn encode_png(image: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_reports_rows_and_cols() {
        let bytes = encode_png(&RgbImage::new(40, 30));
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.cols(), 40);
        assert_eq!(decoded.rows(), 30);
        assert_eq!(decoded.gray.pixels().len(), 1200);
    }

    #[test]
    fn test_decode_garbage_is_input_error() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(MediaError::InputDecode(_))));
    }

    #[test]
    fn test_gray_frame_bounds() {
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(2, 1, Luma([200]));
        let frame = GrayFrame::from_luma(img);

        assert_eq!(frame.rows(), 2);
        assert_eq!(frame.cols(), 3);
        assert_eq!(frame.get(1, 2), Some(200));
        assert_eq!(frame.get(2, 0), None);
        assert_eq!(frame.get(0, -1), None);
    }

    #[test]
    fn test_gray_frame_rejects_bad_length() {
        assert!(GrayFrame::new(vec![0; 5], 2, 3).is_err());
        assert!(GrayFrame::new(vec![0; 6], 2, 3).is_ok());
    }
}
