//! Pixel geometry shared by the detector, locator and renderer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A pixel coordinate. `row` is the vertical position, `col` the horizontal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub row: i32,
    pub col: i32,
}

impl Point {
    /// Sentinel returned by sub-detectors that failed to localize a point.
    pub const NOT_FOUND: Point = Point { row: 0, col: 0 };

    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// A point is usable only when both coordinates are strictly positive.
    pub fn is_found(&self) -> bool {
        self.row > 0 && self.col > 0
    }

    /// `Some(self)` when found, `None` for sentinels.
    pub fn found(self) -> Option<Self> {
        self.is_found().then_some(self)
    }
}

/// A face region in pixels.
///
/// `row`/`col` locate the region **center**, matching what the cascade
/// classifier reports. Square regions have `width == height == scale()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BoundingRegion {
    pub row: i32,
    pub col: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingRegion {
    pub fn new(row: i32, col: i32, width: i32, height: i32) -> Self {
        Self {
            row,
            col,
            width,
            height,
        }
    }

    /// Square region centered on `(row, col)` with side `scale`.
    pub fn square(row: i32, col: i32, scale: i32) -> Self {
        Self::new(row, col, scale, scale)
    }

    /// Build a region from a top-left corner and size.
    pub fn from_top_left(top: i32, left: i32, width: i32, height: i32) -> Self {
        Self::new(top + height / 2, left + width / 2, width, height)
    }

    /// Characteristic size used by the feature gates and window geometry.
    pub fn scale(&self) -> i32 {
        self.width.max(self.height)
    }

    /// Top-left corner as `(row, col)`.
    pub fn top_left(&self) -> Point {
        Point::new(self.row - self.height / 2, self.col - self.width / 2)
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width.max(0)) * i64::from(self.height.max(0))
    }

    /// Intersection-over-union with another region.
    pub fn iou(&self, other: &BoundingRegion) -> f64 {
        let a = self.top_left();
        let b = other.top_left();

        let top = a.row.max(b.row);
        let left = a.col.max(b.col);
        let bottom = (a.row + self.height).min(b.row + other.height);
        let right = (a.col + self.width).min(b.col + other.width);

        if bottom <= top || right <= left {
            return 0.0;
        }

        let intersection = i64::from(bottom - top) * i64::from(right - left);
        let union = self.area() + other.area() - intersection;
        if union <= 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_found() {
        assert!(Point::new(10, 12).is_found());
        assert!(!Point::NOT_FOUND.is_found());
        assert!(!Point::new(0, 12).is_found());
        assert!(!Point::new(-3, 12).is_found());
        assert_eq!(Point::new(4, 0).found(), None);
        assert_eq!(Point::new(4, 5).found(), Some(Point::new(4, 5)));
    }

    #[test]
    fn test_region_center_and_corner() {
        let region = BoundingRegion::square(100, 200, 50);
        assert_eq!(region.scale(), 50);
        assert_eq!(region.top_left(), Point::new(75, 175));

        let from_corner = BoundingRegion::from_top_left(75, 175, 50, 50);
        assert_eq!(from_corner, region);
    }

    #[test]
    fn test_scale_uses_larger_side() {
        let region = BoundingRegion::new(10, 10, 40, 60);
        assert_eq!(region.scale(), 60);
    }

    #[test]
    fn test_iou() {
        let a = BoundingRegion::square(50, 50, 20);
        assert!((a.iou(&a) - 1.0).abs() < 1e-9);

        let far = BoundingRegion::square(500, 500, 20);
        assert_eq!(a.iou(&far), 0.0);

        // Shifted by half a side: overlap 10x20 = 200, union 600
        let half = BoundingRegion::square(50, 60, 20);
        assert!((a.iou(&half) - 200.0 / 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_serde_uses_row_col() {
        let json = serde_json::to_string(&Point::new(3, 4)).unwrap();
        assert_eq!(json, r#"{"row":3,"col":4}"#);
    }
}
