//! Intensity-based point refinement.
//!
//! Pupils, mouth landmarks and the nose tip are localized by searching for
//! the darkest 3x3 neighbourhood inside a square window. The search is
//! repeated over `perturbations` deterministically jittered windows and the
//! per-axis median of the hits is reported.
//!
//! Landmark windows are placed in the eye-axis frame: for pupils `L` and
//! `R`, with midpoint `C`, inter-ocular distance `d`, unit axis `u` from `L`
//! to `R` and unit normal `v` pointing down the face, an anchor `(a, b)`
//! sits at `C + a*d*u + b*d*v`.

use facemark_models::Point;

use super::SearchWindow;
use crate::decode::GrayFrame;

/// Landmark window side relative to the inter-ocular distance.
const LANDMARK_WINDOW: f32 = 0.35;

/// Maximum window shift under jitter, as a fraction of the side.
const JITTER_SHIFT: f32 = 0.075;

/// Maximum relative change of the window side under jitter.
const JITTER_SCALE: f32 = 0.1;

/// Samples per window side; larger windows are scanned with a coarser step.
const SAMPLES_PER_SIDE: i32 = 16;

/// A named landmark family and the eye-axis anchor of each sub-cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFamily {
    pub name: &'static str,
    pub anchors: &'static [(f32, f32)],
}

impl LandmarkFamily {
    pub fn cascade_count(&self) -> usize {
        self.anchors.len()
    }
}

/// Families shipped with the bundled backend.
pub const DEFAULT_FAMILIES: &[LandmarkFamily] = &[
    LandmarkFamily {
        name: "lp93",
        anchors: &[(0.0, 0.95)],
    },
    LandmarkFamily {
        name: "lp84",
        anchors: &[(-0.4, 1.0)],
    },
    LandmarkFamily {
        name: "lp82",
        anchors: &[(0.4, 1.0)],
    },
    LandmarkFamily {
        name: "lp81",
        anchors: &[(0.0, 0.8), (0.0, 1.15)],
    },
];

/// Eye-axis anchor of the nose tip.
pub const NOSE_ANCHOR: (f32, f32) = (0.0, 0.55);

/// Darkest-neighbourhood point refiner.
#[derive(Debug, Clone)]
pub struct IntensityRefiner {
    families: Vec<LandmarkFamily>,
}

impl Default for IntensityRefiner {
    fn default() -> Self {
        Self::new(DEFAULT_FAMILIES.to_vec())
    }
}

impl IntensityRefiner {
    pub fn new(families: Vec<LandmarkFamily>) -> Self {
        Self { families }
    }

    pub fn family(&self, name: &str) -> Option<&LandmarkFamily> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Refine a point inside `window`.
    pub fn refine(&self, frame: &GrayFrame, window: &SearchWindow, perturbations: u32) -> Point {
        if frame.is_empty() || window.scale < 1.0 {
            return Point::NOT_FOUND;
        }

        let mut jitter = Jitter::new();
        let mut rows = Vec::new();
        let mut cols = Vec::new();

        for i in 0..perturbations.max(1) {
            // The first pass always uses the unperturbed window.
            let (row, col, side) = if i == 0 {
                (window.row as f32, window.col as f32, window.scale)
            } else {
                let side = window.scale * (1.0 + JITTER_SCALE * jitter.next_unit());
                let row = window.row as f32 + JITTER_SHIFT * window.scale * jitter.next_unit();
                let col = window.col as f32 + JITTER_SHIFT * window.scale * jitter.next_unit();
                (row, col, side)
            };

            if let Some((r, c)) = darkest_neighbourhood(frame, row, col, side) {
                rows.push(r);
                cols.push(c);
            }
        }

        match (median(&mut rows), median(&mut cols)) {
            (Some(row), Some(col)) => Point::new(row, col),
            _ => Point::NOT_FOUND,
        }
    }

    /// Refine a point anchored in the eye-axis frame.
    pub fn anchored(
        &self,
        frame: &GrayFrame,
        left_eye: Point,
        right_eye: Point,
        anchor: (f32, f32),
        perturbations: u32,
    ) -> Point {
        if !left_eye.is_found() || !right_eye.is_found() {
            return Point::NOT_FOUND;
        }

        let dr = (right_eye.row - left_eye.row) as f32;
        let dc = (right_eye.col - left_eye.col) as f32;
        let distance = (dr * dr + dc * dc).sqrt();
        if distance < 1.0 {
            return Point::NOT_FOUND;
        }

        let (ur, uc) = (dr / distance, dc / distance);
        let (vr, vc) = (uc, -ur);
        let center_row = (left_eye.row + right_eye.row) as f32 / 2.0;
        let center_col = (left_eye.col + right_eye.col) as f32 / 2.0;

        let (a, b) = anchor;
        let row = center_row + a * distance * ur + b * distance * vr;
        let col = center_col + a * distance * uc + b * distance * vc;

        let window = SearchWindow::new(row.floor() as i32, col.floor() as i32, LANDMARK_WINDOW * distance);
        self.refine(frame, &window, perturbations)
    }

    /// Refine sub-cascade `index` of `family`.
    pub fn landmark(
        &self,
        frame: &GrayFrame,
        family: &str,
        index: usize,
        left_eye: Point,
        right_eye: Point,
        perturbations: u32,
    ) -> Point {
        match self.family(family).and_then(|f| f.anchors.get(index)) {
            Some(anchor) => self.anchored(frame, left_eye, right_eye, *anchor, perturbations),
            None => Point::NOT_FOUND,
        }
    }
}

/// Darkest 3x3 neighbourhood inside a square window, restricted to the
/// frame interior. Ties resolve to the first hit in scan order.
fn darkest_neighbourhood(frame: &GrayFrame, row: f32, col: f32, side: f32) -> Option<(i32, i32)> {
    let rows = frame.rows() as i32;
    let cols = frame.cols() as i32;
    if rows < 3 || cols < 3 {
        return None;
    }

    let half = side / 2.0;
    let top = ((row - half).floor() as i32).max(1);
    let bottom = ((row + half).floor() as i32).min(rows - 2);
    let left = ((col - half).floor() as i32).max(1);
    let right = ((col + half).floor() as i32).min(cols - 2);
    if top > bottom || left > right {
        return None;
    }

    let step = ((side as i32) / SAMPLES_PER_SIDE).max(1) as usize;
    let mut best: Option<(u32, i32, i32)> = None;

    for r in (top..=bottom).step_by(step) {
        for c in (left..=right).step_by(step) {
            let mut total = 0u32;
            for dr in -1..=1 {
                for dc in -1..=1 {
                    total += u32::from(frame.get(r + dr, c + dc).unwrap_or(u8::MAX));
                }
            }
            if best.map_or(true, |(b, _, _)| total < b) {
                best = Some((total, r, c));
            }
        }
    }

    best.map(|(_, r, c)| (r, c))
}

fn median(values: &mut [i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    Some(values[values.len() / 2])
}

/// Fixed-seed xorshift sequence so identical inputs give identical output.
struct Jitter(u32);

impl Jitter {
    fn new() -> Self {
        Self(0x9E37_79B9)
    }

    /// Next value in `[-1, 1]`.
    fn next_unit(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}
