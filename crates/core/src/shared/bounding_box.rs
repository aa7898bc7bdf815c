use serde::{Deserialize, Serialize};

/// A detected face rectangle in frame-pixel coordinates.
///
/// Detector output is not pre-clamped: `x`/`y` may be negative and the box
/// may extend past the frame edges. Width and height are always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        debug_assert!(width > 0 && height > 0, "bounding box must have positive size");
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

/// Extra margin around a box before cropping, in pixels per side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Padding {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn uniform(pixels: u32) -> Self {
        Self::new(pixels, pixels, pixels, pixels)
    }
}
