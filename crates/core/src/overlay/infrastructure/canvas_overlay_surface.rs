use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::overlay::domain::overlay_mapper::DisplayBox;
use crate::overlay::domain::overlay_surface::OverlaySurface;
use crate::shared::constants::{OVERLAY_STROKE_RGBA, OVERLAY_STROKE_WIDTH};
use crate::shared::error::CaptureError;

/// Rasterises the overlay into a transparent RGBA canvas the size of the
/// display.
///
/// Outlines only; the interior stays transparent so the canvas can be
/// composited over the preview.
#[derive(Clone)]
pub struct CanvasOverlaySurface {
    canvas: RgbaImage,
    boxes: Vec<DisplayBox>,
    stroke: Rgba<u8>,
    stroke_width: u32,
    redraws: usize,
}

impl CanvasOverlaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            boxes: Vec::new(),
            stroke: Rgba(OVERLAY_STROKE_RGBA),
            stroke_width: OVERLAY_STROKE_WIDTH,
            redraws: 0,
        }
    }

    pub fn with_stroke(mut self, rgba: [u8; 4], width: u32) -> Self {
        self.stroke = Rgba(rgba);
        self.stroke_width = width.max(1);
        self
    }

    /// Display resize: the canvas is reallocated and the current overlay
    /// is dropped until the next update arrives with fresh scaling.
    pub fn set_display_size(&mut self, width: u32, height: u32) {
        self.canvas = RgbaImage::new(width, height);
        self.boxes.clear();
    }

    pub fn boxes(&self) -> &[DisplayBox] {
        &self.boxes
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Number of times the overlay has been replaced or cleared.
    pub fn redraws(&self) -> usize {
        self.redraws
    }

    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        self.canvas.save(path).map_err(CaptureError::EncodeFailure)
    }

    fn draw_outline(&mut self, b: &DisplayBox) {
        let (cw, ch) = (self.canvas.width() as i64, self.canvas.height() as i64);
        let x0 = b.x.floor() as i64;
        let y0 = b.y.floor() as i64;
        let x1 = (b.x + b.width).floor() as i64;
        let y1 = (b.y + b.height).floor() as i64;
        let t = self.stroke_width as i64;

        for py in y0.max(0)..y1.min(ch) {
            for px in x0.max(0)..x1.min(cw) {
                let on_edge = px < x0 + t || px >= x1 - t || py < y0 + t || py >= y1 - t;
                if on_edge {
                    self.canvas.put_pixel(px as u32, py as u32, self.stroke);
                }
            }
        }
    }

    fn wipe(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }
}

impl OverlaySurface for CanvasOverlaySurface {
    fn display_size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn replace_overlay(&mut self, boxes: &[DisplayBox]) {
        self.wipe();
        for b in boxes {
            self.draw_outline(b);
        }
        self.boxes = boxes.to_vec();
        self.redraws += 1;
    }

    fn clear_overlay(&mut self) {
        self.wipe();
        self.boxes.clear();
        self.redraws += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YELLOW: [u8; 4] = [255, 255, 0, 255];
    const EMPTY: [u8; 4] = [0, 0, 0, 0];

    fn display_box(x: f64, y: f64, w: f64, h: f64) -> DisplayBox {
        DisplayBox {
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[test]
    fn test_draws_outline_not_interior() {
        let mut surface = CanvasOverlaySurface::new(20, 20).with_stroke(YELLOW, 1);
        surface.replace_overlay(&[display_box(2.0, 2.0, 10.0, 10.0)]);

        let c = surface.canvas();
        assert_eq!(c.get_pixel(2, 2).0, YELLOW);
        assert_eq!(c.get_pixel(11, 5).0, YELLOW);
        assert_eq!(c.get_pixel(5, 11).0, YELLOW);
        assert_eq!(c.get_pixel(6, 6).0, EMPTY);
        assert_eq!(c.get_pixel(12, 12).0, EMPTY);
    }

    #[test]
    fn test_replace_removes_previous_boxes() {
        let mut surface = CanvasOverlaySurface::new(20, 20).with_stroke(YELLOW, 1);
        surface.replace_overlay(&[display_box(0.0, 0.0, 5.0, 5.0)]);
        surface.replace_overlay(&[display_box(10.0, 10.0, 5.0, 5.0)]);

        assert_eq!(surface.canvas().get_pixel(0, 0).0, EMPTY);
        assert_eq!(surface.canvas().get_pixel(10, 10).0, YELLOW);
        assert_eq!(surface.boxes().len(), 1);
        assert_eq!(surface.redraws(), 2);
    }

    #[test]
    fn test_boxes_clip_at_canvas_edges() {
        let mut surface = CanvasOverlaySurface::new(10, 10).with_stroke(YELLOW, 2);
        surface.replace_overlay(&[display_box(-5.0, -5.0, 30.0, 30.0)]);
        // Every visible edge is outside the stroke band, so nothing is drawn.
        assert!(surface.canvas().pixels().all(|p| p.0 == EMPTY));

        surface.replace_overlay(&[display_box(5.0, -5.0, 30.0, 30.0)]);
        assert_eq!(surface.canvas().get_pixel(5, 0).0, YELLOW);
        assert_eq!(surface.canvas().get_pixel(7, 0).0, EMPTY);
    }

    #[test]
    fn test_clear_wipes_canvas() {
        let mut surface = CanvasOverlaySurface::new(10, 10);
        surface.replace_overlay(&[display_box(1.0, 1.0, 8.0, 8.0)]);
        surface.clear_overlay();
        assert!(surface.boxes().is_empty());
        assert!(surface.canvas().pixels().all(|p| p.0 == EMPTY));
    }

    #[test]
    fn test_resize_changes_display_size_and_drops_overlay() {
        let mut surface = CanvasOverlaySurface::new(10, 10);
        surface.replace_overlay(&[display_box(1.0, 1.0, 8.0, 8.0)]);
        surface.set_display_size(30, 15);
        assert_eq!(surface.display_size(), (30, 15));
        assert!(surface.boxes().is_empty());
    }

    #[test]
    fn test_save_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let mut surface = CanvasOverlaySurface::new(8, 6);
        surface.replace_overlay(&[display_box(0.0, 0.0, 8.0, 6.0)]);
        surface.save(&path).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (8, 6));
    }
}
