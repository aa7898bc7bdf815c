use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::OVERLAY_PADDING;

/// Frame-to-display scale, recomputed for every display event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalingFactor {
    pub x: f64,
    pub y: f64,
}

impl ScalingFactor {
    /// Returns `None` when any dimension is zero (layout transients).
    pub fn between(frame_w: u32, frame_h: u32, display_w: u32, display_h: u32) -> Option<Self> {
        if frame_w == 0 || frame_h == 0 || display_w == 0 || display_h == 0 {
            return None;
        }
        Some(Self {
            x: display_w as f64 / frame_w as f64,
            y: display_h as f64 / frame_h as f64,
        })
    }
}

/// A face box positioned in display-surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Maps tracker output onto the preview surface.
///
/// Boxes are enlarged by a fixed cosmetic margin before scaling so the
/// outline sits around the face rather than on it.
#[derive(Clone, Copy, Debug)]
pub struct OverlayMapper {
    padding: u32,
}

impl OverlayMapper {
    pub fn new(padding: u32) -> Self {
        Self { padding }
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    pub fn map(
        &self,
        boxes: &[BoundingBox],
        frame_w: u32,
        frame_h: u32,
        display_w: u32,
        display_h: u32,
    ) -> Vec<DisplayBox> {
        let Some(scale) = ScalingFactor::between(frame_w, frame_h, display_w, display_h) else {
            return Vec::new();
        };
        let pad = self.padding as f64;
        boxes
            .iter()
            .map(|b| DisplayBox {
                x: b.x as f64 * scale.x,
                y: b.y as f64 * scale.y,
                width: (b.width as f64 + pad) * scale.x,
                height: (b.height as f64 + pad) * scale.y,
            })
            .collect()
    }
}

impl Default for OverlayMapper {
    fn default() -> Self {
        Self::new(OVERLAY_PADDING)
    }
}
