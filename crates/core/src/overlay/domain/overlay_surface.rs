use crate::overlay::domain::overlay_mapper::DisplayBox;

/// The preview surface the overlay is drawn on.
///
/// Only the rendering context touches it, so implementations need not be
/// thread-safe.
pub trait OverlaySurface {
    /// Current display size; may be zero while layout is in flux.
    fn display_size(&self) -> (u32, u32);

    /// Replaces the entire overlay set with `boxes`.
    fn replace_overlay(&mut self, boxes: &[DisplayBox]);

    fn clear_overlay(&mut self);
}
