use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::face_analyzer::{FaceDetector, FaceTracker};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::CaptureError;
use crate::shared::frame::Frame;
use crate::shared::pixel_format::PixelFormat;

/// Pre-recorded boxes keyed by frame index.
pub type Detections = HashMap<usize, Vec<BoundingBox>>;

/// Loads detections from a JSON object of the form
/// `{"0": [{"x": 50, "y": 50, "width": 40, "height": 40}], "1": []}`.
///
/// Boxes without a positive width and height are dropped with a warning.
pub fn load_detections(path: &Path) -> Result<Detections, CaptureError> {
    let json = std::fs::read_to_string(path).map_err(|e| CaptureError::io(path, e))?;
    let mut detections: Detections = serde_json::from_str(&json).map_err(|e| {
        CaptureError::InitializationFailure(format!("{}: {e}", path.display()))
    })?;
    for (index, boxes) in detections.iter_mut() {
        boxes.retain(|b| {
            if !b.is_valid() {
                log::warn!("Dropping empty box {b:?} for frame {index} in {}", path.display());
            }
            b.is_valid()
        });
    }
    Ok(detections)
}

/// Replays recorded detections by frame index.
///
/// Lets the preview and capture paths run without model inference: results
/// come from a file written by an external detector.
pub struct ReplayFaceDetector {
    detections: Arc<Detections>,
    formats: Vec<PixelFormat>,
}

impl ReplayFaceDetector {
    pub fn new(detections: Arc<Detections>) -> Self {
        Self {
            detections,
            formats: vec![PixelFormat::Bgra8, PixelFormat::Gray8],
        }
    }

    pub fn with_formats(mut self, formats: Vec<PixelFormat>) -> Self {
        debug_assert!(!formats.is_empty());
        self.formats = formats;
        self
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn supported_formats(&self) -> &[PixelFormat] {
        &self.formats
    }

    fn detect(&mut self, image: &Frame) -> Result<Vec<BoundingBox>, CaptureError> {
        Ok(self
            .detections
            .get(&image.index())
            .cloned()
            .unwrap_or_default())
    }
}

/// Tracking counterpart of [`ReplayFaceDetector`].
///
/// Keeps the last non-empty result so short gaps in the recording do not
/// make the overlay flicker, up to `max_hold` frames.
pub struct ReplayFaceTracker {
    detections: Arc<Detections>,
    formats: Vec<PixelFormat>,
    max_hold: usize,
    last: Vec<BoundingBox>,
    held: usize,
}

impl ReplayFaceTracker {
    pub fn new(detections: Arc<Detections>) -> Self {
        Self {
            detections,
            formats: vec![PixelFormat::Gray8],
            max_hold: 0,
            last: Vec::new(),
            held: 0,
        }
    }

    pub fn with_formats(mut self, formats: Vec<PixelFormat>) -> Self {
        debug_assert!(!formats.is_empty());
        self.formats = formats;
        self
    }

    pub fn with_max_hold(mut self, frames: usize) -> Self {
        self.max_hold = frames;
        self
    }
}

impl FaceTracker for ReplayFaceTracker {
    fn supported_formats(&self) -> &[PixelFormat] {
        &self.formats
    }

    fn track_next(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, CaptureError> {
        match self.detections.get(&frame.index()) {
            Some(boxes) if !boxes.is_empty() => {
                self.last = boxes.clone();
                self.held = 0;
            }
            _ if self.held < self.max_hold && !self.last.is_empty() => {
                self.held += 1;
            }
            _ => {
                self.last.clear();
                self.held = 0;
            }
        }
        Ok(self.last.clone())
    }
}
