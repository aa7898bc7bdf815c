use std::path::{Path, PathBuf};

use crate::shared::error::CaptureError;
use crate::shared::frame::Frame;
use crate::shared::pixel_format::PixelFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

/// Opaque reference to an encoded still image held by the storage
/// collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    path: PathBuf,
}

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used when handing the image to an upload sink.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A live stream of frames with a fixed resolution.
///
/// Implementations own the device lifecycle. `next_frame` blocks until the
/// next frame is available and returns `None` once the stream has ended.
pub trait FrameSource: Send {
    fn initialize(&mut self) -> Result<FrameDimensions, CaptureError>;

    fn start_preview(&mut self) -> Result<(), CaptureError>;

    fn stop_preview(&mut self) -> Result<(), CaptureError>;

    fn is_preview_active(&self) -> bool;

    fn next_frame(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Option<Frame>, CaptureError>;

    /// Captures a full-resolution still and returns its encoded form.
    fn capture_photo(&mut self) -> Result<ImageHandle, CaptureError>;
}
