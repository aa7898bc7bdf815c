use std::io::Write;

use crate::capture::domain::frame_source::ImageHandle;
use crate::shared::error::CaptureError;

/// Destination for finished crops.
///
/// `create_unique` must never hand out a name that is already in use, even
/// when called concurrently.
pub trait CropStorage: Send + Sync {
    fn create_unique(&self, suffix: &str) -> Result<ImageHandle, CaptureError>;

    fn open_write(&self, handle: &ImageHandle) -> Result<Box<dyn Write + Send>, CaptureError>;

    /// Discards a crop whose write did not complete.
    fn remove(&self, handle: &ImageHandle) -> Result<(), CaptureError>;
}
