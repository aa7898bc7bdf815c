use std::path::PathBuf;

use crate::shared::error::CaptureError;

/// Consumer of finished crops, e.g. a cloud bucket.
pub trait UploadSink: Send {
    /// Uploads `(name, path)` pairs and returns how many were accepted.
    fn upload(&mut self, items: &[(String, PathBuf)]) -> Result<usize, CaptureError>;
}
