use std::path::PathBuf;

use crate::extraction::domain::upload_sink::UploadSink;
use crate::shared::error::CaptureError;

/// Publishes crops by copying them into a directory under their names.
pub struct DirectoryUploadSink {
    destination: PathBuf,
}

impl DirectoryUploadSink {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

impl UploadSink for DirectoryUploadSink {
    fn upload(&mut self, items: &[(String, PathBuf)]) -> Result<usize, CaptureError> {
        std::fs::create_dir_all(&self.destination)
            .map_err(|e| CaptureError::io(&self.destination, e))?;
        for (name, path) in items {
            let target = self.destination.join(name);
            std::fs::copy(path, &target).map_err(|e| CaptureError::io(path, e))?;
            log::debug!("Uploaded {} -> {}", path.display(), target.display());
        }
        log::info!(
            "Uploaded {} crops to {}",
            items.len(),
            self.destination.display()
        );
        Ok(items.len())
    }
}
