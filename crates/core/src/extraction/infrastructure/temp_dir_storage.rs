use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::capture::domain::frame_source::ImageHandle;
use crate::extraction::domain::crop_storage::CropStorage;
use crate::shared::error::CaptureError;

const FILE_PREFIX: &str = "face-";

/// Stores crops as files in one directory with collision-free random names.
pub struct TempDirStorage {
    dir: PathBuf,
}

impl TempDirStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CaptureError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// `<system temp>/facecap`.
    pub fn in_system_temp() -> Result<Self, CaptureError> {
        Self::new(std::env::temp_dir().join("facecap"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CropStorage for TempDirStorage {
    fn create_unique(&self, suffix: &str) -> Result<ImageHandle, CaptureError> {
        let file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.dir)
            .map_err(|e| CaptureError::io(&self.dir, e))?;
        let (_, path) = file
            .keep()
            .map_err(|e| CaptureError::io(&self.dir, e.error))?;
        Ok(ImageHandle::new(path))
    }

    fn open_write(&self, handle: &ImageHandle) -> Result<Box<dyn Write + Send>, CaptureError> {
        let file = File::create(handle.path()).map_err(|e| CaptureError::io(handle.path(), e))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn remove(&self, handle: &ImageHandle) -> Result<(), CaptureError> {
        std::fs::remove_file(handle.path()).map_err(|e| CaptureError::io(handle.path(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = TempDirStorage::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(storage.dir(), nested.as_path());
    }

    #[test]
    fn test_names_are_unique_and_suffixed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TempDirStorage::new(dir.path()).unwrap();

        let names: HashSet<String> = (0..50)
            .map(|_| storage.create_unique(".jpg").unwrap().name())
            .collect();

        assert_eq!(names.len(), 50);
        assert!(names.iter().all(|n| n.starts_with("face-") && n.ends_with(".jpg")));
    }

    #[test]
    fn test_created_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TempDirStorage::new(dir.path()).unwrap();
        let handle = storage.create_unique(".png").unwrap();
        assert!(handle.path().exists());
        assert_eq!(handle.path().parent(), Some(dir.path()));
    }

    #[test]
    fn test_open_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TempDirStorage::new(dir.path()).unwrap();
        let handle = storage.create_unique(".bin").unwrap();
        {
            let mut out = storage.open_write(&handle).unwrap();
            out.write_all(b"crop").unwrap();
            out.flush().unwrap();
        }
        assert_eq!(std::fs::read(handle.path()).unwrap(), b"crop");
    }

    #[test]
    fn test_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TempDirStorage::new(dir.path()).unwrap();
        let handle = storage.create_unique(".jpg").unwrap();

        storage.remove(&handle).unwrap();
        assert!(!handle.path().exists());
        assert!(matches!(
            storage.remove(&handle),
            Err(CaptureError::Io { .. })
        ));
    }

    #[test]
    fn test_concurrent_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TempDirStorage::new(dir.path()).unwrap();
        let names: Vec<String> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        (0..10)
                            .map(|_| storage.create_unique(".jpg").unwrap().name())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), 40);
    }
}
