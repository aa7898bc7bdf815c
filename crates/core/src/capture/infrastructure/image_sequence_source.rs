use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::domain::frame_source::{FrameDimensions, FrameSource, ImageHandle};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::error::CaptureError;
use crate::shared::frame::Frame;
use crate::shared::pixel_format::PixelFormat;

/// Plays a list of image files as a live stream.
///
/// Stands in for a camera: the first file fixes the stream resolution,
/// every frame is resized to the requested size, and `capture_photo`
/// returns the file behind the most recently delivered frame.
#[derive(Debug)]
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    cursor: usize,
    delivered: usize,
    last_file: Option<usize>,
    dimensions: Option<FrameDimensions>,
    active: bool,
    looping: bool,
    frame_interval: Option<Duration>,
}

impl ImageSequenceSource {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            cursor: 0,
            delivered: 0,
            last_file: None,
            dimensions: None,
            active: false,
            looping: false,
            frame_interval: None,
        }
    }

    /// Collects image files from `dir` in name order.
    pub fn from_dir(dir: &Path) -> Result<Self, CaptureError> {
        let entries = std::fs::read_dir(dir).map_err(|e| CaptureError::io(dir, e))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        files.sort();
        Ok(Self::new(files))
    }

    /// Restart from the first file instead of ending the stream.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Sleep between frames to mimic a camera's frame rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn load(
        &self,
        path: &Path,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Frame, CaptureError> {
        let img = image::open(path)
            .map_err(|source| CaptureError::DecodeFailure {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();

        let img = if img.width() != width || img.height() != height {
            image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle)
        } else {
            img
        };

        let data = PixelFormat::Rgba8.convert(img.as_raw(), format);
        Ok(Frame::new(data, width, height, format, self.delivered))
    }
}

impl FrameSource for ImageSequenceSource {
    fn initialize(&mut self) -> Result<FrameDimensions, CaptureError> {
        if let Some(dims) = self.dimensions {
            return Ok(dims);
        }
        let first = self
            .files
            .first()
            .ok_or_else(|| CaptureError::InitializationFailure("no frames available".into()))?;
        let (width, height) = image::image_dimensions(first).map_err(|e| {
            CaptureError::InitializationFailure(format!("{}: {e}", first.display()))
        })?;
        let dims = FrameDimensions { width, height };
        log::info!(
            "Frame source ready: {} frames at {width}x{height}",
            self.files.len()
        );
        self.dimensions = Some(dims);
        Ok(dims)
    }

    fn start_preview(&mut self) -> Result<(), CaptureError> {
        if self.dimensions.is_none() {
            return Err(CaptureError::InitializationFailure(
                "frame source not initialized".into(),
            ));
        }
        self.active = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), CaptureError> {
        self.active = false;
        Ok(())
    }

    fn is_preview_active(&self) -> bool {
        self.active
    }

    fn next_frame(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Result<Option<Frame>, CaptureError> {
        if !self.active {
            return Err(CaptureError::PreviewInactive);
        }
        if self.cursor >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return Ok(None);
            }
            self.cursor = 0;
        }
        if let Some(interval) = self.frame_interval {
            std::thread::sleep(interval);
        }

        let file_index = self.cursor;
        let frame = self.load(&self.files[file_index], format, width, height)?;
        self.cursor += 1;
        self.delivered += 1;
        self.last_file = Some(file_index);
        Ok(Some(frame))
    }

    fn capture_photo(&mut self) -> Result<ImageHandle, CaptureError> {
        if self.dimensions.is_none() {
            return Err(CaptureError::InitializationFailure(
                "frame source not initialized".into(),
            ));
        }
        let index = self.last_file.unwrap_or(0);
        Ok(ImageHandle::new(self.files[index].clone()))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32, rgb: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb(rgb);
        }
        img.save(&path).unwrap();
        path
    }

    fn started(files: Vec<PathBuf>) -> ImageSequenceSource {
        let mut source = ImageSequenceSource::new(files);
        source.initialize().unwrap();
        source.start_preview().unwrap();
        source
    }

    #[test]
    fn test_initialize_reports_first_file_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 40, 30, [0, 0, 0]);
        let mut source = ImageSequenceSource::new(vec![a]);
        let dims = source.initialize().unwrap();
        assert_eq!(dims, FrameDimensions { width: 40, height: 30 });
    }

    #[test]
    fn test_initialize_empty_fails() {
        let mut source = ImageSequenceSource::new(vec![]);
        assert!(matches!(
            source.initialize(),
            Err(CaptureError::InitializationFailure(_))
        ));
    }

    #[test]
    fn test_start_before_initialize_fails() {
        let mut source = ImageSequenceSource::new(vec![PathBuf::from("x.png")]);
        assert!(source.start_preview().is_err());
        assert!(!source.is_preview_active());
    }

    #[test]
    fn test_next_frame_requires_active_preview() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 4, 4, [0, 0, 0]);
        let mut source = ImageSequenceSource::new(vec![a]);
        source.initialize().unwrap();
        assert!(matches!(
            source.next_frame(PixelFormat::Bgra8, 4, 4),
            Err(CaptureError::PreviewInactive)
        ));
    }

    #[test]
    fn test_frames_in_order_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 4, 4, [10, 20, 30]);
        let b = write_image(dir.path(), "b.png", 4, 4, [40, 50, 60]);
        let mut source = started(vec![a, b]);

        let first = source.next_frame(PixelFormat::Bgra8, 4, 4).unwrap().unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(&first.data()[..4], &[30, 20, 10, 255]);

        let second = source.next_frame(PixelFormat::Rgb8, 4, 4).unwrap().unwrap();
        assert_eq!(second.index(), 1);
        assert_eq!(&second.data()[..3], &[40, 50, 60]);

        assert!(source.next_frame(PixelFormat::Rgb8, 4, 4).unwrap().is_none());
    }

    #[test]
    fn test_looping_restarts_and_keeps_counting() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 4, 4, [0, 0, 0]);
        let mut source = started(vec![a]).looping(true);

        for expected in 0..3 {
            let frame = source.next_frame(PixelFormat::Gray8, 4, 4).unwrap().unwrap();
            assert_eq!(frame.index(), expected);
        }
    }

    #[test]
    fn test_frames_resized_to_requested_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 40, 20, [0, 0, 0]);
        let mut source = started(vec![a]);
        let frame = source.next_frame(PixelFormat::Gray8, 20, 10).unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (20, 10));
        assert_eq!(frame.data().len(), 200);
    }

    #[test]
    fn test_capture_photo_follows_last_delivered_frame() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 4, 4, [0, 0, 0]);
        let b = write_image(dir.path(), "b.png", 4, 4, [0, 0, 0]);
        let mut source = started(vec![a.clone(), b.clone()]);

        assert_eq!(source.capture_photo().unwrap().path(), a.as_path());
        source.next_frame(PixelFormat::Gray8, 4, 4).unwrap();
        source.next_frame(PixelFormat::Gray8, 4, 4).unwrap();
        assert_eq!(source.capture_photo().unwrap().path(), b.as_path());
    }

    #[test]
    fn test_from_dir_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "b.png", 4, 4, [0, 0, 0]);
        write_image(dir.path(), "a.png", 4, 4, [0, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let source = ImageSequenceSource::from_dir(dir.path()).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.files[0], dir.path().join("a.png"));
    }

    #[test]
    fn test_stop_preview_deactivates() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_image(dir.path(), "a.png", 4, 4, [0, 0, 0]);
        let mut source = started(vec![a]);
        source.stop_preview().unwrap();
        assert!(!source.is_preview_active());
    }
}
