use std::path::PathBuf;

use thiserror::Error;

use crate::shared::pixel_format::PixelFormat;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// A device or analyzer capability could not be brought up. Non-fatal:
    /// features depending on it are disabled.
    #[error("initialization failed: {0}")]
    InitializationFailure(String),
    #[error("pixel format {actual:?} not accepted (supported: {supported:?})")]
    UnsupportedFormat {
        actual: PixelFormat,
        supported: Vec<PixelFormat>,
    },
    #[error("region {x},{y} {width}x{height} is empty after clamping to {image_width}x{image_height}")]
    InvalidRegion {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    },
    #[error("output scale must be in (0, 1], got {0}")]
    InvalidScale(f64),
    #[error("failed to decode {path}: {source}")]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode crop: {0}")]
    EncodeFailure(#[source] image::ImageError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("preview is not active")]
    PreviewInactive,
}

impl CaptureError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io {
            path: path.into(),
            source,
        }
    }
}
