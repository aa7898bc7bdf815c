use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::CaptureError;
use crate::shared::frame::Frame;
use crate::shared::pixel_format::PixelFormat;

/// One-shot face detection on a single still.
pub trait FaceDetector: Send {
    /// Accepted input formats, most preferred first. Never empty.
    fn supported_formats(&self) -> &[PixelFormat];

    fn detect(&mut self, image: &Frame) -> Result<Vec<BoundingBox>, CaptureError>;
}

/// Frame-sequential face tracking.
///
/// Implementations may carry state from previous frames, hence `&mut self`.
pub trait FaceTracker: Send {
    /// Accepted input formats, most preferred first. Never empty.
    fn supported_formats(&self) -> &[PixelFormat];

    fn track_next(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, CaptureError>;
}

/// The analysis capability available on this platform.
///
/// Callers branch on the declared variant; an `Unavailable` analyzer
/// silently yields no faces wherever it is plugged in.
pub enum FaceAnalyzer {
    Detector(Box<dyn FaceDetector>),
    Tracker(Box<dyn FaceTracker>),
    Unavailable,
}

impl FaceAnalyzer {
    pub fn is_detection_supported(&self) -> bool {
        matches!(self, FaceAnalyzer::Detector(_))
    }

    pub fn is_tracking_supported(&self) -> bool {
        matches!(self, FaceAnalyzer::Tracker(_))
    }

    pub fn supported_formats(&self) -> &[PixelFormat] {
        match self {
            FaceAnalyzer::Detector(d) => d.supported_formats(),
            FaceAnalyzer::Tracker(t) => t.supported_formats(),
            FaceAnalyzer::Unavailable => &[],
        }
    }

    /// Format callers should request from a frame source.
    pub fn preferred_format(&self) -> Option<PixelFormat> {
        self.supported_formats().first().copied()
    }

    /// Converts `frame` to an accepted format if it is not already in one.
    pub fn prepare(&self, frame: Frame) -> Frame {
        if self.supported_formats().contains(&frame.format()) {
            return frame;
        }
        match self.preferred_format() {
            Some(format) => frame.into_format(format),
            None => frame,
        }
    }

    pub fn detect(&mut self, image: &Frame) -> Result<Vec<BoundingBox>, CaptureError> {
        match self {
            FaceAnalyzer::Detector(d) => {
                check_format(d.supported_formats(), image)?;
                d.detect(image)
            }
            _ => Err(CaptureError::InitializationFailure(
                "face detection is not supported".into(),
            )),
        }
    }

    pub fn track_next(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, CaptureError> {
        match self {
            FaceAnalyzer::Tracker(t) => {
                check_format(t.supported_formats(), frame)?;
                t.track_next(frame)
            }
            _ => Err(CaptureError::InitializationFailure(
                "face tracking is not supported".into(),
            )),
        }
    }
}

impl std::fmt::Debug for FaceAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaceAnalyzer::Detector(_) => write!(f, "FaceAnalyzer::Detector"),
            FaceAnalyzer::Tracker(_) => write!(f, "FaceAnalyzer::Tracker"),
            FaceAnalyzer::Unavailable => write!(f, "FaceAnalyzer::Unavailable"),
        }
    }
}

fn check_format(supported: &[PixelFormat], frame: &Frame) -> Result<(), CaptureError> {
    if supported.contains(&frame.format()) {
        Ok(())
    } else {
        Err(CaptureError::UnsupportedFormat {
            actual: frame.format(),
            supported: supported.to_vec(),
        })
    }
}
