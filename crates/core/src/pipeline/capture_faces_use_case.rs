use std::path::PathBuf;
use std::time::Instant;

use crate::capture::domain::frame_source::{FrameSource, ImageHandle};
use crate::detection::domain::face_analyzer::FaceAnalyzer;
use crate::extraction::domain::crop_region::{validate_scale, CropRequest};
use crate::extraction::domain::upload_sink::UploadSink;
use crate::extraction::infrastructure::image_codec::DecodedImage;
use crate::extraction::infrastructure::region_extractor::{CropResult, RegionExtractor};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::bounding_box::{BoundingBox, Padding};
use crate::shared::error::CaptureError;
use crate::shared::frame::Frame;
use crate::shared::pixel_format::PixelFormat;

#[derive(Debug)]
pub struct FaceCrop {
    pub bounding_box: BoundingBox,
    pub result: CropResult,
}

#[derive(Debug)]
pub struct FaceFailure {
    pub bounding_box: BoundingBox,
    pub error: CaptureError,
}

/// Everything one capture trigger produced.
#[derive(Debug, Default)]
pub struct CaptureSession {
    /// The still the faces were cut from. `None` when detection is
    /// unavailable and nothing was captured.
    pub source: Option<ImageHandle>,
    pub crops: Vec<FaceCrop>,
    pub failures: Vec<FaceFailure>,
}

impl CaptureSession {
    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    /// `(name, path)` pairs in detection order.
    pub fn upload_items(&self) -> Vec<(String, PathBuf)> {
        self.crops
            .iter()
            .map(|c| (c.result.handle.name(), c.result.handle.path().to_path_buf()))
            .collect()
    }

    /// Hands every crop to `sink`, consuming the session.
    pub fn publish(self, sink: &mut dyn UploadSink) -> Result<usize, CaptureError> {
        if self.crops.is_empty() {
            return Ok(0);
        }
        sink.upload(&self.upload_items())
    }
}

/// Still capture → detect → one padded crop per face.
///
/// Detection runs on the same decoded still the crops are cut from, so
/// boxes and pixels always share one coordinate space.
pub struct CaptureFacesUseCase {
    analyzer: FaceAnalyzer,
    extractor: RegionExtractor,
    padding: Padding,
    scale: f64,
    logger: Box<dyn PipelineLogger>,
}

impl CaptureFacesUseCase {
    pub fn new(analyzer: FaceAnalyzer, extractor: RegionExtractor, padding: Padding) -> Self {
        Self {
            analyzer,
            extractor,
            padding,
            scale: 1.0,
            logger: Box::new(NullPipelineLogger),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Result<Self, CaptureError> {
        self.scale = validate_scale(scale)?;
        Ok(self)
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Captures a still from `source` and extracts every detected face.
    ///
    /// Capture, decode and detection failures abort the trigger. Failures
    /// while cropping a single face are recorded in the session and the
    /// remaining faces are still processed.
    pub fn execute(&mut self, source: &mut dyn FrameSource) -> Result<CaptureSession, CaptureError> {
        if !self.analyzer.is_detection_supported() {
            log::debug!("Face detection unavailable; skipping capture");
            return Ok(CaptureSession::default());
        }

        let still = source.capture_photo()?;

        let started = Instant::now();
        let decoded = self.extractor.decode(&still)?;
        self.logger.timing("decode", elapsed_ms(started));

        let frame = self.analyzer.prepare(frame_from(&decoded));
        let boxes = self.analyzer.detect(&frame)?;
        self.logger.metric("faces", boxes.len() as f64);
        log::info!("Detected {} faces in {}", boxes.len(), still.name());

        let mut session = CaptureSession {
            source: Some(still.clone()),
            ..Default::default()
        };

        for bounding_box in boxes {
            let request = CropRequest::new(still.clone(), bounding_box, self.padding)
                .with_scale(self.scale);
            let started = Instant::now();
            match self.extractor.extract_decoded(&decoded, &request) {
                Ok(result) => {
                    self.logger.timing("extract", elapsed_ms(started));
                    session.crops.push(FaceCrop {
                        bounding_box,
                        result,
                    });
                }
                Err(error) => {
                    log::warn!("Skipping face at {bounding_box:?}: {error}");
                    session.failures.push(FaceFailure {
                        bounding_box,
                        error,
                    });
                }
            }
        }

        self.logger.summary();
        Ok(session)
    }
}

/// Wraps a tightly packed decoded still as a BGRA frame.
fn frame_from(decoded: &DecodedImage) -> Frame {
    let row = decoded.width as usize * 4;
    let data = if decoded.stride == row {
        decoded.data.clone()
    } else {
        decoded
            .data
            .chunks(decoded.stride)
            .take(decoded.height as usize)
            .flat_map(|r| &r[..row])
            .copied()
            .collect()
    };
    Frame::new(data, decoded.width, decoded.height, PixelFormat::Bgra8, 0)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
