use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::capture::domain::frame_source::FrameSource;
use crate::detection::domain::face_analyzer::FaceAnalyzer;
use crate::overlay::infrastructure::render_context::RenderHandle;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::cancellation::CancellationToken;
use crate::shared::error::CaptureError;
use crate::shared::pixel_format::PixelFormat;

/// Why a preview run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewEnd {
    Cancelled,
    EndOfStream,
    /// The rendering context dropped its queue.
    RenderClosed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub frames: usize,
    pub frames_with_faces: usize,
    pub analyzer_failures: usize,
}

/// Hands the collaborators back to the caller once the loop has finished.
pub struct PreviewOutcome {
    pub source: Box<dyn FrameSource>,
    pub analyzer: FaceAnalyzer,
    pub stats: PreviewStats,
    pub end: PreviewEnd,
}

/// Acquire → track → present, one frame at a time, until cancelled.
///
/// The next frame is requested only after the tracker has returned for the
/// previous one, so a slow tracker throttles acquisition instead of queueing
/// frames. Overlay updates go through a [`RenderHandle`]; the loop never
/// touches the surface itself.
pub struct PreviewLoop {
    source: Box<dyn FrameSource>,
    analyzer: FaceAnalyzer,
    render: RenderHandle,
    logger: Box<dyn PipelineLogger>,
}

impl PreviewLoop {
    pub fn new(source: Box<dyn FrameSource>, analyzer: FaceAnalyzer, render: RenderHandle) -> Self {
        Self {
            source,
            analyzer,
            render,
            logger: Box::new(NullPipelineLogger),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Runs the loop on a dedicated thread.
    pub fn spawn(
        self,
        token: CancellationToken,
    ) -> JoinHandle<Result<PreviewOutcome, CaptureError>> {
        thread::spawn(move || self.run(token))
    }

    /// Runs the loop on the calling thread until the token is cancelled, the
    /// source runs dry, or the rendering context goes away.
    ///
    /// On every exit path after the preview started, the source preview is
    /// stopped and a clear is queued for the overlay. A failing source ends
    /// the run with its error; failing tracker calls are logged and skipped.
    pub fn run(mut self, token: CancellationToken) -> Result<PreviewOutcome, CaptureError> {
        let dims = self.source.initialize()?;
        if !self.source.is_preview_active() {
            self.source.start_preview()?;
        }
        // Without a tracker the format is irrelevant; frames are only drained.
        let format = self.analyzer.preferred_format().unwrap_or(PixelFormat::Bgra8);
        log::info!(
            "Preview started: {}x{} {format:?}, tracking {}",
            dims.width,
            dims.height,
            if self.analyzer.is_tracking_supported() {
                "on"
            } else {
                "off"
            }
        );

        let mut stats = PreviewStats::default();
        let result = self.drive(&token, dims.width, dims.height, format, &mut stats);

        if let Err(e) = self.source.stop_preview() {
            log::warn!("Failed to stop preview: {e}");
        }
        self.render.clear();
        self.logger.summary();

        let end = result?;
        log::info!(
            "Preview ended ({end:?}): {} frames, {} with faces",
            stats.frames,
            stats.frames_with_faces
        );
        Ok(PreviewOutcome {
            source: self.source,
            analyzer: self.analyzer,
            stats,
            end,
        })
    }

    fn drive(
        &mut self,
        token: &CancellationToken,
        width: u32,
        height: u32,
        format: PixelFormat,
        stats: &mut PreviewStats,
    ) -> Result<PreviewEnd, CaptureError> {
        loop {
            if token.is_cancelled() {
                return Ok(PreviewEnd::Cancelled);
            }

            let started = Instant::now();
            let Some(frame) = self.source.next_frame(format, width, height)? else {
                return Ok(PreviewEnd::EndOfStream);
            };
            self.logger.timing("acquire", elapsed_ms(started));

            if token.is_cancelled() {
                return Ok(PreviewEnd::Cancelled);
            }
            stats.frames += 1;
            let index = frame.index();

            if self.analyzer.is_tracking_supported() {
                let frame = self.analyzer.prepare(frame);
                let started = Instant::now();
                let tracked = self.analyzer.track_next(&frame);
                self.logger.timing("track", elapsed_ms(started));

                if token.is_cancelled() {
                    return Ok(PreviewEnd::Cancelled);
                }

                match tracked {
                    Ok(boxes) => {
                        self.logger.metric("faces", boxes.len() as f64);
                        if !boxes.is_empty() {
                            stats.frames_with_faces += 1;
                        }
                        if !self.render.present(frame.width(), frame.height(), boxes) {
                            return Ok(PreviewEnd::RenderClosed);
                        }
                    }
                    Err(e) => {
                        stats.analyzer_failures += 1;
                        log::warn!("Tracking failed on frame {index}: {e}");
                    }
                }
            }

            self.logger.frame_done(index);
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
