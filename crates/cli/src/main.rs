mod settings;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};

use facecap_core::capture::domain::frame_source::FrameSource;
use facecap_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use facecap_core::detection::domain::face_analyzer::FaceAnalyzer;
use facecap_core::detection::infrastructure::replay_face_analyzer::{
    load_detections, ReplayFaceDetector, ReplayFaceTracker,
};
use facecap_core::extraction::domain::crop_region::validate_scale;
use facecap_core::extraction::domain::crop_storage::CropStorage;
use facecap_core::extraction::infrastructure::directory_upload_sink::DirectoryUploadSink;
use facecap_core::extraction::infrastructure::image_codec::CropEncoding;
use facecap_core::extraction::infrastructure::region_extractor::RegionExtractor;
use facecap_core::extraction::infrastructure::temp_dir_storage::TempDirStorage;
use facecap_core::overlay::domain::overlay_mapper::OverlayMapper;
use facecap_core::overlay::infrastructure::canvas_overlay_surface::CanvasOverlaySurface;
use facecap_core::overlay::infrastructure::render_context::RenderContext;
use facecap_core::pipeline::capture_faces_use_case::CaptureFacesUseCase;
use facecap_core::pipeline::pipeline_logger::LogPipelineLogger;
use facecap_core::pipeline::preview_loop::PreviewLoop;
use facecap_core::shared::bounding_box::Padding;
use facecap_core::shared::cancellation::CancellationToken;
use facecap_core::shared::constants::DEFAULT_JPEG_QUALITY;
use facecap_core::shared::pixel_format::PixelFormat;

use settings::Settings;

/// How often the rendering context drains its queue.
const RENDER_TICK: Duration = Duration::from_millis(10);

/// Live face preview with tracking overlay, and padded face crops on demand.
#[derive(Parser)]
#[command(name = "facecap")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream frames through the tracker and draw the overlay.
    Preview(PreviewArgs),
    /// Capture a still, detect faces and write one crop per face.
    Capture(CaptureArgs),
    /// Show the effective settings, optionally saving them.
    Settings(SettingsArgs),
}

#[derive(Args)]
struct PreviewArgs {
    /// Image file or directory of frames, played in name order.
    input: PathBuf,

    /// Recorded face boxes per frame index (JSON). Without it the preview
    /// runs with no overlay.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Restart from the first frame at the end.
    #[arg(long = "loop")]
    looping: bool,

    /// Delay between frames in milliseconds.
    #[arg(long, default_value = "33")]
    interval_ms: u64,

    /// Stop after this many milliseconds.
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Keep the last boxes for up to this many frames without detections.
    #[arg(long, default_value = "0")]
    hold: usize,

    /// Write the last non-empty overlay to this PNG.
    #[arg(long)]
    overlay_out: Option<PathBuf>,

    #[command(flatten)]
    display: DisplayOptions,
}

#[derive(Args)]
struct CaptureArgs {
    /// Image file or directory of frames.
    input: PathBuf,

    /// Recorded face boxes per frame index (JSON).
    #[arg(long)]
    detections: PathBuf,

    /// Frame index to capture.
    #[arg(long, default_value = "0")]
    frame: usize,

    /// Copy the finished crops into this directory.
    #[arg(long)]
    upload: Option<PathBuf>,

    #[command(flatten)]
    crop: CropOptions,
}

#[derive(Args)]
struct SettingsArgs {
    /// Persist the effective settings.
    #[arg(long)]
    save: bool,

    #[command(flatten)]
    crop: CropOptions,

    #[command(flatten)]
    display: DisplayOptions,
}

#[derive(Args)]
struct CropOptions {
    /// Crop padding on every side, in pixels.
    #[arg(long)]
    padding: Option<u32>,

    /// Crop padding per side: left,top,right,bottom.
    #[arg(long, value_delimiter = ',', conflicts_with = "padding")]
    padding_sides: Option<Vec<u32>>,

    /// Declared output scale in (0, 1].
    #[arg(long)]
    scale: Option<f64>,

    /// Crop encoding.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// JPEG quality (1-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Directory for finished crops.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct DisplayOptions {
    /// Display size as WIDTHxHEIGHT.
    #[arg(long, value_parser = parse_display)]
    display: Option<(u32, u32)>,

    /// Cosmetic margin added to overlay boxes, in frame pixels.
    #[arg(long)]
    overlay_padding: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Jpeg,
    Png,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = Settings::load();

    match cli.command {
        Command::Preview(args) => {
            apply_display(&mut settings, &args.display);
            run_preview(&args, &settings)
        }
        Command::Capture(args) => {
            apply_crop(&mut settings, &args.crop)?;
            run_capture(&args, &settings)
        }
        Command::Settings(args) => {
            apply_crop(&mut settings, &args.crop)?;
            apply_display(&mut settings, &args.display);
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if args.save {
                let path = settings.save()?;
                log::info!("Saved settings to {}", path.display());
            }
            Ok(())
        }
    }
}

fn run_preview(args: &PreviewArgs, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let source = open_source(&args.input)?
        .looping(args.looping)
        .with_frame_interval(Duration::from_millis(args.interval_ms));

    let analyzer = match &args.detections {
        Some(path) => {
            let tracker =
                ReplayFaceTracker::new(Arc::new(load_detections(path)?)).with_max_hold(args.hold);
            FaceAnalyzer::Tracker(Box::new(tracker))
        }
        None => {
            log::warn!("No detections given; preview runs without overlay");
            FaceAnalyzer::Unavailable
        }
    };

    // This thread is the rendering context from here on.
    let surface = CanvasOverlaySurface::new(settings.display_width, settings.display_height);
    let mut context = RenderContext::new(surface, OverlayMapper::new(settings.overlay_padding));
    let token = CancellationToken::new();

    let worker = PreviewLoop::new(Box::new(source), analyzer, context.handle())
        .with_logger(Box::new(LogPipelineLogger::default()))
        .spawn(token.clone());

    let deadline = args
        .duration_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut seen_redraws = 0;
    let mut snapshot: Option<CanvasOverlaySurface> = None;

    while !worker.is_finished() {
        context.pump();
        let surface = context.surface();
        if surface.redraws() != seen_redraws {
            seen_redraws = surface.redraws();
            if !surface.boxes().is_empty() {
                snapshot = Some(surface.clone());
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            token.cancel();
        }
        thread::sleep(RENDER_TICK);
    }

    let outcome = worker.join().map_err(|_| "preview thread panicked")??;
    context.pump();

    log::info!(
        "Preview finished ({:?}): {} frames, {} with faces, {} tracker errors, {} overlay updates",
        outcome.end,
        outcome.stats.frames,
        outcome.stats.frames_with_faces,
        outcome.stats.analyzer_failures,
        context.presented()
    );

    if let Some(path) = &args.overlay_out {
        match snapshot {
            Some(overlay) => {
                overlay.save(path)?;
                log::info!("Saved overlay to {}", path.display());
            }
            None => log::warn!("No faces were drawn; {} not written", path.display()),
        }
    }
    Ok(())
}

fn run_capture(args: &CaptureArgs, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = open_source(&args.input)?;
    source.initialize()?;
    source.start_preview()?;
    for _ in 0..=args.frame {
        if source.next_frame(PixelFormat::Gray8, 1, 1)?.is_none() {
            return Err(format!(
                "Frame {} is past the end of {}",
                args.frame,
                args.input.display()
            )
            .into());
        }
    }
    source.stop_preview()?;

    // The captured still is the only image the detector sees.
    let recorded = load_detections(&args.detections)?;
    let boxes = recorded.get(&args.frame).cloned().unwrap_or_default();
    let detector = ReplayFaceDetector::new(Arc::new(HashMap::from([(0, boxes)])));

    let storage: Arc<dyn CropStorage> = match &settings.output_dir {
        Some(dir) => Arc::new(TempDirStorage::new(dir)?),
        None => Arc::new(TempDirStorage::in_system_temp()?),
    };
    let extractor = RegionExtractor::new(storage).with_encoding(settings.encoding);

    let mut use_case = CaptureFacesUseCase::new(
        FaceAnalyzer::Detector(Box::new(detector)),
        extractor,
        settings.padding,
    )
    .with_scale(settings.scale)?
    .with_logger(Box::new(LogPipelineLogger::default()));

    let session = use_case.execute(&mut source)?;

    for crop in &session.crops {
        println!(
            "{}\t{}x{}\t{}x{}",
            crop.result.handle.path().display(),
            crop.result.width,
            crop.result.height,
            crop.result.declared_width,
            crop.result.declared_height
        );
    }
    for failure in &session.failures {
        log::warn!("Face {:?} skipped: {}", failure.bounding_box, failure.error);
    }
    log::info!(
        "Captured {} crops ({} failed)",
        session.crops.len(),
        session.failures.len()
    );

    if let Some(dir) = &args.upload {
        let uploaded = session.publish(&mut DirectoryUploadSink::new(dir))?;
        log::info!("Uploaded {uploaded} crops to {}", dir.display());
    }
    Ok(())
}

fn apply_crop(settings: &mut Settings, crop: &CropOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(p) = crop.padding {
        settings.padding = Padding::uniform(p);
    }
    if let Some(sides) = &crop.padding_sides {
        if sides.len() != 4 {
            return Err(format!(
                "--padding-sides takes left,top,right,bottom, got {} values",
                sides.len()
            )
            .into());
        }
        settings.padding = Padding::new(sides[0], sides[1], sides[2], sides[3]);
    }
    if let Some(scale) = crop.scale {
        settings.scale = validate_scale(scale)?;
    }
    if let Some(q) = crop.quality {
        if !(1..=100).contains(&q) {
            return Err(format!("Quality must be between 1 and 100, got {q}").into());
        }
    }

    let quality = crop.quality.unwrap_or(match settings.encoding {
        CropEncoding::Jpeg { quality } => quality,
        CropEncoding::Png => DEFAULT_JPEG_QUALITY,
    });
    settings.encoding = match (crop.format, settings.encoding) {
        (Some(OutputFormat::Png), _) => CropEncoding::Png,
        (Some(OutputFormat::Jpeg), _) | (None, CropEncoding::Jpeg { .. }) => {
            CropEncoding::Jpeg { quality }
        }
        (None, CropEncoding::Png) => CropEncoding::Png,
    };

    if let Some(dir) = &crop.out {
        settings.output_dir = Some(dir.clone());
    }
    Ok(())
}

fn apply_display(settings: &mut Settings, display: &DisplayOptions) {
    if let Some((w, h)) = display.display {
        settings.display_width = w;
        settings.display_height = h;
    }
    if let Some(p) = display.overlay_padding {
        settings.overlay_padding = p;
    }
}

fn open_source(input: &Path) -> Result<ImageSequenceSource, Box<dyn std::error::Error>> {
    if input.is_dir() {
        Ok(ImageSequenceSource::from_dir(input)?)
    } else if input.exists() {
        Ok(ImageSequenceSource::new(vec![input.to_path_buf()]))
    } else {
        Err(format!("Input not found: {}", input.display()).into())
    }
}

fn parse_display(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w = w.trim().parse::<u32>().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h = h.trim().parse::<u32>().map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok((w, h))
}
