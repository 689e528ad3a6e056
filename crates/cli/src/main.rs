use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use crowdwatch_core::crowd::domain::event_sink::EventSink;
use crowdwatch_core::crowd::infrastructure::csv_event_sink::CsvEventSink;
use crowdwatch_core::detection::domain::person_detector::PersonDetector;
use crowdwatch_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crowdwatch_core::detection::infrastructure::recorded_detector::RecordedDetector;
use crowdwatch_core::pipeline::detect_crowds_use_case::DetectCrowdsUseCase;
use crowdwatch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use crowdwatch_core::shared::config::CrowdConfig;
use crowdwatch_core::shared::constants::DEFAULT_LOG_PATH;
use crowdwatch_core::video::domain::video_reader::VideoReader;
use crowdwatch_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crowdwatch_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;

/// Frames between progress lines in the log.
const PROGRESS_THROTTLE: usize = 100;

/// Detects crowds that persist across video frames and logs them to CSV.
#[derive(Parser, Debug)]
#[command(name = "crowdwatch")]
struct Cli {
    /// Input video file or directory of images.
    input: PathBuf,

    /// CSV log to write (truncated at start).
    #[arg(long, default_value = DEFAULT_LOG_PATH)]
    output: PathBuf,

    /// YOLO ONNX model for live person detection.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Recorded detections JSON to replay instead of running a model.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grouping distance between person centers, in pixels.
    #[arg(long)]
    proximity: Option<f64>,

    /// Frames a group must reappear in before it is logged.
    #[arg(long)]
    persistence: Option<u32>,

    /// Minimum person detection confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Detector class id for "person".
    #[arg(long)]
    person_class: Option<u32>,

    /// Snap group keys to a grid of this many pixels to absorb jitter.
    #[arg(long)]
    key_quantization: Option<f64>,

    /// Forget groups unseen for this many frames.
    #[arg(long)]
    max_idle_frames: Option<u64>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,
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
    validate(&cli)?;
    let config = build_config(&cli)?;

    let mut reader = open_reader(&cli.input);
    let metadata = reader.open(&cli.input)?;
    log::info!(
        "Input {}: {}x{}, {} frames",
        cli.input.display(),
        metadata.width,
        metadata.height,
        metadata.total_frames
    );

    let detector = build_detector(&cli, &config)?;
    let sink: Box<dyn EventSink> = Box::new(CsvEventSink::create(&cli.output)?);

    let progress: Box<dyn Fn(usize, usize) -> bool + Send> = Box::new(|current, total| {
        if total > 0 {
            eprint!("\rProcessing frame {current}/{total}");
        } else {
            eprint!("\rProcessing frame {current}");
        }
        true
    });

    let mut use_case = DetectCrowdsUseCase::new(
        reader,
        detector,
        sink,
        Box::new(StdoutPipelineLogger::new(PROGRESS_THROTTLE)),
        &config,
        cli.max_frames,
        Some(progress),
        None,
    )?;
    let summary = use_case.execute(&metadata)?;
    eprintln!();

    log::info!(
        "{} crowd events over {} frames written to {}",
        summary.events_emitted,
        summary.frames_processed,
        cli.output.display()
    );
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied.
fn build_config(cli: &Cli) -> Result<CrowdConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => CrowdConfig::from_file(path)?,
        None => CrowdConfig::default(),
    };

    if let Some(proximity) = cli.proximity {
        config.proximity_threshold = proximity;
    }
    if let Some(persistence) = cli.persistence {
        config.persistence_threshold = persistence;
    }
    if let Some(confidence) = cli.confidence {
        config.confidence_threshold = confidence;
    }
    if let Some(person_class) = cli.person_class {
        config.person_class_id = person_class;
    }
    if cli.key_quantization.is_some() {
        config.key_quantization = cli.key_quantization;
    }
    if cli.max_idle_frames.is_some() {
        config.max_idle_frames = cli.max_idle_frames;
    }

    config.validate()?;
    Ok(config)
}

fn build_detector(
    cli: &Cli,
    config: &CrowdConfig,
) -> Result<Box<dyn PersonDetector>, Box<dyn std::error::Error>> {
    match (&cli.model, &cli.detections) {
        (Some(model), None) => Ok(Box::new(OnnxYoloDetector::new(
            model,
            config.confidence_threshold,
        )?)),
        (None, Some(recorded)) => Ok(Box::new(RecordedDetector::from_file(recorded)?)),
        _ => Err("Exactly one of --model or --detections is required".into()),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if cli.model.is_some() == cli.detections.is_some() {
        return Err("Exactly one of --model or --detections is required".into());
    }
    for path in [&cli.model, &cli.detections, &cli.config].into_iter().flatten() {
        if !path.is_file() {
            return Err(format!("File not found: {}", path.display()).into());
        }
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    Ok(())
}

fn open_reader(input: &Path) -> Box<dyn VideoReader> {
    if input.is_dir() {
        Box::new(ImageSequenceReader::new())
    } else {
        Box::new(FfmpegReader::new())
    }
}
