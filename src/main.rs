//! Catalog Localizer - command line driver
//!
//! Runs the detection pipeline over one frame manifest and writes the
//! annotated image, the label mask and the localized results.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use catalog_localizer::config::{self, AppConfig};
use catalog_localizer::storage::{self, load_catalog, load_rules, CorrectionTable};
use catalog_localizer::vision::{
    CatalogMatcher, DetectionPipeline, DetectionReport, DetectionStatus, LocalizedDetection, Orientation,
};

/// Resolve OCR text regions to catalog items and camera-space poses
#[derive(Parser, Debug)]
#[command(name = "catalog-localizer")]
#[command(about = "Resolve OCR text regions to catalog items, label masks and 3D poses")]
struct Args {
    /// Frame manifest (JSON)
    #[arg(short, long)]
    frame: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Configuration file (TOML); defaults to the platform config dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog file, overrides the configured one
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Correction rules (JSON), overrides the configured ones
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Orientation tag (0-3) applied to every detection
    #[arg(long)]
    orientation: Option<u8>,

    /// Log per-detection decisions
    #[arg(short, long)]
    verbose: bool,
}

/// Published pose of one localized detection
#[derive(Debug, Serialize)]
struct PoseRecord {
    detection: usize,
    label: u16,
    name: String,
    confidence: f64,
    caption: String,
    frame_id: String,
    /// Meters
    position: [f64; 3],
    /// x, y, z, w
    orientation: [f64; 4],
}

impl From<&LocalizedDetection> for PoseRecord {
    fn from(result: &LocalizedDetection) -> Self {
        let p = result.pose.position;
        let q = result.pose.orientation;
        Self {
            detection: result.detection_index,
            label: result.label,
            name: result.name.clone(),
            confidence: result.confidence,
            caption: result.caption(),
            frame_id: result.pose.frame_id.clone(),
            position: [p.x, p.y, p.z],
            orientation: [q.i, q.j, q.k, q.w],
        }
    }
}

/// Outcome of one input detection
#[derive(Debug, Serialize)]
struct ReportRecord {
    detection: usize,
    text: Option<String>,
    confidence: Option<f64>,
    label: Option<u16>,
    status: String,
}

impl From<&DetectionReport> for ReportRecord {
    fn from(report: &DetectionReport) -> Self {
        let status = match &report.status {
            DetectionStatus::BelowMinArea => "below_min_area".to_string(),
            DetectionStatus::RecognitionFailed(reason) => format!("recognition_failed: {}", reason),
            DetectionStatus::Rejected => "rejected".to_string(),
            DetectionStatus::LabelFailed(e) => format!("label_failed: {}", e),
            DetectionStatus::DepthUnavailable(e) => format!("depth_unavailable: {}", e),
            DetectionStatus::Localized => "localized".to_string(),
        };

        Self {
            detection: report.detection_index,
            text: report.text.clone(),
            confidence: report.matched.as_ref().map(|m| m.confidence),
            label: report.label,
            status,
        }
    }
}

#[derive(Debug, Serialize)]
struct FrameRecord {
    processing_time_ms: u64,
    latency_ms: u64,
    poses: Vec<PoseRecord>,
    detections: Vec<ReportRecord>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_or_create_config(args.config.as_deref())?;

    let catalog_path = match args.catalog.clone().or_else(|| config.paths.catalog.clone()) {
        Some(path) => path,
        None => storage::get_data_dir()?.join("commodity_list.txt"),
    };
    let catalog = load_catalog(&catalog_path)?;

    let rules = match args.rules.as_deref().or(config.paths.rules.as_deref()) {
        Some(path) => load_rules(path)?,
        None => {
            info!("Using built-in correction rules");
            CorrectionTable::builtin()
        }
    };

    let mut frame = catalog_localizer::load_frame(&args.frame)?;
    if let Some(tag) = args.orientation {
        let orientation = Orientation::try_from(tag)?;
        for detection in &mut frame.detections {
            detection.orientation = orientation;
        }
    }

    let matcher = CatalogMatcher::with_config(catalog, rules, config.matcher.clone());
    let mut pipeline = DetectionPipeline::new(matcher, config.frames.clone(), config.pipeline.clone());
    let output = pipeline.process(&frame)?;

    write_outputs(&args.out, &output)?;
    info!(
        "Wrote {} poses for {} detections to {:?}",
        output.localized.len(),
        output.reports.len(),
        args.out
    );

    Ok(())
}

/// Load configuration from the given file, the platform config dir, or defaults
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return Ok(config);
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn write_outputs(out_dir: &Path, output: &catalog_localizer::FrameOutput) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    output
        .annotated
        .save(out_dir.join("annotated.png"))
        .context("Failed to write annotated image")?;
    output
        .mask
        .raster()
        .save(out_dir.join("mask.png"))
        .context("Failed to write label mask")?;

    let record = FrameRecord {
        processing_time_ms: output.processing_time_ms,
        latency_ms: output.latency_ms,
        poses: output.localized.iter().map(PoseRecord::from).collect(),
        detections: output.reports.iter().map(ReportRecord::from).collect(),
    };
    let content = serde_json::to_string_pretty(&record)?;
    std::fs::write(out_dir.join("results.json"), content).context("Failed to write results")?;

    Ok(())
}
