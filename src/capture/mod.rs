//! Frame Input Layer
//!
//! Loads a frame from disk: a JSON manifest naming the color image, the depth
//! raster, the camera intrinsics and the detections to resolve.

pub mod frame;

pub use frame::Frame;

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::FrameError;
use crate::vision::{CameraIntrinsics, DepthMap, Detection};

/// Encoding of the depth file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFormat {
    /// Single-channel 16-bit image, millimeters
    #[default]
    Png16,
    /// Headerless little-endian f32, row-major, millimeters
    RawF32,
}

/// Intrinsics given directly or as a projection matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntrinsicsSource {
    Projection { projection: [f64; 12] },
    Pinhole(CameraIntrinsics),
}

impl IntrinsicsSource {
    pub fn resolve(&self) -> CameraIntrinsics {
        match self {
            IntrinsicsSource::Projection { projection } => CameraIntrinsics::from_projection(projection),
            IntrinsicsSource::Pinhole(intrinsics) => *intrinsics,
        }
    }
}

/// On-disk description of one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameManifest {
    /// Color image path, relative to the manifest
    pub image: PathBuf,
    /// Depth raster path, relative to the manifest
    pub depth: PathBuf,
    #[serde(default)]
    pub depth_format: DepthFormat,
    pub intrinsics: IntrinsicsSource,
    pub detections: Vec<Detection>,
}

/// Load a frame manifest and everything it references
pub fn load_frame(manifest_path: &Path) -> Result<Frame> {
    let content = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read frame manifest: {:?}", manifest_path))?;
    let manifest: FrameManifest = serde_json::from_str(&content)
        .with_context(|| format!("Invalid frame manifest: {:?}", manifest_path))?;

    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let image_path = base.join(&manifest.image);
    let depth_path = base.join(&manifest.depth);

    let image = decode_image(&image_path)?;
    let depth = decode_depth(&depth_path, manifest.depth_format, image.width(), image.height())?;

    debug!(
        "Loaded frame {}x{} with {} detections",
        image.width(),
        image.height(),
        manifest.detections.len()
    );

    Ok(Frame::new(image, depth, manifest.intrinsics.resolve(), manifest.detections))
}

/// Decode the color image
pub fn decode_image(path: &Path) -> Result<image::RgbImage, FrameError> {
    let image = image::open(path).map_err(|e| FrameError::InputDecode {
        what: "image",
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(image.to_rgb8())
}

/// Decode a depth raster; raw files take their extent from the color image
pub fn decode_depth(path: &Path, format: DepthFormat, width: u32, height: u32) -> Result<DepthMap, FrameError> {
    let decode_error = |reason: String| FrameError::InputDecode {
        what: "depth",
        path: path.to_path_buf(),
        reason,
    };

    match format {
        DepthFormat::Png16 => {
            let image = image::open(path).map_err(|e| decode_error(e.to_string()))?;
            match image {
                DynamicImage::ImageLuma16(raw) => {
                    let (w, h) = raw.dimensions();
                    let values = raw.into_raw().into_iter().map(f32::from).collect();
                    DepthMap::from_raw(w, h, values).ok_or_else(|| decode_error("truncated raster".to_string()))
                }
                other => Err(decode_error(format!("expected 16-bit grayscale, got {:?}", other.color()))),
            }
        }
        DepthFormat::RawF32 => {
            let bytes = std::fs::read(path).map_err(|e| decode_error(e.to_string()))?;
            let expected = width as usize * height as usize * 4;
            if bytes.len() != expected {
                return Err(decode_error(format!("expected {} bytes, found {}", expected, bytes.len())));
            }

            let values = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            DepthMap::from_raw(width, height, values).ok_or_else(|| decode_error("truncated raster".to_string()))
        }
    }
}
