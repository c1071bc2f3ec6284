//! Error types
//!
//! Domain errors for the vision core. Application-level code (config, storage,
//! CLI) wraps these in `anyhow` with context.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort processing of a whole frame
#[derive(Debug, Error)]
pub enum FrameError {
    /// Source image or depth raster could not be decoded
    #[error("failed to decode {what} from {path:?}: {reason}")]
    InputDecode {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// Depth raster is not co-registered with the color image
    #[error("depth raster is {depth_w}x{depth_h} but image is {image_w}x{image_h}")]
    DimensionMismatch {
        image_w: u32,
        image_h: u32,
        depth_w: u32,
        depth_h: u32,
    },

    /// Intrinsics cannot back-project (zero or non-finite focal length)
    #[error("unusable camera intrinsics: fx = {fx}, fy = {fy}")]
    InvalidIntrinsics { fx: f64, fy: f64 },
}

/// Errors produced while localizing a single detection
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocalizeError {
    /// Depth sample is not a finite number (sensor dropout)
    #[error("depth unavailable at ({x}, {y})")]
    DepthUnavailable { x: u32, y: u32 },

    /// Sample point lies outside the depth raster
    #[error("sample point ({x:.1}, {y:.1}) outside {width}x{height} depth raster")]
    OutOfBounds {
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    },

    /// Back-projection produced a non-finite point
    #[error("projection of ({x:.1}, {y:.1}) is not finite")]
    NonFinite { x: f64, y: f64 },
}

/// Errors produced while encoding a label onto the mask
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// Label 0 marks unassigned pixels and cannot be painted
    #[error("label 0 is reserved for unassigned pixels")]
    ReservedLabel,

    /// Orientation tag outside 0..=3
    #[error("orientation tag {0} outside 0..=3")]
    InvalidOrientation(u8),

    /// Encoded value does not fit in the raster's pixel type
    #[error("label {0} does not fit in a 16-bit mask")]
    Overflow(u32),
}

/// Errors produced while building a catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalog must contain at least one entry")]
    Empty,
}
