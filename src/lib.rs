//! Catalog Localizer - resolve OCR text regions to catalog items and 3D poses
//!
//! Sits between a text recognizer and a downstream action system. For every
//! detected text region in a frame it decides which catalog item the noisy
//! string names, paints a collision-aware label onto a shared mask, and
//! back-projects the region's depth sample into a camera-space pose.

pub mod capture;
pub mod config;
pub mod error;
pub mod storage;
pub mod vision;

pub use capture::{load_frame, Frame};
pub use config::AppConfig;
pub use error::{CatalogError, FrameError, LabelError, LocalizeError};
pub use storage::{Catalog, CorrectionRule, CorrectionTable};
pub use vision::{CatalogMatcher, DetectionPipeline, FrameOutput, MatchResult};
