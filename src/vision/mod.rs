//! Vision Layer
//!
//! Turns recognized text regions into catalog identities, label-mask entries
//! and camera-space poses:
//! - fuzzy catalog matching with per-entry correction rules
//! - collision-aware label mask painting
//! - depth back-projection and static frame composition

pub mod annotate;
pub mod label_mask;
pub mod localize;
pub mod matcher;
pub mod pipeline;
pub mod recognizer;
pub mod similarity;

pub use label_mask::{LabelCode, LabelMask, LabelRaster, Orientation};
pub use localize::{compose_pose, project, sample_depth, CameraIntrinsics, DepthMap, Pose3D, StaticTransform};
pub use matcher::{CatalogMatcher, MatchMethod, MatchResult, MatcherConfig, ACCEPT_THRESHOLD};
pub use pipeline::{DetectionPipeline, DetectionReport, DetectionStatus, FrameOutput, LocalizedDetection, PipelineConfig};
pub use recognizer::{sanitize_prediction, LookupRecognizer, TextRecognizer};
pub use similarity::similarity;

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, max edges exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.xmax) - i64::from(self.xmin)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.ymax) - i64::from(self.ymin)
    }

    /// Signed area; inverted boxes come out negative
    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    /// Box centre, where depth is sampled
    pub fn center(&self) -> [f64; 2] {
        [
            (f64::from(self.xmin) + f64::from(self.xmax)) / 2.0,
            (f64::from(self.ymin) + f64::from(self.ymax)) / 2.0,
        ]
    }

    /// Corners in drawing order
    pub fn corners(&self) -> Vec<[i32; 2]> {
        vec![
            [self.xmin, self.ymin],
            [self.xmax, self.ymin],
            [self.xmax, self.ymax],
            [self.xmin, self.ymax],
        ]
    }
}

/// One candidate text region in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Axis-aligned bounds
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Footprint contour, ordered
    #[serde(default)]
    pub polygon: Vec<[i32; 2]>,
    /// Text already decoded by the recognizer, if any
    #[serde(default)]
    pub text: Option<String>,
    /// Rotation hypothesis the region was read under
    #[serde(default)]
    pub orientation: Orientation,
}

impl Detection {
    pub fn new(bbox: BoundingBox, polygon: Vec<[i32; 2]>, text: &str) -> Self {
        Self {
            bbox,
            polygon,
            text: Some(text.to_string()),
            orientation: Orientation::Deg0,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Contour to paint, falling back to the box when no contour was supplied
    pub fn footprint(&self) -> Vec<[i32; 2]> {
        if self.polygon.is_empty() {
            self.bbox.corners()
        } else {
            self.polygon.clone()
        }
    }
}
