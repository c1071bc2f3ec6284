//! Frame data structures for one synchronized capture

use image::RgbImage;
use std::time::Instant;

use crate::vision::{CameraIntrinsics, DepthMap, Detection};

/// Color image, co-registered depth, intrinsics and the detections found in it
#[derive(Debug, Clone)]
pub struct Frame {
    /// Color image
    pub image: RgbImage,
    /// Depth in millimeters, same extent as `image`
    pub depth: DepthMap,
    /// Intrinsics of the rectified color camera
    pub intrinsics: CameraIntrinsics,
    /// Candidate text regions
    pub detections: Vec<Detection>,
    /// When the frame was assembled
    pub timestamp: Instant,
}

impl Frame {
    /// Create a new frame
    pub fn new(image: RgbImage, depth: DepthMap, intrinsics: CameraIntrinsics, detections: Vec<Detection>) -> Self {
        Self {
            image,
            depth,
            intrinsics,
            detections,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
