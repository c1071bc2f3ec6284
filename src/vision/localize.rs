//! Depth localization
//!
//! Back-projects a pixel with a co-registered depth sample through a pinhole
//! camera model and attaches the orientation of a static frame transform.

use image::{ImageBuffer, Luma};
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::LocalizeError;

/// Depth raster in millimeters, NaN where the sensor has no reading
pub type DepthMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Millimeters per meter
const MM_PER_M: f64 = 1000.0;

/// Pinhole camera intrinsics of the rectified color image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels)
    pub fx: f64,
    /// Focal length in y (pixels)
    pub fy: f64,
    /// Principal point x (pixels)
    pub cx: f64,
    /// Principal point y (pixels)
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Read intrinsics from a row-major 3x4 projection matrix
    ///
    /// ```text
    ///     [fx'  0  cx' Tx]
    /// P = [ 0  fy' cy' Ty]
    ///     [ 0   0   1   0]
    /// ```
    pub fn from_projection(p: &[f64; 12]) -> Self {
        Self::new(p[0], p[5], p[2], p[6])
    }

    /// Focal lengths are finite and non-zero, principal point is finite
    pub fn is_valid(&self) -> bool {
        [self.fx, self.fy].iter().all(|f| f.is_finite() && *f != 0.0)
            && self.cx.is_finite()
            && self.cy.is_finite()
    }
}

/// Fixed transform between two named frames (camera mount offset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticTransform {
    /// Frame the transform is expressed in; poses are reported in this frame
    pub parent_frame: String,
    /// Frame being placed
    pub child_frame: String,
    /// Translation in meters
    pub translation: [f64; 3],
    /// Static-axis roll, pitch, yaw in radians
    pub euler: [f64; 3],
}

impl Default for StaticTransform {
    fn default() -> Self {
        Self {
            parent_frame: "camera_color_optical_frame".to_string(),
            child_frame: "camera_link".to_string(),
            translation: [0.0; 3],
            euler: [0.0; 3],
        }
    }
}

impl StaticTransform {
    /// Rotation part as a quaternion
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let [roll, pitch, yaw] = self.euler;
        UnitQuaternion::from_euler_angles(roll, pitch, yaw)
    }

    /// Full homogeneous transform
    pub fn isometry(&self) -> Isometry3<f64> {
        let [x, y, z] = self.translation;
        Isometry3::from_parts(Translation3::new(x, y, z), self.rotation())
    }
}

/// Localized pose of one detection
#[derive(Debug, Clone, PartialEq)]
pub struct Pose3D {
    /// Frame the pose is reported in
    pub frame_id: String,
    /// Camera-space position in meters
    pub position: Point3<f64>,
    /// Orientation taken from the static transform
    pub orientation: UnitQuaternion<f64>,
    /// Static transform composed with the position; not part of the reported pose
    pub composed: Isometry3<f64>,
}

/// Read the depth sample under a pixel position.
///
/// Coordinates are truncated to the containing pixel.
pub fn sample_depth(depth: &DepthMap, point: [f64; 2], zero_is_invalid: bool) -> Result<f64, LocalizeError> {
    let (width, height) = depth.dimensions();
    let [x, y] = point;

    if !(x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64) {
        return Err(LocalizeError::OutOfBounds { x, y, width, height });
    }

    let (px, py) = (x as u32, y as u32);
    let value = f64::from(depth.get_pixel(px, py).0[0]);

    if !value.is_finite() || (zero_is_invalid && value == 0.0) {
        return Err(LocalizeError::DepthUnavailable { x: px, y: py });
    }

    Ok(value)
}

/// Back-project a pixel with depth `zc` (millimeters) to a camera-space point in meters
pub fn project(point: [f64; 2], zc: f64, intrinsics: &CameraIntrinsics) -> Result<Point3<f64>, LocalizeError> {
    let [xp, yp] = point;

    if !zc.is_finite() {
        return Err(LocalizeError::DepthUnavailable {
            x: xp.max(0.0) as u32,
            y: yp.max(0.0) as u32,
        });
    }

    let x = (xp - intrinsics.cx) * zc / intrinsics.fx / MM_PER_M;
    let y = (yp - intrinsics.cy) * zc / intrinsics.fy / MM_PER_M;
    let z = zc / MM_PER_M;

    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return Err(LocalizeError::NonFinite { x: xp, y: yp });
    }

    Ok(Point3::new(x, y, z))
}

/// Attach the static transform to a camera-space point.
///
/// The reported orientation is the static transform's rotation; the position
/// stays in camera space. The full composition is kept in `composed`.
pub fn compose_pose(point: Point3<f64>, transform: &StaticTransform) -> Pose3D {
    let point_frame = Isometry3::translation(point.x, point.y, point.z);
    let composed = transform.isometry() * point_frame;

    trace!(
        "Composed {} <- {} translation: {:?}",
        transform.parent_frame,
        transform.child_frame,
        composed.translation.vector
    );

    Pose3D {
        frame_id: transform.parent_frame.clone(),
        position: point,
        orientation: transform.rotation(),
        composed,
    }
}
