//! Label mask encoding
//!
//! Every accepted detection paints its footprint on a shared 16-bit raster.
//! Identity and orientation travel together as a [`LabelCode`] and are only
//! flattened to an integer here, at the raster boundary:
//!
//! ```text
//! base      = catalog_index + orientation * catalog_size
//! alternate = base + 4 * catalog_size      (base already used this frame)
//! ```
//!
//! Collision tracking is per frame and one level deep: a third detection with
//! the same base label paints the alternate value again.

use image::{ImageBuffer, Luma};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::trace;

use crate::error::LabelError;

/// Raster of label values, 0 = unassigned
pub type LabelRaster = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Number of orientation hypotheses
pub const ORIENTATION_COUNT: u32 = 4;

/// Rotation hypothesis under which text was read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Orientation tag as used in the label arithmetic
    pub fn tag(self) -> u8 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 1,
            Orientation::Deg180 => 2,
            Orientation::Deg270 => 3,
        }
    }
}

impl TryFrom<u8> for Orientation {
    type Error = LabelError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Orientation::Deg0),
            1 => Ok(Orientation::Deg90),
            2 => Ok(Orientation::Deg180),
            3 => Ok(Orientation::Deg270),
            other => Err(LabelError::InvalidOrientation(other)),
        }
    }
}

impl From<Orientation> for u8 {
    fn from(orientation: Orientation) -> Self {
        orientation.tag()
    }
}

/// Catalog identity plus orientation of one labeled detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelCode {
    pub catalog_index: usize,
    pub orientation: Orientation,
}

impl LabelCode {
    pub fn new(catalog_index: usize, orientation: Orientation) -> Self {
        Self {
            catalog_index,
            orientation,
        }
    }

    /// Base raster value for this code
    pub fn to_raw(self, catalog_size: usize) -> Result<u16, LabelError> {
        let raw = self.catalog_index as u32 + u32::from(self.orientation.tag()) * catalog_size as u32;
        u16::try_from(raw).map_err(|_| LabelError::Overflow(raw))
    }

    /// Decode a raster value, reporting whether it came from the alternate range
    pub fn from_raw(raw: u16, catalog_size: usize) -> Option<(Self, bool)> {
        let size = catalog_size as u32;
        if raw == 0 || size == 0 {
            return None;
        }

        let mut value = u32::from(raw);
        let alternate = value >= ORIENTATION_COUNT * size;
        if alternate {
            value -= ORIENTATION_COUNT * size;
        }

        let orientation = Orientation::try_from((value / size) as u8).ok()?;
        Some((Self::new((value % size) as usize, orientation), alternate))
    }
}

/// Per-frame label raster with collision tracking
#[derive(Debug, Clone)]
pub struct LabelMask {
    raster: LabelRaster,
    catalog_size: usize,
    used: HashSet<u16>,
}

impl LabelMask {
    /// Create an empty mask
    pub fn new(width: u32, height: u32, catalog_size: usize) -> Self {
        Self {
            raster: LabelRaster::new(width, height),
            catalog_size,
            used: HashSet::new(),
        }
    }

    /// Label raster
    pub fn raster(&self) -> &LabelRaster {
        &self.raster
    }

    /// Take ownership of the raster
    pub fn into_raster(self) -> LabelRaster {
        self.raster
    }

    /// Label at a pixel
    pub fn label_at(&self, x: u32, y: u32) -> u16 {
        self.raster.get_pixel(x, y).0[0]
    }

    /// Whether `label` has been painted this frame
    pub fn contains(&self, label: u16) -> bool {
        self.used.contains(&label)
    }

    /// Offset between base and alternate label ranges
    pub fn collision_offset(&self) -> u32 {
        ORIENTATION_COUNT * self.catalog_size as u32
    }

    /// Paint a polygon's convex footprint with `label`
    pub fn paint(&mut self, polygon: &[[i32; 2]], label: u16) -> Result<(), LabelError> {
        if label == 0 {
            return Err(LabelError::ReservedLabel);
        }

        fill_convex(&mut self.raster, polygon, Luma([label]));
        self.used.insert(label);
        Ok(())
    }

    /// Paint `code`, moving to the alternate range if its base label is taken.
    /// Returns the raster value actually painted.
    pub fn assign(&mut self, polygon: &[[i32; 2]], code: LabelCode) -> Result<u16, LabelError> {
        let base = code.to_raw(self.catalog_size)?;

        let label = if self.contains(base) {
            let alternate = u32::from(base) + self.collision_offset();
            u16::try_from(alternate).map_err(|_| LabelError::Overflow(alternate))?
        } else {
            base
        };

        trace!("Painting {:?} as label {}", code, label);
        self.paint(polygon, label)?;
        Ok(label)
    }
}

/// Fill the convex hull of `polygon`, clipped to the raster
fn fill_convex(raster: &mut LabelRaster, polygon: &[[i32; 2]], color: Luma<u16>) {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let points = polygon.iter().map(|p| [i64::from(p[0]), i64::from(p[1])]).collect();
    let outline: Vec<[f64; 2]> = convex_hull(points)
        .iter()
        .map(|p| [p[0] as f64, p[1] as f64])
        .collect();
    let clipped = clip_to_rect(&outline, f64::from(width - 1), f64::from(height - 1));

    // clipped vertices lie inside the raster, so they fit in i32
    let mut vertices: Vec<Point<i32>> = clipped
        .iter()
        .map(|p| Point::new(p[0].round() as i32, p[1].round() as i32))
        .collect();
    vertices.dedup();
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    match vertices.as_slice() {
        [] => {}
        [p] => raster.put_pixel(p.x as u32, p.y as u32, color),
        [a, b] => {
            draw_line_segment_mut(raster, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), color);
        }
        _ => draw_polygon_mut(raster, &vertices, color),
    }
}

/// Counter-clockwise hull without repeated points (monotone chain).
/// Collinear input collapses to its two end points.
fn convex_hull(mut points: Vec<[i64; 2]>) -> Vec<[i64; 2]> {
    points.sort_unstable();
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let mut hull = half_hull(points.iter());
    hull.extend(half_hull(points.iter().rev()));
    hull
}

/// One side of a monotone-chain hull, without its closing point
fn half_hull<'a>(ordered: impl Iterator<Item = &'a [i64; 2]>) -> Vec<[i64; 2]> {
    let mut chain: Vec<[i64; 2]> = Vec::new();
    for p in ordered {
        while chain.len() >= 2 && cross(&chain[chain.len() - 2], &chain[chain.len() - 1], p) <= 0 {
            chain.pop();
        }
        chain.push(*p);
    }
    chain.pop();
    chain
}

/// z component of `(a - o) x (b - o)`; i32 inputs give i64 differences whose products need i128
fn cross(o: &[i64; 2], a: &[i64; 2], b: &[i64; 2]) -> i128 {
    i128::from(a[0] - o[0]) * i128::from(b[1] - o[1]) - i128::from(a[1] - o[1]) * i128::from(b[0] - o[0])
}

/// Clip a convex outline to `[0, max_x] x [0, max_y]` (Sutherland-Hodgman)
fn clip_to_rect(outline: &[[f64; 2]], max_x: f64, max_y: f64) -> Vec<[f64; 2]> {
    let clipped = clip_half_plane(outline, 0, 0.0, true);
    let clipped = clip_half_plane(&clipped, 0, max_x, false);
    let clipped = clip_half_plane(&clipped, 1, 0.0, true);
    clip_half_plane(&clipped, 1, max_y, false)
}

/// Keep the part of `outline` on one side of `p[axis] == bound`
fn clip_half_plane(outline: &[[f64; 2]], axis: usize, bound: f64, keep_above: bool) -> Vec<[f64; 2]> {
    let inside = |p: &[f64; 2]| if keep_above { p[axis] >= bound } else { p[axis] <= bound };
    let crossing = |a: &[f64; 2], b: &[f64; 2]| {
        let t = (bound - a[axis]) / (b[axis] - a[axis]);
        let mut p = [0.0; 2];
        p[axis] = bound;
        p[1 - axis] = a[1 - axis] + t * (b[1 - axis] - a[1 - axis]);
        p
    };

    let mut clipped = Vec::with_capacity(outline.len() + 2);
    for (i, current) in outline.iter().enumerate() {
        let previous = &outline[(i + outline.len() - 1) % outline.len()];
        match (inside(previous), inside(current)) {
            (true, true) => clipped.push(*current),
            (true, false) => clipped.push(crossing(previous, current)),
            (false, true) => {
                clipped.push(crossing(previous, current));
                clipped.push(*current);
            }
            (false, false) => {}
        }
    }
    clipped
}
