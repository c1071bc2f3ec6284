//! Detection annotation
//!
//! Draws accepted detections onto a copy of the source image. Verbatim
//! catalog reads are boxed in their orientation color, corrected reads in a
//! thinner white box. Each box carries a caption with the catalog name and
//! confidence. Rejected detections are never drawn.

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::warn;

use super::label_mask::Orientation;
use super::matcher::MatchMethod;
use super::BoundingBox;

const FUZZY_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const CAPTION_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Caption height in pixels
pub const CAPTION_SCALE: f32 = 22.0;

/// Captions whose origin lies further than this outside the image are skipped
const CAPTION_REACH: i64 = 4096;

static CAPTION_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

/// Box color for a verbatim read under each orientation
pub fn orientation_color(orientation: Orientation) -> Rgb<u8> {
    match orientation {
        Orientation::Deg0 => Rgb([0, 0, 255]),
        Orientation::Deg90 => Rgb([0, 255, 0]),
        Orientation::Deg180 => Rgb([255, 0, 0]),
        Orientation::Deg270 => Rgb([0, 255, 255]),
    }
}

/// Caption text, name followed by confidence
pub fn caption(name: &str, confidence: f64) -> String {
    format!("{}{:.2}", name, confidence)
}

/// Style used for an accepted match
pub fn box_style(method: MatchMethod, orientation: Orientation) -> (Rgb<u8>, u32) {
    match method {
        MatchMethod::Exact => (orientation_color(orientation), 3),
        MatchMethod::Fuzzy => (FUZZY_COLOR, 2),
    }
}

/// Draw a hollow box `thickness` pixels wide, growing inwards
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (img_w, img_h) = image.dimensions();

    // edges pulled in to just outside the image stay invisible
    let margin = i64::from(thickness) + 1;
    let x0 = i64::from(bbox.xmin).clamp(-margin, i64::from(img_w) + margin);
    let y0 = i64::from(bbox.ymin).clamp(-margin, i64::from(img_h) + margin);
    let x1 = i64::from(bbox.xmax).clamp(-margin, i64::from(img_w) + margin);
    let y1 = i64::from(bbox.ymax).clamp(-margin, i64::from(img_h) + margin);

    for inset in 0..i64::from(thickness) {
        let width = x1 - x0 - 2 * inset;
        let height = y1 - y0 - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }

        let rect = Rect::at((x0 + inset) as i32, (y0 + inset) as i32).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Draws boxes and captions for accepted detections
pub struct Annotator {
    font: Option<FontRef<'static>>,
    scale: PxScale,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Create an annotator with the embedded caption font
    pub fn new() -> Self {
        let font = match FontRef::try_from_slice(CAPTION_FONT) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Caption font unavailable, drawing boxes only: {}", e);
                None
            }
        };

        Self {
            font,
            scale: PxScale::from(CAPTION_SCALE),
        }
    }

    /// Draw one accepted detection with its caption above the box
    pub fn draw_detection(
        &self,
        image: &mut RgbImage,
        bbox: &BoundingBox,
        method: MatchMethod,
        orientation: Orientation,
        caption: &str,
    ) {
        let (color, thickness) = box_style(method, orientation);
        draw_box(image, bbox, color, thickness);
        self.draw_caption(image, bbox, caption);
    }

    fn draw_caption(&self, image: &mut RgbImage, bbox: &BoundingBox, caption: &str) {
        let Some(font) = &self.font else {
            return;
        };

        let (img_w, img_h) = image.dimensions();
        let x = i64::from(bbox.xmin);
        let y = i64::from(bbox.ymin) - self.scale.y as i64;
        if x < -CAPTION_REACH || y < -CAPTION_REACH || x >= i64::from(img_w) || y >= i64::from(img_h) {
            return;
        }

        draw_text_mut(image, CAPTION_COLOR, x as i32, y as i32, self.scale, font, caption);
    }
}
