//! Text recognizer seam
//!
//! The neural recognizer lives outside this crate. The pipeline only needs a
//! grayscale crop in and a decoded string out.

use anyhow::Result;
use image::GrayImage;
use std::collections::HashMap;

use super::BoundingBox;

/// End-of-sequence marker emitted by attention decoders
pub const END_OF_SEQUENCE: char = '$';

/// Reads the text in a cropped grayscale region
pub trait TextRecognizer {
    fn recognize(&mut self, region: &GrayImage) -> Result<String>;
}

impl<F> TextRecognizer for F
where
    F: FnMut(&GrayImage) -> Result<String>,
{
    fn recognize(&mut self, region: &GrayImage) -> Result<String> {
        self(region)
    }
}

/// Recognizer that looks up crops by their dimensions, for replaying recorded output
#[derive(Debug, Clone, Default)]
pub struct LookupRecognizer {
    by_size: HashMap<(u32, u32), String>,
}

impl LookupRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the text returned for crops of `width x height`
    pub fn with_text(mut self, width: u32, height: u32, text: &str) -> Self {
        self.by_size.insert((width, height), text.to_string());
        self
    }
}

impl TextRecognizer for LookupRecognizer {
    fn recognize(&mut self, region: &GrayImage) -> Result<String> {
        Ok(self.by_size.get(&region.dimensions()).cloned().unwrap_or_default())
    }
}

/// Trim decoder output and cut it at the end-of-sequence marker
pub fn sanitize_prediction(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.find(END_OF_SEQUENCE) {
        Some(end) => &trimmed[..end],
        None => trimmed,
    }
}

/// Crop a bounding box out of a grayscale image, clamped to the image
pub fn crop_region(image: &GrayImage, bbox: &BoundingBox) -> GrayImage {
    let (img_w, img_h) = image.dimensions();

    let x0 = bbox.xmin.clamp(0, img_w as i32) as u32;
    let y0 = bbox.ymin.clamp(0, img_h as i32) as u32;
    let x1 = bbox.xmax.clamp(0, img_w as i32) as u32;
    let y1 = bbox.ymax.clamp(0, img_h as i32) as u32;

    if x1 <= x0 || y1 <= y0 {
        return GrayImage::new(1, 1);
    }

    image::imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image()
}
