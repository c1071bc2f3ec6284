//! Per-frame detection pipeline
//!
//! For each detection: area gate, text, catalog match, then for accepted
//! matches a mask label, an annotation and a pose. Failures are recorded per
//! detection and never abort the frame.

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::annotate::{caption, Annotator};
use super::label_mask::{LabelCode, LabelMask};
use super::localize::{compose_pose, project, sample_depth, Pose3D, StaticTransform};
use super::matcher::{CatalogMatcher, MatchResult};
use super::recognizer::{crop_region, sanitize_prediction, TextRecognizer};
use super::Detection;
use crate::capture::Frame;
use crate::error::{FrameError, LabelError, LocalizeError};

/// Configuration for per-frame processing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Boxes smaller than this (pixels²) are ignored as noise
    pub min_box_area: i64,
    /// Treat a zero depth reading as a dropout
    pub zero_depth_is_invalid: bool,
    /// Draw accepted detections on the output image
    pub annotate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_box_area: 1500,
            zero_depth_is_invalid: false,
            annotate: true,
        }
    }
}

/// What happened to one detection
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionStatus {
    /// Box area under `min_box_area`
    BelowMinArea,
    /// No text could be obtained
    RecognitionFailed(String),
    /// Best match under the acceptance threshold
    Rejected,
    /// Accepted but could not be painted
    LabelFailed(LabelError),
    /// Labeled, but no pose (depth dropout, sample outside raster, non-finite point)
    DepthUnavailable(LocalizeError),
    /// Labeled and localized
    Localized,
}

/// Per-detection record, one for every input detection
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    /// Position in the frame's detection list
    pub detection_index: usize,
    /// Text that was matched
    pub text: Option<String>,
    /// Match outcome, if matching ran
    pub matched: Option<MatchResult>,
    /// Raster value painted, if any
    pub label: Option<u16>,
    pub status: DetectionStatus,
}

/// An accepted, depth-valid detection
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedDetection {
    pub detection_index: usize,
    /// Raster value painted for this detection
    pub label: u16,
    pub code: LabelCode,
    /// Catalog name
    pub name: String,
    pub confidence: f64,
    pub pose: Pose3D,
}

impl LocalizedDetection {
    /// Display caption, name followed by confidence
    pub fn caption(&self) -> String {
        caption(&self.name, self.confidence)
    }
}

/// Everything produced for one frame
#[derive(Debug)]
pub struct FrameOutput {
    /// Source image with accepted detections drawn
    pub annotated: RgbImage,
    /// Label mask
    pub mask: LabelMask,
    /// One entry per accepted, depth-valid detection
    pub localized: Vec<LocalizedDetection>,
    /// One entry per input detection
    pub reports: Vec<DetectionReport>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Time from frame assembly to output in milliseconds
    pub latency_ms: u64,
}

/// Resolves, labels and localizes the detections of a frame
pub struct DetectionPipeline {
    matcher: CatalogMatcher,
    transform: StaticTransform,
    config: PipelineConfig,
    recognizer: Option<Box<dyn TextRecognizer>>,
    annotator: Annotator,
}

impl DetectionPipeline {
    /// Create a pipeline for detections that carry decoded text
    pub fn new(matcher: CatalogMatcher, transform: StaticTransform, config: PipelineConfig) -> Self {
        Self {
            matcher,
            transform,
            config,
            recognizer: None,
            annotator: Annotator::new(),
        }
    }

    /// Recognizer used for detections without decoded text
    pub fn with_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn matcher(&self) -> &CatalogMatcher {
        &self.matcher
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one frame
    pub fn process(&mut self, frame: &Frame) -> Result<FrameOutput, FrameError> {
        let start = Instant::now();
        let (width, height) = frame.dimensions();
        let (depth_w, depth_h) = frame.depth.dimensions();
        if (depth_w, depth_h) != (width, height) {
            return Err(FrameError::DimensionMismatch {
                image_w: width,
                image_h: height,
                depth_w,
                depth_h,
            });
        }
        if !frame.intrinsics.is_valid() {
            return Err(FrameError::InvalidIntrinsics {
                fx: frame.intrinsics.fx,
                fy: frame.intrinsics.fy,
            });
        }

        let mut mask = LabelMask::new(width, height, self.matcher.catalog().len());
        let mut annotated = frame.image.clone();
        let mut gray: Option<GrayImage> = None;
        let mut localized = Vec::new();
        let mut reports = Vec::with_capacity(frame.detections.len());

        for (detection_index, detection) in frame.detections.iter().enumerate() {
            let mut report = DetectionReport {
                detection_index,
                text: None,
                matched: None,
                label: None,
                status: DetectionStatus::BelowMinArea,
            };

            let area = detection.bbox.area();
            if area < self.config.min_box_area {
                debug!("Detection {} skipped: area {} < {}", detection_index, area, self.config.min_box_area);
                reports.push(report);
                continue;
            }

            let text = match self.read_text(frame, detection, &mut gray) {
                Ok(text) => text,
                Err(reason) => {
                    warn!("Detection {}: no text ({})", detection_index, reason);
                    report.status = DetectionStatus::RecognitionFailed(reason);
                    reports.push(report);
                    continue;
                }
            };

            let matched = self.matcher.resolve(&text);
            report.text = Some(text);
            report.matched = Some(matched.clone());

            let Some(catalog_index) = matched.accepted_index() else {
                debug!(
                    "Detection {} '{}' rejected ({:.3})",
                    detection_index,
                    report.text.as_deref().unwrap_or_default(),
                    matched.confidence
                );
                report.status = DetectionStatus::Rejected;
                reports.push(report);
                continue;
            };

            let code = LabelCode::new(catalog_index, detection.orientation);
            let label = match mask.assign(&detection.footprint(), code) {
                Ok(label) => label,
                Err(e) => {
                    warn!("Detection {}: cannot label {:?}: {}", detection_index, code, e);
                    report.status = DetectionStatus::LabelFailed(e);
                    reports.push(report);
                    continue;
                }
            };
            report.label = Some(label);

            let name = self.matcher.catalog().get(catalog_index).unwrap_or_default().to_string();
            if self.config.annotate {
                let text = caption(&name, matched.confidence);
                self.annotator
                    .draw_detection(&mut annotated, &detection.bbox, matched.method, detection.orientation, &text);
            }

            let center = detection.bbox.center();
            let point = sample_depth(&frame.depth, center, self.config.zero_depth_is_invalid)
                .and_then(|zc| project(center, zc, &frame.intrinsics));

            match point {
                Ok(point) => {
                    debug!(
                        "Detection {} -> '{}' ({:.3}, label {}) at {:?}",
                        detection_index, name, matched.confidence, label, point
                    );
                    localized.push(LocalizedDetection {
                        detection_index,
                        label,
                        code,
                        name,
                        confidence: matched.confidence,
                        pose: compose_pose(point, &self.transform),
                    });
                    report.status = DetectionStatus::Localized;
                }
                Err(e) => {
                    warn!("Detection {}: {}", detection_index, e);
                    report.status = DetectionStatus::DepthUnavailable(e);
                }
            }

            reports.push(report);
        }

        let processing_time = start.elapsed();
        let latency = frame.timestamp.elapsed();
        info!(
            "Frame processed in {:?} ({:?} after capture): {} detections, {} localized",
            processing_time,
            latency,
            frame.detections.len(),
            localized.len()
        );

        Ok(FrameOutput {
            annotated,
            mask,
            localized,
            reports,
            processing_time_ms: processing_time.as_millis() as u64,
            latency_ms: latency.as_millis() as u64,
        })
    }

    /// Decoded text for a detection, running the recognizer if needed
    fn read_text(&mut self, frame: &Frame, detection: &Detection, gray: &mut Option<GrayImage>) -> Result<String, String> {
        if let Some(text) = &detection.text {
            return Ok(sanitize_prediction(text).to_string());
        }

        let Some(recognizer) = self.recognizer.as_mut() else {
            return Err("no decoded text and no recognizer".to_string());
        };

        let gray = gray.get_or_insert_with(|| DynamicImage::ImageRgb8(frame.image.clone()).to_luma8());
        let region = crop_region(gray, &detection.bbox);
        recognizer
            .recognize(&region)
            .map(|raw| sanitize_prediction(&raw).to_string())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Catalog, CorrectionTable};
    use crate::vision::{BoundingBox, CameraIntrinsics, DepthMap, LookupRecognizer, Orientation};
    use anyhow::Result;
    use image::{Luma, Rgb};
    use std::time::Duration;

    const CATALOG_SIZE: usize = 4;

    fn pipeline() -> DetectionPipeline {
        let catalog = Catalog::new(["_pad", "kleenex", "andes", "vanish"]).unwrap();
        let matcher = CatalogMatcher::new(catalog, CorrectionTable::builtin());
        DetectionPipeline::new(matcher, StaticTransform::default(), PipelineConfig::default())
    }

    fn frame(detections: Vec<Detection>) -> Frame {
        let depth = DepthMap::from_pixel(320, 240, Luma([1000.0]));
        Frame::new(
            RgbImage::new(320, 240),
            depth,
            CameraIntrinsics::new(600.0, 600.0, 160.0, 120.0),
            detections,
        )
    }

    fn detection(x: i32, y: i32, text: &str) -> Detection {
        let bbox = BoundingBox::new(x, y, x + 50, y + 40);
        Detection::new(bbox, bbox.corners(), text)
    }

    #[test]
    fn test_accepted_detection_is_labeled_and_localized() {
        let mut pipeline = pipeline();
        // centered on the principal point
        let output = pipeline.process(&frame(vec![detection(135, 100, "kleenex")])).unwrap();

        assert_eq!(output.localized.len(), 1);
        let result = &output.localized[0];
        assert_eq!(result.name, "kleenex");
        assert_eq!(result.label, 1);
        assert_eq!(result.caption(), "kleenex1.00");
        assert_eq!(result.pose.position, nalgebra::Point3::new(0.0, 0.0, 1.0));
        assert_eq!(output.mask.label_at(160, 120), 1);
        assert_eq!(output.reports[0].status, DetectionStatus::Localized);
    }

    #[test]
    fn test_rejected_detection_leaves_no_trace() {
        let mut pipeline = pipeline();
        let output = pipeline.process(&frame(vec![detection(10, 10, "qwerty")])).unwrap();

        assert!(output.localized.is_empty());
        assert_eq!(output.reports[0].status, DetectionStatus::Rejected);
        assert_eq!(output.reports[0].label, None);
        assert!(output.mask.raster().pixels().all(|p| p.0[0] == 0));
        assert!(output.annotated.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_small_boxes_are_skipped() {
        let mut pipeline = pipeline();
        let bbox = BoundingBox::new(0, 0, 30, 30);
        let output = pipeline.process(&frame(vec![Detection::new(bbox, vec![], "kleenex")])).unwrap();

        assert!(output.localized.is_empty());
        assert_eq!(output.reports[0].status, DetectionStatus::BelowMinArea);
        assert_eq!(output.reports[0].matched, None);
    }

    #[test]
    fn test_depth_dropout_skips_only_that_pose() {
        let mut pipeline = pipeline();
        let mut frame = frame(vec![detection(10, 10, "kleenex"), detection(200, 150, "andes")]);
        // center of the first box
        frame.depth.put_pixel(35, 30, Luma([f32::NAN]));

        let output = pipeline.process(&frame).unwrap();

        assert_eq!(output.localized.len(), 1);
        assert_eq!(output.localized[0].name, "andes");
        assert!(matches!(
            output.reports[0].status,
            DetectionStatus::DepthUnavailable(LocalizeError::DepthUnavailable { x: 35, y: 30 })
        ));
        // still labeled on the mask
        assert_eq!(output.reports[0].label, Some(1));
        assert_eq!(output.mask.label_at(20, 20), 1);
    }

    #[test]
    fn test_duplicate_items_get_distinct_labels() {
        let mut pipeline = pipeline();
        let output = pipeline
            .process(&frame(vec![detection(10, 10, "kleenex"), detection(200, 150, "kloonex")]))
            .unwrap();

        let labels: Vec<u16> = output.localized.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![1, 1 + 4 * CATALOG_SIZE as u16]);
    }

    #[test]
    fn test_orientation_selects_label_range() {
        let mut pipeline = pipeline();
        let det = detection(10, 10, "vanish").with_orientation(Orientation::Deg270);
        let output = pipeline.process(&frame(vec![det])).unwrap();

        assert_eq!(output.localized[0].label, 3 + 3 * CATALOG_SIZE as u16);
    }

    #[test]
    fn test_exact_and_fuzzy_annotations() {
        let mut pipeline = pipeline();
        let output = pipeline
            .process(&frame(vec![detection(10, 10, "kleenex"), detection(200, 150, "kloonex")]))
            .unwrap();

        assert_eq!(*output.annotated.get_pixel(10, 20), Rgb([0, 0, 255]));
        assert_eq!(*output.annotated.get_pixel(200, 160), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_recognizer_fills_missing_text() {
        let recognizer = LookupRecognizer::new().with_text(50, 40, "andes$0");
        let mut pipeline = pipeline().with_recognizer(Box::new(recognizer));

        let mut det = detection(10, 10, "");
        det.text = None;
        let output = pipeline.process(&frame(vec![det])).unwrap();

        assert_eq!(output.reports[0].text.as_deref(), Some("andes"));
        assert_eq!(output.localized[0].name, "andes");
    }

    #[test]
    fn test_recognizer_error_is_per_detection() {
        let failing = |_: &GrayImage| -> Result<String> { Err(anyhow::anyhow!("model unavailable")) };
        let mut pipeline = pipeline().with_recognizer(Box::new(failing));

        let mut unread = detection(10, 10, "");
        unread.text = None;
        let output = pipeline.process(&frame(vec![unread, detection(200, 150, "andes")])).unwrap();

        assert_eq!(
            output.reports[0].status,
            DetectionStatus::RecognitionFailed("model unavailable".to_string())
        );
        assert_eq!(output.localized.len(), 1);
    }

    #[test]
    fn test_missing_text_without_recognizer() {
        let mut pipeline = pipeline();
        let mut det = detection(10, 10, "");
        det.text = None;

        let output = pipeline.process(&frame(vec![det])).unwrap();
        assert!(matches!(output.reports[0].status, DetectionStatus::RecognitionFailed(_)));
    }

    #[test]
    fn test_out_of_range_geometry_is_per_detection() {
        let mut pipeline = pipeline();
        let far = BoundingBox::new(1_500_000_000, 0, 1_600_000_000, 10);
        let huge = [[-100_000, -100_000], [100_000, -100_000], [100_000, 100_000], [-100_000, 100_000]];
        let mut frame = frame(vec![
            Detection::new(far, far.corners(), "kleenex"),
            detection(200, 150, "andes"),
            Detection::new(BoundingBox::new(0, 0, 320, 240), huge.to_vec(), "vanish"),
        ]);
        frame.depth.put_pixel(160, 120, Luma([2000.0]));

        let output = pipeline.process(&frame).unwrap();

        assert!(matches!(
            output.reports[0].status,
            DetectionStatus::DepthUnavailable(LocalizeError::OutOfBounds { .. })
        ));
        assert_eq!(output.reports[1].status, DetectionStatus::Localized);
        assert_eq!(output.reports[2].status, DetectionStatus::Localized);
        // the oversized footprint covers the whole raster
        assert!(output.mask.raster().pixels().all(|p| p.0[0] == 3));
        assert_eq!(output.localized[1].pose.position.z, 2.0);
    }

    #[test]
    fn test_caption_is_drawn_for_accepted_detections() {
        let mut pipeline = pipeline();
        let output = pipeline.process(&frame(vec![detection(100, 100, "kleenex")])).unwrap();

        let yellow = (100..150)
            .flat_map(|x| (78..100).map(move |y| (x, y)))
            .filter(|&(x, y)| {
                let p = output.annotated.get_pixel(x, y);
                p.0[0] > 128 && p.0[1] > 128 && p.0[2] == 0
            })
            .count();
        assert!(yellow > 0);
    }

    #[test]
    fn test_latency_counts_from_frame_assembly() {
        let mut pipeline = pipeline();
        let mut frame = frame(vec![detection(10, 10, "kleenex")]);
        frame.timestamp = frame.timestamp.checked_sub(Duration::from_millis(250)).unwrap();

        let output = pipeline.process(&frame).unwrap();
        assert!(output.latency_ms >= 250);
        assert!(output.latency_ms >= output.processing_time_ms);
    }

    #[test]
    fn test_unusable_intrinsics_abort_frame() {
        let mut pipeline = pipeline();
        let mut frame = frame(vec![detection(10, 10, "kleenex")]);
        frame.intrinsics = CameraIntrinsics::new(0.0, 600.0, 160.0, 120.0);

        assert!(matches!(
            pipeline.process(&frame),
            Err(FrameError::InvalidIntrinsics { fx, .. }) if fx == 0.0
        ));
    }

    #[test]
    fn test_mismatched_depth_aborts_frame() {
        let mut pipeline = pipeline();
        let mut frame = frame(vec![]);
        frame.depth = DepthMap::new(10, 10);

        assert!(matches!(pipeline.process(&frame), Err(FrameError::DimensionMismatch { .. })));
    }
}
