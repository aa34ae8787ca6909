//! Core data model: frames, bounding boxes and perception model results

use crate::surface::SurfaceMask;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// A single captured video frame.
///
/// Created by the frame source adapter, immutable once published and shared
/// as `Arc<Frame>` between the scheduler and the model runners.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonically increasing, unique sequence number
    pub seq: u64,
    /// Monotonic capture timestamp
    pub timestamp: Instant,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Owned pixel buffer, layout defined by the producer
    pub pixels: Bytes,
}

impl Frame {
    pub fn new(seq: u64, timestamp: Instant, width: u32, height: u32, pixels: Bytes) -> Self {
        Self {
            seq,
            timestamp,
            width,
            height,
            pixels,
        }
    }

    /// How far this frame's capture time lags behind `now`
    pub fn staleness(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }
}

/// Axis-aligned bounding box in normalized image coordinates ([0,1] range,
/// origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        if self.w <= 0.0 || self.h <= 0.0 {
            return 0.0;
        }
        self.w * self.h
    }

    /// Center point of the box
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Bottom edge y coordinate
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
            && self.w >= 0.0
            && self.h >= 0.0
    }

    /// Compute IoU (Intersection over Union) with another box.
    ///
    /// Returns 0.0 for degenerate or non-finite boxes instead of propagating
    /// NaN into matching decisions.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if !self.is_valid() || !other.is_valid() {
            return 0.0;
        }

        let x_min = self.x.max(other.x);
        let y_min = self.y.max(other.y);
        let x_max = (self.x + self.w).min(other.x + other.w);
        let y_max = (self.y + self.h).min(other.y + other.h);

        if x_max <= x_min || y_max <= y_min {
            return 0.0;
        }

        let inter = (x_max - x_min) * (y_max - y_min);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }

        // Rounding can push the ratio a hair past 1.0 for identical boxes;
        // clamp rather than reject, or a box would fail to match itself.
        let iou = inter / union;
        if iou.is_finite() {
            iou.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Euclidean distance between the centers of two boxes
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }
}

/// Role of a perception model in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelRole {
    /// Object detection (bounding boxes + class labels)
    Detector,
    /// Semantic segmentation (walkable surface mask)
    Segmenter,
    /// Text recognition (OCR)
    TextReader,
}

impl ModelRole {
    pub const ALL: [ModelRole; 3] = [ModelRole::Detector, ModelRole::Segmenter, ModelRole::TextReader];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Detector => "detector",
            ModelRole::Segmenter => "segmenter",
            ModelRole::TextReader => "text_reader",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ModelRole::Detector => 0,
            ModelRole::Segmenter => 1,
            ModelRole::TextReader => 2,
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Output of one detector invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Sequence number of the frame this result was computed from
    pub frame_seq: u64,
    pub detections: Vec<Detection>,
}

/// Output of one segmenter invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub frame_seq: u64,
    pub mask: SurfaceMask,
}

/// A single recognized text region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDetection {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Output of one text reader invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResult {
    pub frame_seq: u64,
    pub texts: Vec<TextDetection>,
}

/// Tagged result variant, one per model role.
///
/// Lets the inference scheduler and the fusion engine treat all model
/// runners uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelOutput {
    Detections(DetectionResult),
    Surfaces(SegmentationResult),
    Texts(TextResult),
}

impl ModelOutput {
    /// Sequence number of the frame the result was computed from
    pub fn frame_seq(&self) -> u64 {
        match self {
            ModelOutput::Detections(r) => r.frame_seq,
            ModelOutput::Surfaces(r) => r.frame_seq,
            ModelOutput::Texts(r) => r.frame_seq,
        }
    }

    /// Role that produced this result
    pub fn role(&self) -> ModelRole {
        match self {
            ModelOutput::Detections(_) => ModelRole::Detector,
            ModelOutput::Surfaces(_) => ModelRole::Segmenter,
            ModelOutput::Texts(_) => ModelRole::TextReader,
        }
    }
}
