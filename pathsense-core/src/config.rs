//! Configuration for the navigation pipeline
//!
//! Every tunable named by the pipeline design (smoothing factor, IoU
//! threshold, garbage-collection threshold, cooldown intervals, the
//! class-risk table, queue bounds) lives here so hosts can adjust them
//! without code changes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Enable the object detector role
    pub enable_detection: bool,
    /// Enable the surface segmenter role
    pub enable_segmentation: bool,
    /// Enable the text reader role
    pub enable_text: bool,
    /// Depth of the inbound frame channel
    pub frame_queue_depth: usize,
    pub fusion: FusionConfig,
    pub prioritizer: PrioritizerConfig,
    pub cues: CueConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_detection: true,
            enable_segmentation: true,
            enable_text: true,
            frame_queue_depth: 8,
            fusion: FusionConfig::default(),
            prioritizer: PrioritizerConfig::default(),
            cues: CueConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_queue_depth == 0 {
            return Err("Frame queue depth must be non-zero".to_string());
        }
        if !self.enable_detection && !self.enable_segmentation && !self.enable_text {
            return Err("At least one model role must be enabled".to_string());
        }
        self.fusion.validate()?;
        self.prioritizer.validate()?;
        self.cues.validate()?;
        Ok(())
    }
}

/// Scene fusion engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Minimum IoU for matching a detection to an existing track
    pub iou_threshold: f32,
    /// Weight given to the new observation when smoothing position and
    /// velocity (0 < smoothing <= 1)
    pub smoothing: f32,
    /// Entities unseen for more than this many detection cycles are removed
    pub max_unseen_cycles: u32,
    /// Results referencing a frame more than this many sequence numbers
    /// behind the newest one seen are discarded as stale
    pub stale_frame_window: u64,
    /// Maximum center distance (normalized) for merging a recognized text
    /// with a prior text entry
    pub text_merge_radius: f32,
    /// Recognized texts unseen for longer than this are dropped (ms)
    pub text_ttl_ms: u64,
    /// Hard cap on live entities to bound memory
    pub max_entities: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            smoothing: 0.6,
            max_unseen_cycles: 10,
            stale_frame_window: 90,
            text_merge_radius: 0.05,
            text_ttl_ms: 10_000,
            max_entities: 256,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.iou_threshold) {
            return Err("IoU threshold must be in [0, 1)".to_string());
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err("Smoothing factor must be in (0, 1]".to_string());
        }
        if self.max_unseen_cycles == 0 {
            return Err("Max unseen cycles must be non-zero".to_string());
        }
        if self.stale_frame_window == 0 {
            return Err("Stale frame window must be non-zero".to_string());
        }
        if self.text_merge_radius < 0.0 || !self.text_merge_radius.is_finite() {
            return Err("Text merge radius must be finite and non-negative".to_string());
        }
        if self.max_entities == 0 {
            return Err("Max entities must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Cue prioritizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritizerConfig {
    /// Per-class risk weight (vehicle > person > static obstacle > sign text)
    pub class_risk: HashMap<String, f32>,
    /// Risk weight for classes missing from the table
    pub default_risk: f32,
    /// Multiplier applied to entities in the center third of the image
    pub center_factor: f32,
    /// Weight of the closing-velocity term
    pub closing_weight: f32,
    /// Urgency bump for entities overlapping non-walkable surface on the path
    pub surface_weight: f32,
    /// Extra urgency for critical classes close and dead ahead
    pub critical_boost: f32,
    /// Classes eligible for the critical boost
    pub critical_classes: Vec<String>,
    /// Minimum entity confidence to produce a cue
    pub min_confidence: f32,
    /// Maximum number of cues emitted per prioritizer pass
    pub max_announcements: usize,
    /// Keywords that make recognized text navigation-relevant
    pub wayfinding_keywords: Vec<String>,
    /// Walkable fraction under a text's box above which the text counts
    /// as lying on the user's path and is read aloud regardless of keywords
    pub text_path_fraction: f32,
    /// Walkable fraction of the immediate path above which it is clear
    pub clear_path_fraction: f32,
    /// Walkable fraction below which the path counts as obstructed
    pub obstructed_path_fraction: f32,
    /// Focal length proxy for the pinhole distance estimate (pixels)
    pub focal_length: f32,
    /// Frame height assumed by the distance estimate (pixels)
    pub nominal_frame_height: f32,
    /// Real-world reference heights per class (meters)
    pub reference_heights: HashMap<String, f32>,
    /// Reference height for classes missing from the table (meters)
    pub default_reference_height: f32,
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        let class_risk = [
            ("vehicle", 10.0),
            ("person", 9.0),
            ("bicycle", 8.0),
            ("animal", 7.0),
            ("chair", 6.0),
            ("bench", 6.0),
            ("traffic light", 5.0),
            ("stop sign", 5.0),
            ("object", 2.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let reference_heights = [
            ("person", 1.7),
            ("vehicle", 1.5),
            ("bicycle", 1.0),
            ("animal", 0.5),
            ("chair", 1.0),
            ("bench", 1.0),
            ("traffic light", 2.0),
            ("stop sign", 2.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let wayfinding_keywords = [
            "exit", "entrance", "warning", "danger", "caution", "stop", "stairs", "elevator",
            "escalator", "crosswalk", "curb", "emergency", "hospital", "police", "fire", "help",
        ]
        .into_iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            class_risk,
            default_risk: 2.0,
            center_factor: 2.0,
            closing_weight: 4.0,
            surface_weight: 3.0,
            critical_boost: 3.0,
            critical_classes: vec![
                "vehicle".to_string(),
                "person".to_string(),
                "bicycle".to_string(),
            ],
            min_confidence: 0.4,
            max_announcements: 4,
            wayfinding_keywords,
            text_path_fraction: 0.5,
            clear_path_fraction: 0.6,
            obstructed_path_fraction: 0.3,
            focal_length: 500.0,
            nominal_frame_height: 480.0,
            reference_heights,
            default_reference_height: 1.0,
        }
    }
}

impl PrioritizerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_announcements == 0 {
            return Err("Max announcements must be non-zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err("Min confidence must be in [0, 1]".to_string());
        }
        if self.center_factor <= 0.0 || !self.center_factor.is_finite() {
            return Err("Center factor must be positive and finite".to_string());
        }
        if self.focal_length <= 0.0 || self.nominal_frame_height <= 0.0 {
            return Err("Distance estimate parameters must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.text_path_fraction) {
            return Err("Text path fraction must be in [0, 1]".to_string());
        }
        if self.obstructed_path_fraction > self.clear_path_fraction {
            return Err("Obstructed path fraction must not exceed clear path fraction".to_string());
        }
        for (label, risk) in &self.class_risk {
            if !risk.is_finite() || *risk < 0.0 {
                return Err(format!("Risk weight for '{}' must be finite and non-negative", label));
            }
        }
        Ok(())
    }

    /// Risk weight for a class label
    pub fn risk_for(&self, label: &str) -> f32 {
        self.class_risk.get(label).copied().unwrap_or(self.default_risk)
    }

    /// Urgency threshold at the top quartile of the configured risk table
    pub fn risk_top_quartile(&self) -> f32 {
        let mut weights: Vec<f32> = self.class_risk.values().copied().collect();
        if weights.is_empty() {
            return self.default_risk;
        }
        weights.sort_by(|a, b| a.total_cmp(b));
        let idx = (weights.len() * 3) / 4;
        weights[idx.min(weights.len() - 1)]
    }
}

/// Audio cue scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    /// Bound of the pending cue priority queue
    pub queue_bound: usize,
    /// Minimum re-announcement interval for entity cues (ms)
    pub default_cooldown_ms: u64,
    /// Minimum re-announcement interval for surface-change cues (ms)
    pub surface_cooldown_ms: u64,
    /// Minimum re-announcement interval for text cues (ms)
    pub text_cooldown_ms: u64,
    /// Delay before the single retry after a speech output failure (ms)
    pub retry_delay_ms: u64,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            queue_bound: 5,
            default_cooldown_ms: 2_000,
            surface_cooldown_ms: 4_000,
            text_cooldown_ms: 4_000,
            retry_delay_ms: 100,
        }
    }
}

impl CueConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_bound == 0 {
            return Err("Cue queue bound must be non-zero".to_string());
        }
        if self.default_cooldown_ms == 0 {
            return Err("Cue cooldown must be non-zero".to_string());
        }
        Ok(())
    }
}
