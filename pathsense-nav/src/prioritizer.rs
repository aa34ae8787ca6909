//! Cue prioritizer
//!
//! Evaluates each fused scene snapshot and decides what, if anything, is
//! worth saying. Urgency blends class risk, image position, estimated
//! distance, closing velocity and surface context; only the top few cues
//! per pass are forwarded, the audio scheduler applies cooldowns.

use crate::phrases::{self, Position};
use pathsense_core::config::{CueConfig, PrioritizerConfig};
use pathsense_core::cue::{Cue, CueKind, CueTarget};
use pathsense_core::metrics::PipelineMetrics;
use pathsense_core::surface::SurfaceMask;
use pathsense_core::types::BoundingBox;
use pathsense_eye::{SceneEntity, SceneState, TextEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Clarity of the immediate walking path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClarity {
    Clear,
    Moderate,
    Obstructed,
}

impl PathClarity {
    fn phrase(&self) -> &'static str {
        match self {
            PathClarity::Clear => "path is clear",
            PathClarity::Moderate => "path partially obstructed",
            PathClarity::Obstructed => "path obstructed, proceed with caution",
        }
    }

    fn urgency(&self) -> f32 {
        match self {
            PathClarity::Clear => 2.0,
            PathClarity::Moderate => 5.0,
            PathClarity::Obstructed => 7.0,
        }
    }
}

/// Words that escalate a recognized text to warning urgency
const ALERT_WORDS: [&str; 5] = ["danger", "warning", "caution", "stop", "emergency"];

/// Ranks scene content into at most a handful of cues per pass
pub struct CuePrioritizer {
    config: PrioritizerConfig,
    cues: CueConfig,
    metrics: Arc<PipelineMetrics>,
    last_path: Option<PathClarity>,
}

impl CuePrioritizer {
    pub fn new(config: PrioritizerConfig, cues: CueConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            config,
            cues,
            metrics,
            last_path: None,
        }
    }

    /// Produce the cues for one scene snapshot, most urgent first,
    /// capped at the configured announcement budget.
    pub fn evaluate(&mut self, scene: &SceneState) -> Vec<Cue> {
        let mut candidates: Vec<Cue> = Vec::new();

        for entity in scene.entities.values() {
            if entity.confidence < self.config.min_confidence {
                continue;
            }
            candidates.push(self.entity_cue(entity, scene.surface.as_ref()));
        }

        if let Some(mask) = scene.surface.as_ref() {
            if let Some(cue) = self.path_cue(mask) {
                candidates.push(cue);
            }
        }

        for entry in &scene.texts {
            if let Some(cue) = self.text_cue(entry, scene.surface.as_ref()) {
                candidates.push(cue);
            }
        }

        candidates.sort_by(|a, b| {
            b.urgency
                .total_cmp(&a.urgency)
                .then(Self::recency(b).cmp(&Self::recency(a)))
                .then(b.created_at.cmp(&a.created_at))
        });
        candidates.truncate(self.config.max_announcements);
        self.metrics.record_cues_emitted(candidates.len());
        debug!("Prioritizer pass seq={}: {} cues", scene.reference_seq, candidates.len());
        candidates
    }

    fn entity_cue(&self, entity: &SceneEntity, mask: Option<&SurfaceMask>) -> Cue {
        let risk = self.config.risk_for(&entity.label);
        let (cx, _) = entity.bbox.center();
        let position = Position::from_center_x(cx);
        let distance = self.estimate_distance(entity);

        let position_factor = if position == Position::Center {
            self.config.center_factor
        } else {
            1.0
        };
        let mut urgency = risk * position_factor + ((10.0 - distance) / 2.0).max(0.0);

        // Closing speed: downward image motion plus horizontal motion
        // toward the image center, both mean the object nears the user
        let toward_center = ((0.5 - cx).signum() * entity.velocity.0).max(0.0);
        let closing = entity.velocity.1.max(0.0) + toward_center;
        urgency += self.config.closing_weight * closing;

        if let Some(mask) = mask {
            let footprint = BoundingBox::new(
                entity.bbox.x,
                (entity.bbox.bottom() - 0.1).max(0.0),
                entity.bbox.w,
                0.1,
            );
            urgency += self.config.surface_weight * mask.obstacle_fraction(&footprint);
        }

        let critical = self.config.critical_classes.iter().any(|c| c == &entity.label);
        if critical && distance < 2.0 && position == Position::Center {
            urgency += self.config.critical_boost;
        }

        let warning = distance < 2.0 || risk >= self.config.risk_top_quartile();
        let (kind, message) = if warning && closing > 0.05 {
            (
                CueKind::ObstacleWarning,
                phrases::approaching_phrase(&entity.label, position),
            )
        } else if warning {
            (
                CueKind::ObstacleWarning,
                phrases::entity_phrase(&entity.label, distance, position),
            )
        } else {
            (
                CueKind::DirectionalGuidance,
                phrases::entity_phrase(&entity.label, distance, position),
            )
        };

        Cue::new(
            kind,
            urgency,
            CueTarget::Entity(entity.track_id),
            message,
            Duration::from_millis(self.cues.default_cooldown_ms),
        )
    }

    /// Pinhole estimate from apparent height against the class reference
    /// height, clamped to a sane range.
    fn estimate_distance(&self, entity: &SceneEntity) -> f32 {
        let reference = self
            .config
            .reference_heights
            .get(&entity.label)
            .copied()
            .unwrap_or(self.config.default_reference_height);
        let pixel_height = entity.bbox.h * self.config.nominal_frame_height;
        if pixel_height <= 1.0 {
            return 20.0;
        }
        (self.config.focal_length * reference / pixel_height).clamp(0.5, 20.0)
    }

    /// Surface-change cue, emitted only when clarity crosses a category
    /// boundary since the previous pass.
    fn path_cue(&mut self, mask: &SurfaceMask) -> Option<Cue> {
        // Immediate path: center third, bottom third of the image
        let path_region = BoundingBox::new(1.0 / 3.0, 2.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        let walkable = mask.walkable_fraction(&path_region);

        let clarity = if walkable > self.config.clear_path_fraction {
            PathClarity::Clear
        } else if walkable > self.config.obstructed_path_fraction {
            PathClarity::Moderate
        } else {
            PathClarity::Obstructed
        };

        if self.last_path == Some(clarity) {
            return None;
        }
        self.last_path = Some(clarity);

        Some(Cue::new(
            CueKind::SurfaceChange,
            clarity.urgency(),
            CueTarget::Path,
            clarity.phrase().to_string(),
            Duration::from_millis(self.cues.surface_cooldown_ms),
        ))
    }

    /// Read-aloud cue for text overlapping the walkable path or matching
    /// a wayfinding keyword. Other OCR hits are dropped as noise.
    fn text_cue(&self, entry: &TextEntry, mask: Option<&SurfaceMask>) -> Option<Cue> {
        let wayfinding = self
            .config
            .wayfinding_keywords
            .iter()
            .any(|keyword| entry.text.contains(keyword.as_str()));
        let on_path = mask.is_some_and(|m| {
            m.walkable_fraction(&entry.bbox) >= self.config.text_path_fraction
        });
        if !wayfinding && !on_path {
            return None;
        }

        let urgency = if ALERT_WORDS.iter().any(|w| entry.text.contains(w)) {
            6.0
        } else {
            4.0
        };
        Some(Cue::new(
            CueKind::TextReadAloud,
            urgency,
            CueTarget::Text(entry.text.clone()),
            phrases::text_phrase(&entry.text),
            Duration::from_millis(self.cues.text_cooldown_ms),
        ))
    }

    /// Tie-break key for equal urgency: track ids are monotone, so a
    /// higher id is a more recently created entity
    fn recency(cue: &Cue) -> u64 {
        match &cue.target {
            CueTarget::Entity(id) => *id,
            _ => 0,
        }
    }

    /// Run the evaluation loop: one pass per published scene snapshot
    pub fn spawn(
        mut self,
        mut scene_rx: watch::Receiver<Arc<SceneState>>,
        cues_tx: mpsc::Sender<Cue>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Cue prioritizer started");
            while scene_rx.changed().await.is_ok() {
                let scene = scene_rx.borrow_and_update().clone();
                for cue in self.evaluate(&scene) {
                    if cues_tx.send(cue).await.is_err() {
                        info!("Cue channel closed, stopping prioritizer");
                        return;
                    }
                }
            }
            info!("Cue prioritizer stopped (scene channel closed)");
        })
    }
}
