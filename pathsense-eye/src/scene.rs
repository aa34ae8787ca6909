//! Scene state snapshot types
//!
//! `SceneState` is the single fused view of the world. It is exclusively
//! owned and mutated by the fusion engine; readers only ever see immutable
//! `Arc<SceneState>` snapshots.

use pathsense_core::surface::SurfaceMask;
use pathsense_core::types::{BoundingBox, Detection};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A tracked real-world object persisted across frames
#[derive(Debug, Clone)]
pub struct SceneEntity {
    /// Stable identifier, never reused after garbage collection
    pub track_id: u64,
    pub label: String,
    /// Smoothed last-known box in normalized image coordinates
    pub bbox: BoundingBox,
    /// Smoothed image-space velocity of the box center (units per second)
    pub velocity: (f32, f32),
    pub confidence: f32,
    /// Sequence number of the last frame this entity was matched in
    pub last_seen_seq: u64,
    /// Consecutive detection cycles without a match
    pub unseen_cycles: u32,
    pub(crate) last_update: Instant,
}

impl SceneEntity {
    pub fn new(track_id: u64, detection: &Detection, frame_seq: u64, now: Instant) -> Self {
        Self {
            track_id,
            label: detection.label.clone(),
            bbox: detection.bbox,
            velocity: (0.0, 0.0),
            confidence: detection.confidence,
            last_seen_seq: frame_seq,
            unseen_cycles: 0,
            last_update: now,
        }
    }

    /// Fold a matched detection into this entity.
    ///
    /// Position, velocity and confidence are exponentially smoothed with
    /// `smoothing` weight on the new observation; velocity uses the elapsed
    /// time since the previous update so detection jitter is absorbed
    /// without lag. A repeated frame (same or older sequence number) only
    /// refreshes the observation and never produces a velocity spike.
    pub(crate) fn observe(
        &mut self,
        detection: &Detection,
        frame_seq: u64,
        now: Instant,
        smoothing: f32,
    ) {
        let alpha = smoothing.clamp(0.0, 1.0);

        if frame_seq > self.last_seen_seq {
            let dt = now
                .duration_since(self.last_update)
                .as_secs_f32()
                .max(0.001);
            let (ncx, ncy) = detection.bbox.center();
            let (ocx, ocy) = self.bbox.center();
            let observed = ((ncx - ocx) / dt, (ncy - ocy) / dt);
            self.velocity = (
                alpha * observed.0 + (1.0 - alpha) * self.velocity.0,
                alpha * observed.1 + (1.0 - alpha) * self.velocity.1,
            );
            self.last_seen_seq = frame_seq;
        }

        self.bbox = BoundingBox::new(
            alpha * detection.bbox.x + (1.0 - alpha) * self.bbox.x,
            alpha * detection.bbox.y + (1.0 - alpha) * self.bbox.y,
            alpha * detection.bbox.w + (1.0 - alpha) * self.bbox.w,
            alpha * detection.bbox.h + (1.0 - alpha) * self.bbox.h,
        );
        self.confidence = alpha * detection.confidence + (1.0 - alpha) * self.confidence;
        self.unseen_cycles = 0;
        self.last_update = now;
    }

    /// Speed of the box center in normalized units per second
    pub fn speed(&self) -> f32 {
        (self.velocity.0.powi(2) + self.velocity.1.powi(2)).sqrt()
    }
}

/// A recognized text kept alive across fusion cycles
#[derive(Debug, Clone)]
pub struct TextEntry {
    /// Normalized (trimmed, lowercased) recognized string
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub last_seen_seq: u64,
}

impl TextEntry {
    pub fn new(text: String, confidence: f32, bbox: BoundingBox, frame_seq: u64, now: Instant) -> Self {
        Self {
            text,
            confidence,
            bbox,
            first_seen: now,
            last_seen: now,
            last_seen_seq: frame_seq,
        }
    }

    /// How long since this text was last recognized
    pub fn staleness(&self, now: Instant) -> Duration {
        now.duration_since(self.last_seen)
    }
}

/// Fused snapshot of the scene at one point in time
#[derive(Debug, Clone)]
pub struct SceneState {
    /// Live tracked entities by track id
    pub entities: HashMap<u64, SceneEntity>,
    /// Latest walkable-surface mask, if the segmenter has produced one
    pub surface: Option<SurfaceMask>,
    /// Recognized texts with staleness timestamps
    pub texts: Vec<TextEntry>,
    /// Newest frame sequence number observed by the fusion engine
    pub reference_seq: u64,
    /// Timestamp of the fusion cycle that produced this snapshot
    pub reference_time: Instant,
}

impl SceneState {
    pub fn empty() -> Self {
        Self {
            entities: HashMap::new(),
            surface: None,
            texts: Vec::new(),
            reference_seq: 0,
            reference_time: Instant::now(),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Export for external telemetry consumers
    pub fn to_json(&self) -> serde_json::Value {
        let entities: Vec<serde_json::Value> = self
            .entities
            .values()
            .map(|e| {
                json!({
                    "track_id": e.track_id,
                    "label": e.label,
                    "confidence": e.confidence,
                    "bbox": [e.bbox.x, e.bbox.y, e.bbox.w, e.bbox.h],
                    "velocity": [e.velocity.0, e.velocity.1],
                    "last_seen_seq": e.last_seen_seq,
                    "unseen_cycles": e.unseen_cycles,
                })
            })
            .collect();

        let texts: Vec<serde_json::Value> = self
            .texts
            .iter()
            .map(|t| {
                json!({
                    "text": t.text,
                    "confidence": t.confidence,
                    "bbox": [t.bbox.x, t.bbox.y, t.bbox.w, t.bbox.h],
                    "last_seen_seq": t.last_seen_seq,
                })
            })
            .collect();

        json!({
            "reference_seq": self.reference_seq,
            "entities": entities,
            "texts": texts,
            "has_surface": self.surface.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathsense_core::types::Detection;

    fn detection(label: &str, confidence: f32, bbox: BoundingBox) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_observe_smooths_position() {
        let now = Instant::now();
        let d0 = detection("person", 0.9, BoundingBox::new(0.0, 0.0, 0.2, 0.2));
        let mut entity = SceneEntity::new(1, &d0, 1, now);

        let d1 = detection("person", 0.9, BoundingBox::new(0.1, 0.0, 0.2, 0.2));
        entity.observe(&d1, 2, now + Duration::from_millis(100), 0.6);

        // 0.6 weight to the new observation: x = 0.6*0.1 + 0.4*0.0
        assert!((entity.bbox.x - 0.06).abs() < 1e-5);
        assert_eq!(entity.last_seen_seq, 2);
        assert_eq!(entity.unseen_cycles, 0);
    }

    #[test]
    fn test_observe_estimates_velocity() {
        let now = Instant::now();
        let d0 = detection("person", 0.9, BoundingBox::new(0.0, 0.0, 0.2, 0.2));
        let mut entity = SceneEntity::new(1, &d0, 1, now);

        // Center moves +0.1 in x over 100ms -> observed vx = 1.0/s
        let d1 = detection("person", 0.9, BoundingBox::new(0.1, 0.0, 0.2, 0.2));
        entity.observe(&d1, 2, now + Duration::from_millis(100), 0.6);

        assert!((entity.velocity.0 - 0.6).abs() < 1e-4);
        assert!(entity.velocity.1.abs() < 1e-4);
        assert!(entity.speed() > 0.0);
    }

    #[test]
    fn test_observe_repeated_frame_no_velocity_spike() {
        let now = Instant::now();
        let d0 = detection("person", 0.9, BoundingBox::new(0.0, 0.0, 0.2, 0.2));
        let mut entity = SceneEntity::new(1, &d0, 5, now);

        // Same sequence number delivered again: no velocity update
        entity.observe(&d0, 5, now, 0.6);
        assert_eq!(entity.velocity, (0.0, 0.0));
        assert_eq!(entity.last_seen_seq, 5);
    }

    #[test]
    fn test_scene_state_to_json() {
        let mut state = SceneState::empty();
        let d = detection("vehicle", 0.95, BoundingBox::new(0.3, 0.3, 0.4, 0.4));
        state
            .entities
            .insert(7, SceneEntity::new(7, &d, 3, Instant::now()));
        state.reference_seq = 3;

        let value = state.to_json();
        assert_eq!(value["reference_seq"], 3);
        assert_eq!(value["entities"].as_array().unwrap().len(), 1);
        assert_eq!(value["entities"][0]["label"], "vehicle");
        assert_eq!(value["has_surface"], false);
    }
}
