//! Cross-frame object tracking
//!
//! Entities live in an arena keyed by stable integer track ids; matching is
//! done by value (IoU) rather than reference identity, so garbage-collected
//! tracks can never dangle. Track ids are monotone and never reused.

use crate::scene::SceneEntity;
use pathsense_core::config::FusionConfig;
use pathsense_core::types::DetectionResult;
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Outcome of applying one detection result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionUpdate {
    pub matched: usize,
    pub created: usize,
    pub removed: usize,
}

/// Arena of tracked scene entities
pub struct EntityStore {
    entities: HashMap<u64, SceneEntity>,
    next_track_id: u64,
    config: FusionConfig,
}

impl EntityStore {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            entities: HashMap::new(),
            next_track_id: 1,
            config,
        }
    }

    pub fn entities(&self) -> &HashMap<u64, SceneEntity> {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Apply one detection result: match detections to existing tracks,
    /// create tracks for unmatched detections, age unmatched tracks and
    /// garbage-collect tracks unseen for too many cycles.
    ///
    /// Matching is one-to-one by greatest IoU above the configured
    /// threshold among same-class entities; candidate pairs are considered
    /// in order of IoU, then confidence, then lowest track id.
    pub fn apply_detections(&mut self, result: &DetectionResult, now: Instant) -> DetectionUpdate {
        let mut update = DetectionUpdate::default();

        // Candidate edges: (detection index, track id, iou, confidence)
        let mut edges: Vec<(usize, u64, f32, f32)> = Vec::new();
        for (det_idx, detection) in result.detections.iter().enumerate() {
            for (track_id, entity) in &self.entities {
                if entity.label != detection.label {
                    continue;
                }
                let iou = detection.bbox.iou(&entity.bbox);
                if iou >= self.config.iou_threshold {
                    edges.push((det_idx, *track_id, iou, detection.confidence));
                }
            }
        }
        edges.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then(b.3.total_cmp(&a.3))
                .then(a.1.cmp(&b.1))
        });

        let mut assigned = vec![false; result.detections.len()];
        let mut used_tracks: HashSet<u64> = HashSet::new();
        for (det_idx, track_id, _, _) in edges {
            if assigned[det_idx] || used_tracks.contains(&track_id) {
                continue;
            }
            if let Some(entity) = self.entities.get_mut(&track_id) {
                entity.observe(
                    &result.detections[det_idx],
                    result.frame_seq,
                    now,
                    self.config.smoothing,
                );
                assigned[det_idx] = true;
                used_tracks.insert(track_id);
                update.matched += 1;
            }
        }

        // Unmatched existing tracks age by one cycle
        for (track_id, entity) in self.entities.iter_mut() {
            if !used_tracks.contains(track_id) {
                entity.unseen_cycles += 1;
            }
        }

        // Unmatched detections start new tracks
        for (det_idx, detection) in result.detections.iter().enumerate() {
            if assigned[det_idx] {
                continue;
            }
            if self.entities.len() >= self.config.max_entities {
                warn!(
                    "Entity cap ({}) reached, skipping new track for '{}'",
                    self.config.max_entities, detection.label
                );
                break;
            }
            let track_id = self.next_track_id;
            self.next_track_id += 1;
            self.entities.insert(
                track_id,
                SceneEntity::new(track_id, detection, result.frame_seq, now),
            );
            update.created += 1;
        }

        // Garbage-collect tracks unseen for more than the configured cycles
        let before = self.entities.len();
        let max_unseen = self.config.max_unseen_cycles;
        self.entities.retain(|_, e| e.unseen_cycles <= max_unseen);
        update.removed = before - self.entities.len();

        debug!(
            "Detection cycle seq={}: {} matched, {} created, {} removed, {} live",
            result.frame_seq,
            update.matched,
            update.created,
            update.removed,
            self.entities.len()
        );
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathsense_core::types::{BoundingBox, Detection};
    use std::time::Duration;

    fn detection(label: &str, confidence: f32, bbox: (f32, f32, f32, f32)) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bbox: BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
        }
    }

    fn result(frame_seq: u64, detections: Vec<Detection>) -> DetectionResult {
        DetectionResult {
            frame_seq,
            detections,
        }
    }

    fn store() -> EntityStore {
        EntityStore::new(FusionConfig::default())
    }

    #[test]
    fn test_empty_result_on_empty_store() {
        let mut store = store();
        let update = store.apply_detections(&result(1, vec![]), Instant::now());
        assert_eq!(update, DetectionUpdate::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_new_detections_create_tracks() {
        let mut store = store();
        let update = store.apply_detections(
            &result(
                1,
                vec![
                    detection("person", 0.9, (0.1, 0.1, 0.2, 0.3)),
                    detection("vehicle", 0.8, (0.6, 0.4, 0.3, 0.3)),
                ],
            ),
            Instant::now(),
        );
        assert_eq!(update.created, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_track_identity_stable_across_cycles() {
        let mut store = store();
        let now = Instant::now();
        store.apply_detections(
            &result(1, vec![detection("person", 0.9, (0.10, 0.10, 0.2, 0.3))]),
            now,
        );
        let track_id = *store.entities().keys().next().unwrap();

        // The same object drifts slightly over several frames
        for (i, x) in [(2u64, 0.11f32), (3, 0.12), (4, 0.13)] {
            let update = store.apply_detections(
                &result(i, vec![detection("person", 0.9, (x, 0.10, 0.2, 0.3))]),
                now + Duration::from_millis(33 * i),
            );
            assert_eq!(update.matched, 1);
            assert_eq!(update.created, 0);
            assert_eq!(*store.entities().keys().next().unwrap(), track_id);
        }
    }

    #[test]
    fn test_same_frame_twice_is_idempotent() {
        let mut store = store();
        let now = Instant::now();
        let r = result(1, vec![detection("person", 0.9, (0.1, 0.1, 0.2, 0.3))]);
        store.apply_detections(&r, now);
        let update = store.apply_detections(&r, now);

        // The duplicate matches the existing track instead of forking it
        assert_eq!(update.matched, 1);
        assert_eq!(update.created, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_class_mismatch_never_matches() {
        let mut store = store();
        let now = Instant::now();
        store.apply_detections(&result(1, vec![detection("person", 0.9, (0.1, 0.1, 0.2, 0.3))]), now);
        let update = store.apply_detections(
            &result(2, vec![detection("vehicle", 0.9, (0.1, 0.1, 0.2, 0.3))]),
            now,
        );
        // Perfect overlap but different class: a new track is created
        assert_eq!(update.matched, 0);
        assert_eq!(update.created, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_one_to_one_matching() {
        let mut store = store();
        let now = Instant::now();
        store.apply_detections(&result(1, vec![detection("person", 0.9, (0.1, 0.1, 0.2, 0.3))]), now);

        // Two overlapping detections of the same class: only one may claim
        // the existing track, the other starts a new one
        let update = store.apply_detections(
            &result(
                2,
                vec![
                    detection("person", 0.9, (0.10, 0.10, 0.2, 0.3)),
                    detection("person", 0.8, (0.12, 0.10, 0.2, 0.3)),
                ],
            ),
            now,
        );
        assert_eq!(update.matched, 1);
        assert_eq!(update.created, 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_garbage_collection_exactly_once() {
        let mut config = FusionConfig::default();
        config.max_unseen_cycles = 3;
        let mut store = EntityStore::new(config);
        let now = Instant::now();
        store.apply_detections(&result(1, vec![detection("person", 0.9, (0.1, 0.1, 0.2, 0.3))]), now);
        let track_id = *store.entities().keys().next().unwrap();

        // Ages 1..=3: still alive
        for seq in 2..=4u64 {
            let update = store.apply_detections(&result(seq, vec![]), now);
            assert_eq!(update.removed, 0);
            assert_eq!(store.len(), 1);
        }

        // Fourth empty cycle exceeds the threshold: removed exactly once
        let update = store.apply_detections(&result(5, vec![]), now);
        assert_eq!(update.removed, 1);
        assert!(store.is_empty());

        // Further cycles never re-emit the removed track
        let update = store.apply_detections(&result(6, vec![]), now);
        assert_eq!(update.removed, 0);

        // A fresh detection at the same spot gets a new id
        store.apply_detections(&result(7, vec![detection("person", 0.9, (0.1, 0.1, 0.2, 0.3))]), now);
        assert_ne!(*store.entities().keys().next().unwrap(), track_id);
    }

    #[test]
    fn test_track_ids_never_reused() {
        let mut config = FusionConfig::default();
        config.max_unseen_cycles = 1;
        let mut store = EntityStore::new(config);
        let now = Instant::now();

        let mut seen_ids: HashSet<u64> = HashSet::new();
        let mut seq = 0u64;
        for _ in 0..5 {
            seq += 1;
            store.apply_detections(&result(seq, vec![detection("person", 0.9, (0.1, 0.1, 0.2, 0.3))]), now);
            seen_ids.extend(store.entities().keys().copied());
            // Let the track die
            seq += 1;
            store.apply_detections(&result(seq, vec![]), now);
            seq += 1;
            store.apply_detections(&result(seq, vec![]), now);
        }
        // Five generations, five distinct ids
        assert_eq!(seen_ids.len(), 5);
    }

    #[test]
    fn test_matched_track_resets_age() {
        let mut config = FusionConfig::default();
        config.max_unseen_cycles = 2;
        let mut store = EntityStore::new(config);
        let now = Instant::now();
        let det = detection("person", 0.9, (0.1, 0.1, 0.2, 0.3));
        store.apply_detections(&result(1, vec![det.clone()]), now);

        store.apply_detections(&result(2, vec![]), now);
        store.apply_detections(&result(3, vec![]), now);
        // Re-seen just before the threshold: survives and resets
        store.apply_detections(&result(4, vec![det.clone()]), now);
        assert_eq!(store.entities().values().next().unwrap().unseen_cycles, 0);

        store.apply_detections(&result(5, vec![]), now);
        store.apply_detections(&result(6, vec![]), now);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_entity_cap() {
        let mut config = FusionConfig::default();
        config.max_entities = 3;
        let mut store = EntityStore::new(config);
        let detections: Vec<Detection> = (0..10)
            .map(|i| detection("person", 0.9, (i as f32 * 0.09, 0.1, 0.05, 0.1)))
            .collect();
        store.apply_detections(&result(1, detections), Instant::now());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_best_iou_wins() {
        let mut store = store();
        let now = Instant::now();
        store.apply_detections(
            &result(
                1,
                vec![
                    detection("person", 0.9, (0.10, 0.10, 0.2, 0.3)),
                    detection("person", 0.9, (0.50, 0.10, 0.2, 0.3)),
                ],
            ),
            now,
        );

        // One detection overlapping both tracks, clearly closer to the
        // second: it must update that one and age the first
        let update = store.apply_detections(
            &result(2, vec![detection("person", 0.9, (0.49, 0.10, 0.2, 0.3))]),
            now,
        );
        assert_eq!(update.matched, 1);
        assert_eq!(update.created, 0);

        let aged: Vec<u32> = store.entities().values().map(|e| e.unseen_cycles).collect();
        assert!(aged.contains(&0));
        assert!(aged.contains(&1));
    }
}
