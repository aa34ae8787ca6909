//! Scene fusion engine
//!
//! Single consumer of all model results. Folds detections, surface masks
//! and recognized texts into one `SceneState` and publishes immutable
//! snapshots through a watch channel, so readers always observe a
//! consistent scene and never block the fusion loop.

use crate::scene::{SceneState, TextEntry};
use crate::tracking::EntityStore;
use pathsense_core::config::FusionConfig;
use pathsense_core::metrics::PipelineMetrics;
use pathsense_core::surface::SurfaceMask;
use pathsense_core::types::{ModelOutput, TextResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Folds model outputs into the live scene and publishes snapshots
pub struct SceneFusionEngine {
    config: FusionConfig,
    metrics: Arc<PipelineMetrics>,
    store: EntityStore,
    surface: Option<SurfaceMask>,
    texts: Vec<TextEntry>,
    newest_seq: u64,
    snapshot_tx: watch::Sender<Arc<SceneState>>,
}

impl SceneFusionEngine {
    /// Create the engine and the snapshot channel readers subscribe to
    pub fn new(
        config: FusionConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> (Self, watch::Receiver<Arc<SceneState>>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(SceneState::empty()));
        (
            Self {
                store: EntityStore::new(config.clone()),
                config,
                metrics,
                surface: None,
                texts: Vec::new(),
                newest_seq: 0,
                snapshot_tx,
            },
            snapshot_rx,
        )
    }

    /// Fold one model output into the scene and publish a fresh snapshot.
    ///
    /// Results referencing frames older than the stale window (relative to
    /// the newest sequence seen) are discarded whole; partially applying
    /// them would move tracks backwards in time.
    pub fn apply(&mut self, output: ModelOutput) {
        let started = Instant::now();
        let seq = output.frame_seq();

        if seq + self.config.stale_frame_window < self.newest_seq {
            self.metrics.record_stale_result();
            warn!(
                "Discarding stale {} result for frame {} (newest {})",
                output.role(),
                seq,
                self.newest_seq
            );
            return;
        }
        self.newest_seq = self.newest_seq.max(seq);

        let now = Instant::now();
        match output {
            ModelOutput::Detections(result) => {
                let update = self.store.apply_detections(&result, now);
                debug!(
                    "Fused detections seq={}: {} matched, {} created, {} removed",
                    result.frame_seq, update.matched, update.created, update.removed
                );
            }
            ModelOutput::Surfaces(result) => {
                // Newest mask wholesale replaces the previous one
                self.surface = Some(result.mask);
            }
            ModelOutput::Texts(result) => {
                self.merge_texts(result, now);
            }
        }
        self.expire_texts(now);

        self.publish(now);
        self.metrics.record_fusion_cycle(started.elapsed());
    }

    /// Upsert recognized texts. A text matching a prior entry (same
    /// normalized string, center within the merge radius) refreshes that
    /// entry instead of duplicating it.
    fn merge_texts(&mut self, result: TextResult, now: Instant) {
        for text in result.texts {
            let normalized = text.text.trim().to_lowercase();
            if normalized.len() < 2 {
                continue;
            }

            let existing = self.texts.iter_mut().find(|entry| {
                entry.text == normalized
                    && entry.bbox.center_distance(&text.bbox) <= self.config.text_merge_radius
            });
            match existing {
                Some(entry) => {
                    entry.bbox = text.bbox;
                    entry.confidence = entry.confidence.max(text.confidence);
                    entry.last_seen = now;
                    entry.last_seen_seq = result.frame_seq;
                }
                None => {
                    self.texts.push(TextEntry::new(
                        normalized,
                        text.confidence,
                        text.bbox,
                        result.frame_seq,
                        now,
                    ));
                }
            }
        }
    }

    fn expire_texts(&mut self, now: Instant) {
        let ttl = Duration::from_millis(self.config.text_ttl_ms);
        self.texts.retain(|entry| entry.staleness(now) <= ttl);
    }

    fn publish(&self, now: Instant) {
        self.snapshot_tx.send_replace(Arc::new(SceneState {
            entities: self.store.entities().clone(),
            surface: self.surface.clone(),
            texts: self.texts.clone(),
            reference_seq: self.newest_seq,
            reference_time: now,
        }));
    }

    /// Run the fusion loop on its own task until the result channel closes
    pub fn spawn(mut self, mut results: mpsc::Receiver<ModelOutput>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Scene fusion engine started");
            while let Some(output) = results.recv().await {
                self.apply(output);
            }
            info!("Scene fusion engine stopped (result channel closed)");
        })
    }
}
