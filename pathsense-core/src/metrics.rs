//! Pipeline observability counters
//!
//! Counters are kept locally as atomics for host applications that poll a
//! snapshot, and mirrored to the `metrics` facade for external telemetry
//! recorders.

use crate::types::ModelRole;
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared counters for the whole pipeline
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    frames_ingested: AtomicU64,
    frames_rejected: AtomicU64,
    frames_dropped: [AtomicU64; 3],
    inference_errors: [AtomicU64; 3],
    stale_results: AtomicU64,
    fusion_cycles: AtomicU64,
    fusion_latency_us: AtomicU64,
    cues_emitted: AtomicU64,
    cues_suppressed: AtomicU64,
    cues_dispatched: AtomicU64,
    cues_evicted: AtomicU64,
    cues_dropped: AtomicU64,
    speech_retries: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_ingested(&self) {
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_frames_ingested_total").increment(1);
    }

    /// A malformed or non-monotonic frame was rejected at the source
    pub fn record_frame_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_frames_rejected_total").increment(1);
    }

    /// A queued frame was replaced by a newer one for the given role
    pub fn record_frame_dropped(&self, role: ModelRole) {
        self.frames_dropped[role.index()].fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_frames_dropped_total", "role" => role.as_str()).increment(1);
    }

    pub fn record_inference_error(&self, role: ModelRole) {
        self.inference_errors[role.index()].fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_inference_errors_total", "role" => role.as_str()).increment(1);
    }

    /// A model result referenced a frame outside the acceptance window
    pub fn record_stale_result(&self) {
        self.stale_results.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_stale_results_total").increment(1);
    }

    pub fn record_fusion_cycle(&self, latency: Duration) {
        self.fusion_cycles.fetch_add(1, Ordering::Relaxed);
        self.fusion_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        histogram!("pathsense_fusion_cycle_us").record(latency.as_micros() as f64);
    }

    pub fn record_cues_emitted(&self, count: usize) {
        self.cues_emitted.fetch_add(count as u64, Ordering::Relaxed);
        counter!("pathsense_cues_emitted_total").increment(count as u64);
    }

    pub fn record_cue_suppressed(&self) {
        self.cues_suppressed.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_cues_suppressed_total").increment(1);
    }

    pub fn record_cue_dispatched(&self) {
        self.cues_dispatched.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_cues_dispatched_total").increment(1);
    }

    /// A pending cue was evicted from the full priority queue
    pub fn record_cue_evicted(&self) {
        self.cues_evicted.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_cues_evicted_total").increment(1);
    }

    /// A cue was dropped after the speech output stayed unavailable
    pub fn record_cue_dropped(&self) {
        self.cues_dropped.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_cues_dropped_total").increment(1);
    }

    pub fn record_speech_retry(&self) {
        self.speech_retries.fetch_add(1, Ordering::Relaxed);
        counter!("pathsense_speech_retries_total").increment(1);
    }

    pub fn frames_dropped(&self, role: ModelRole) -> u64 {
        self.frames_dropped[role.index()].load(Ordering::Relaxed)
    }

    pub fn inference_errors(&self, role: ModelRole) -> u64 {
        self.inference_errors[role.index()].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        let cycles = self.fusion_cycles.load(Ordering::Relaxed);
        let latency_us = self.fusion_latency_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            frames_dropped_detector: self.frames_dropped(ModelRole::Detector),
            frames_dropped_segmenter: self.frames_dropped(ModelRole::Segmenter),
            frames_dropped_text_reader: self.frames_dropped(ModelRole::TextReader),
            inference_errors_detector: self.inference_errors(ModelRole::Detector),
            inference_errors_segmenter: self.inference_errors(ModelRole::Segmenter),
            inference_errors_text_reader: self.inference_errors(ModelRole::TextReader),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            fusion_cycles: cycles,
            mean_fusion_latency_us: if cycles > 0 { latency_us / cycles } else { 0 },
            cues_emitted: self.cues_emitted.load(Ordering::Relaxed),
            cues_suppressed: self.cues_suppressed.load(Ordering::Relaxed),
            cues_dispatched: self.cues_dispatched.load(Ordering::Relaxed),
            cues_evicted: self.cues_evicted.load(Ordering::Relaxed),
            cues_dropped: self.cues_dropped.load(Ordering::Relaxed),
            speech_retries: self.speech_retries.load(Ordering::Relaxed),
        }
    }
}

/// Serializable point-in-time view of the pipeline counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub frames_ingested: u64,
    pub frames_rejected: u64,
    pub frames_dropped_detector: u64,
    pub frames_dropped_segmenter: u64,
    pub frames_dropped_text_reader: u64,
    pub inference_errors_detector: u64,
    pub inference_errors_segmenter: u64,
    pub inference_errors_text_reader: u64,
    pub stale_results: u64,
    pub fusion_cycles: u64,
    pub mean_fusion_latency_us: u64,
    pub cues_emitted: u64,
    pub cues_suppressed: u64,
    pub cues_dispatched: u64,
    pub cues_evicted: u64,
    pub cues_dropped: u64,
    pub speech_retries: u64,
}
