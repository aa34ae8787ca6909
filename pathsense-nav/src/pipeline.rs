//! Pipeline orchestration
//!
//! Owns the full perception-to-speech chain: frame source, inference
//! scheduler, scene fusion, cue prioritization and audio delivery. Hosts
//! push frames through the returned `FrameSource` and supply the models
//! and the speech backend; everything in between runs on tokio tasks.

use crate::error::NavError;
use crate::prioritizer::CuePrioritizer;
use parking_lot::{Mutex, RwLock};
use pathsense_core::config::PipelineConfig;
use pathsense_core::metrics::{MetricsSnapshot, PipelineMetrics};
use pathsense_core::types::ModelRole;
use pathsense_eye::{
    FrameSource, InferenceScheduler, PerceptionModel, SceneFusionEngine, SceneState,
};
use pathsense_spk::{AudioCueScheduler, SpeechOutput};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Depth of the internal model-result and cue channels
const CHANNEL_DEPTH: usize = 16;

/// The assembled navigation pipeline
pub struct NavigationPipeline {
    config: Arc<PipelineConfig>,
    metrics: Arc<PipelineMetrics>,
    scheduler: Arc<InferenceScheduler>,
    output: Arc<dyn SpeechOutput>,
    scene_rx: RwLock<Option<watch::Receiver<Arc<SceneState>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    is_running: RwLock<bool>,
}

impl NavigationPipeline {
    /// Validate the configuration and assemble an idle pipeline
    pub fn new(config: PipelineConfig, output: Arc<dyn SpeechOutput>) -> Result<Self, NavError> {
        config.validate().map_err(NavError::Config)?;
        let metrics = Arc::new(PipelineMetrics::new());
        Ok(Self {
            config: Arc::new(config),
            scheduler: Arc::new(InferenceScheduler::new(metrics.clone())),
            metrics,
            output,
            scene_rx: RwLock::new(None),
            handles: Mutex::new(Vec::new()),
            is_running: RwLock::new(false),
        })
    }

    /// Register a perception model. Its role must be enabled in the
    /// configuration and not already taken.
    pub fn register_model(&self, model: Arc<dyn PerceptionModel>) -> Result<(), NavError> {
        let enabled = match model.role() {
            ModelRole::Detector => self.config.enable_detection,
            ModelRole::Segmenter => self.config.enable_segmentation,
            ModelRole::TextReader => self.config.enable_text,
        };
        if !enabled {
            return Err(NavError::Config(format!(
                "Role {} is disabled in the pipeline configuration",
                model.role()
            )));
        }
        self.scheduler.register(model)?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Latest fused scene snapshot, if the pipeline has started
    pub fn scene_snapshot(&self) -> Option<Arc<SceneState>> {
        self.scene_rx.read().as_ref().map(|rx| rx.borrow().clone())
    }

    /// Start every stage and return the frame source the host pushes
    /// captured frames into.
    pub fn start(&self) -> Result<FrameSource, NavError> {
        {
            let mut running = self.is_running.write();
            if *running {
                return Err(NavError::Pipeline("Pipeline is already running".to_string()));
            }
            *running = true;
        }

        let (source, mut frames_rx) =
            FrameSource::new(self.config.frame_queue_depth, self.metrics.clone());
        let (results_tx, results_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (cues_tx, cues_rx) = mpsc::channel(CHANNEL_DEPTH);

        if let Err(err) = self.scheduler.start(results_tx) {
            *self.is_running.write() = false;
            return Err(err.into());
        }

        let (fusion, scene_rx) =
            SceneFusionEngine::new(self.config.fusion.clone(), self.metrics.clone());
        let prioritizer = CuePrioritizer::new(
            self.config.prioritizer.clone(),
            self.config.cues.clone(),
            self.metrics.clone(),
        );
        let cue_scheduler = AudioCueScheduler::new(
            self.config.cues.clone(),
            self.output.clone(),
            self.metrics.clone(),
        );

        let mut handles = self.handles.lock();
        let scheduler = self.scheduler.clone();
        handles.push(tokio::spawn(async move {
            while let Some(frame) = frames_rx.recv().await {
                scheduler.submit(&frame);
            }
            info!("Frame source closed, feed task stopped");
        }));
        handles.push(fusion.spawn(results_rx));
        handles.push(prioritizer.spawn(scene_rx.clone(), cues_tx));
        handles.push(cue_scheduler.spawn(cues_rx));

        *self.scene_rx.write() = Some(scene_rx);
        info!(
            "Navigation pipeline started ({} model roles)",
            self.scheduler.roles().len()
        );
        Ok(source)
    }

    /// Stop every stage. The host must have dropped its `FrameSource`
    /// clones for the feed task to finish; remaining tasks drain and exit
    /// as their upstream channels close.
    pub async fn stop(&self) {
        {
            let mut running = self.is_running.write();
            if !*running {
                return;
            }
            *running = false;
        }

        self.scheduler.stop().await;
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            handle.abort();
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!("Pipeline task ended abnormally: {}", err);
                }
            }
        }
        *self.scene_rx.write() = None;
        info!("Navigation pipeline stopped");
    }
}
