//! Inference scheduler
//!
//! Runs one worker task per registered model role. Each role has a single
//! pending-frame slot: submitting a frame while the worker is busy replaces
//! whatever was queued, so a slow model always picks up the newest frame
//! next and latency stays bounded at one inference plus one frame.

use crate::error::VisionError;
use crate::models::PerceptionModel;
use parking_lot::{Mutex, RwLock};
use pathsense_core::metrics::PipelineMetrics;
use pathsense_core::types::{Frame, ModelOutput, ModelRole};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct RunnerState {
    role: ModelRole,
    model: Arc<dyn PerceptionModel>,
    /// Latest frame waiting for this runner, newest wins
    slot: Mutex<Option<Arc<Frame>>>,
    notify: Notify,
}

/// Dispatches frames to model runners with latest-frame-wins queueing
pub struct InferenceScheduler {
    metrics: Arc<PipelineMetrics>,
    runners: RwLock<Vec<Arc<RunnerState>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    is_running: Arc<RwLock<bool>>,
}

impl InferenceScheduler {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            metrics,
            runners: RwLock::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a model for its role. Fails while running or when the role
    /// is already taken.
    pub fn register(&self, model: Arc<dyn PerceptionModel>) -> Result<(), VisionError> {
        if *self.is_running.read() {
            return Err(VisionError::Scheduler(
                "Cannot register a model while the scheduler is running".to_string(),
            ));
        }
        let mut runners = self.runners.write();
        if runners.iter().any(|r| r.role == model.role()) {
            return Err(VisionError::Scheduler(format!(
                "A model is already registered for role {}",
                model.role()
            )));
        }
        info!("Registered model '{}' for role {}", model.name(), model.role());
        runners.push(Arc::new(RunnerState {
            role: model.role(),
            model,
            slot: Mutex::new(None),
            notify: Notify::new(),
        }));
        Ok(())
    }

    /// Roles with a registered model
    pub fn roles(&self) -> Vec<ModelRole> {
        self.runners.read().iter().map(|r| r.role).collect()
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }

    /// Start one worker task per registered runner. Results are delivered
    /// on `output_tx` in completion order.
    pub fn start(&self, output_tx: mpsc::Sender<ModelOutput>) -> Result<(), VisionError> {
        {
            let mut running = self.is_running.write();
            if *running {
                return Err(VisionError::Scheduler(
                    "Scheduler is already running".to_string(),
                ));
            }
            if self.runners.read().is_empty() {
                return Err(VisionError::Scheduler(
                    "No models registered".to_string(),
                ));
            }
            *running = true;
        }

        let mut handles = self.handles.lock();
        for runner in self.runners.read().iter() {
            let runner = runner.clone();
            let output_tx = output_tx.clone();
            let metrics = self.metrics.clone();
            let is_running = self.is_running.clone();
            handles.push(tokio::spawn(async move {
                run_worker(runner, output_tx, metrics, is_running).await;
            }));
        }
        info!("Inference scheduler started with {} runners", handles.len());
        Ok(())
    }

    /// Queue a frame for every runner. A frame already waiting in a
    /// runner's slot is replaced and counted as dropped for that role.
    pub fn submit(&self, frame: &Arc<Frame>) {
        for runner in self.runners.read().iter() {
            let previous = runner.slot.lock().replace(frame.clone());
            if let Some(old) = previous {
                self.metrics.record_frame_dropped(runner.role);
                debug!(
                    "Runner {} busy: frame {} superseded by {}",
                    runner.role, old.seq, frame.seq
                );
            }
            runner.notify.notify_one();
        }
    }

    /// Stop all workers. Queued frames are discarded.
    pub async fn stop(&self) {
        {
            let mut running = self.is_running.write();
            if !*running {
                return;
            }
            *running = false;
        }
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock();
            for runner in self.runners.read().iter() {
                runner.slot.lock().take();
                runner.notify.notify_one();
            }
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!("Inference worker panicked: {}", err);
                }
            }
        }
        info!("Inference scheduler stopped");
    }
}

async fn run_worker(
    runner: Arc<RunnerState>,
    output_tx: mpsc::Sender<ModelOutput>,
    metrics: Arc<PipelineMetrics>,
    is_running: Arc<RwLock<bool>>,
) {
    debug!("Worker for role {} started", runner.role);
    loop {
        let frame = runner.slot.lock().take();
        match frame {
            Some(frame) => match runner.model.infer(&frame).await {
                Ok(output) => {
                    if output_tx.send(output).await.is_err() {
                        warn!("Result channel closed, stopping {} worker", runner.role);
                        break;
                    }
                }
                Err(err) => {
                    metrics.record_inference_error(runner.role);
                    warn!("Inference failed for frame {}: {}", frame.seq, err);
                }
            },
            None => {
                if !*is_running.read() {
                    break;
                }
                runner.notify.notified().await;
            }
        }
    }
    debug!("Worker for role {} stopped", runner.role);
}
