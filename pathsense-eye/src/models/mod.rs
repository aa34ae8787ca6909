//! Perception model capability boundary
//!
//! The actual detection, segmentation and OCR models (weights, runtime,
//! hardware) are supplied externally. The pipeline only depends on this
//! trait, so all three roles can be scheduled uniformly.

use crate::error::VisionError;
use async_trait::async_trait;
use pathsense_core::types::{Frame, ModelOutput, ModelRole};

/// One perception model behind the inference scheduler.
///
/// `infer` executes off the caller's critical path and may take anywhere
/// from single-digit milliseconds (detector) to hundreds of milliseconds
/// (text reader on a busy frame). A failed call is reported as
/// `VisionError::Inference` and never retried: the next frame is a fresh
/// attempt.
#[async_trait]
pub trait PerceptionModel: Send + Sync {
    /// Role this model fills in the pipeline
    fn role(&self) -> ModelRole;

    /// Human-readable model name for logs
    fn name(&self) -> &str;

    /// Run inference on a single frame
    async fn infer(&self, frame: &Frame) -> Result<ModelOutput, VisionError>;
}
