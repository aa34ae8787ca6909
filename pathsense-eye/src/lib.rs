//! pathsense-eye: perception side of the pathsense navigation pipeline
//!
//! Ingests video frames, drives the detection, segmentation and text
//! recognition model runners at their own cadences, and fuses their
//! results into a single temporally-coherent scene state with cross-frame
//! object tracking.

pub mod error;
pub mod fusion;
pub mod models;
pub mod scene;
pub mod scheduler;
pub mod source;
pub mod tracking;

pub use error::VisionError;
pub use fusion::SceneFusionEngine;
pub use models::PerceptionModel;
pub use scene::{SceneEntity, SceneState, TextEntry};
pub use scheduler::InferenceScheduler;
pub use source::FrameSource;
pub use tracking::EntityStore;
