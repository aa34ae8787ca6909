//! pathsense-core: shared types for the pathsense navigation pipeline
//!
//! Holds the data model exchanged between the perception side
//! (pathsense-eye), the cue prioritizer (pathsense-nav) and the audio
//! scheduler (pathsense-spk): frames, model results, surface masks, cues,
//! the pipeline configuration and the shared metrics counters.

pub mod config;
pub mod cue;
pub mod error;
pub mod metrics;
pub mod surface;
pub mod types;

pub use config::{CueConfig, FusionConfig, PipelineConfig, PrioritizerConfig};
pub use cue::{Cue, CueKind, CuePair, CueTarget};
pub use error::{Error, Result};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use surface::{SurfaceClass, SurfaceMask, SurfaceRun};
pub use types::{
    BoundingBox, Detection, DetectionResult, Frame, ModelOutput, ModelRole, SegmentationResult,
    TextDetection, TextResult,
};
