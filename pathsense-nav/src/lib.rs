//! Navigation core: turns fused scene state into prioritized audio cues
//! and wires the whole perception-to-speech pipeline together.

pub mod error;
pub mod phrases;
pub mod pipeline;
pub mod prioritizer;

pub use error::NavError;
pub use pipeline::NavigationPipeline;
pub use prioritizer::{CuePrioritizer, PathClarity};
