//! Error types for pathsense-eye

use pathsense_core::types::ModelRole;
use pathsense_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// A single model call failed. Recovered locally: the scheduler treats
    /// it as "no result for this frame" and proceeds.
    #[error("Inference failure in {role}: {reason}")]
    Inference { role: ModelRole, reason: String },

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Fusion error: {0}")]
    Fusion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<VisionError> for CoreError {
    fn from(err: VisionError) -> Self {
        CoreError::Pipeline(format!("Vision error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_display() {
        let err = VisionError::Inference {
            role: ModelRole::TextReader,
            reason: "runtime unavailable".to_string(),
        };
        assert!(err.to_string().contains("text_reader"));
        assert!(err.to_string().contains("runtime unavailable"));
    }

    #[test]
    fn test_vision_error_to_core_error() {
        let err = VisionError::Frame("bad dimensions".to_string());
        let core: CoreError = err.into();
        match core {
            CoreError::Pipeline(msg) => {
                assert!(msg.contains("Vision error"));
                assert!(msg.contains("bad dimensions"));
            }
            _ => panic!("Expected Pipeline error"),
        }
    }
}
