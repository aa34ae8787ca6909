//! Error types for pathsense-nav

use pathsense_core::Error as CoreError;
use pathsense_eye::VisionError;
use pathsense_spk::SpeechError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<NavError> for CoreError {
    fn from(err: NavError) -> Self {
        CoreError::Pipeline(format!("Navigation error: {}", err))
    }
}
