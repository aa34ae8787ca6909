//! Error types for pathsense-spk

use pathsense_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    /// The output backend cannot take an utterance right now. The cue
    /// scheduler retries once after a short delay, then drops the cue.
    #[error("Speech output unavailable: {0}")]
    Unavailable(String),

    #[error("Speech output error: {0}")]
    Output(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<SpeechError> for CoreError {
    fn from(err: SpeechError) -> Self {
        CoreError::Pipeline(format!("Speech error: {}", err))
    }
}
