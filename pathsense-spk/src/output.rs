//! Speech output capability boundary
//!
//! The actual voice (platform TTS, cloud synthesis, haptics bridge) is
//! supplied by the host. The scheduler only needs to start an utterance,
//! learn when it finished and be able to cut it short.

use crate::error::SpeechError;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

/// An utterance in progress.
///
/// `done` resolves when the backend finishes speaking. Cancelling (or
/// dropping the utterance) tells the backend to stop as soon as it can.
pub struct Utterance {
    pub done: oneshot::Receiver<()>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Utterance {
    pub fn new(done: oneshot::Receiver<()>, cancel: oneshot::Sender<()>) -> Self {
        Self {
            done,
            cancel: Some(cancel),
        }
    }

    /// Ask the backend to stop speaking
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

/// One speech output backend behind the cue scheduler
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Start speaking `text` and return a handle to the utterance.
    ///
    /// `priority` is the urgency of the cue being spoken; backends may
    /// use it to pick a voice, rate or audio ducking level. Must not
    /// block for the duration of the speech; the utterance's `done`
    /// channel reports completion.
    async fn begin(&self, text: &str, priority: f32) -> Result<Utterance, SpeechError>;
}

/// Output backend that swallows every utterance and completes it
/// immediately. Used when the host runs the pipeline without audio.
pub struct NullSpeechOutput;

#[async_trait]
impl SpeechOutput for NullSpeechOutput {
    fn name(&self) -> &str {
        "null"
    }

    async fn begin(&self, text: &str, priority: f32) -> Result<Utterance, SpeechError> {
        debug!("Null speech output (priority {:.1}): '{}'", priority, text);
        let (done_tx, done_rx) = oneshot::channel();
        let (cancel_tx, _cancel_rx) = oneshot::channel();
        let _ = done_tx.send(());
        Ok(Utterance::new(done_rx, cancel_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_output_completes_immediately() {
        let output = NullSpeechOutput;
        let utterance = output.begin("watch out", 5.0).await.unwrap();
        utterance.done.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_signals_backend() {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let utterance = Utterance::new(done_rx, cancel_tx);

        utterance.cancel();
        assert!(cancel_rx.await.is_ok());
        drop(done_tx);
    }
}
