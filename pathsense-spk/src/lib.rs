//! Audio cue delivery for the navigation pipeline
//!
//! Takes prioritized cues and turns them into speech through a pluggable
//! output backend, enforcing per-cue cooldowns, urgency-ordered queueing
//! and preemption of less urgent speech.

pub mod error;
pub mod output;
pub mod scheduler;

pub use error::SpeechError;
pub use output::{NullSpeechOutput, SpeechOutput, Utterance};
pub use scheduler::AudioCueScheduler;
