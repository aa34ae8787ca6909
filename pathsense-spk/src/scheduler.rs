//! Audio cue scheduler
//!
//! Single consumer of prioritized cues. Enforces the delivery policy:
//! one utterance at a time, per-target cooldowns, a bounded pending queue
//! ordered by urgency, and preemption of the active utterance by a
//! strictly more urgent cue.

use crate::output::{SpeechOutput, Utterance};
use pathsense_core::config::CueConfig;
use pathsense_core::cue::{Cue, CuePair};
use pathsense_core::metrics::PipelineMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ActiveSpeech {
    urgency: f32,
    utterance: Utterance,
}

/// Turns prioritized cues into speech, one utterance at a time
pub struct AudioCueScheduler {
    config: CueConfig,
    output: Arc<dyn SpeechOutput>,
    metrics: Arc<PipelineMetrics>,
    /// Pending cues, most urgent first, bounded by `config.queue_bound`
    pending: Vec<Cue>,
    /// Last successful dispatch per kind/target pair
    last_spoken: HashMap<CuePair, Instant>,
}

impl AudioCueScheduler {
    pub fn new(
        config: CueConfig,
        output: Arc<dyn SpeechOutput>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            config,
            output,
            metrics,
            pending: Vec::new(),
            last_spoken: HashMap::new(),
        }
    }

    /// Run the delivery loop on its own task until the cue channel closes.
    /// The active utterance, if any, is cancelled on shutdown.
    pub fn spawn(mut self, mut cues: mpsc::Receiver<Cue>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Audio cue scheduler started on '{}' output", self.output.name());
            let mut active: Option<ActiveSpeech> = None;
            loop {
                let speech_done = async {
                    match active.as_mut() {
                        Some(speech) => {
                            // Backend dropping the channel counts as done
                            let _ = (&mut speech.utterance.done).await;
                        }
                        None => std::future::pending().await,
                    }
                };
                tokio::select! {
                    maybe = cues.recv() => match maybe {
                        Some(cue) => self.enqueue(cue, Instant::now()),
                        None => break,
                    },
                    _ = speech_done => {
                        active = None;
                    }
                }
                self.pump(&mut active).await;
            }
            if let Some(speech) = active.take() {
                speech.utterance.cancel();
            }
            info!("Audio cue scheduler stopped (cue channel closed)");
        })
    }

    /// Admit a cue to the pending queue.
    ///
    /// Cues inside their pair's cooldown window are suppressed. A full
    /// queue evicts the least urgent cue, which may be the new one.
    fn enqueue(&mut self, cue: Cue, now: Instant) {
        if self.in_cooldown(&cue, now) {
            self.metrics.record_cue_suppressed();
            debug!("Suppressed {} for {:?} (cooldown)", cue.kind, cue.target);
            return;
        }

        // A newer cue for the same pair replaces the pending one
        if let Some(existing) = self.pending.iter_mut().find(|c| c.pair() == cue.pair()) {
            *existing = cue;
            self.sort_pending();
            return;
        }

        self.pending.push(cue);
        self.sort_pending();
        if self.pending.len() > self.config.queue_bound {
            let evicted = self.pending.pop();
            self.metrics.record_cue_evicted();
            if let Some(evicted) = evicted {
                debug!("Evicted {} for {:?} (queue full)", evicted.kind, evicted.target);
            }
        }
    }

    /// Dispatch pending cues: preempt less urgent active speech, then start
    /// the most urgent eligible cue if the output is idle.
    async fn pump(&mut self, active: &mut Option<ActiveSpeech>) {
        let preempt = match (active.as_ref(), self.pending.first()) {
            (Some(speech), Some(next)) => next.urgency > speech.urgency,
            _ => false,
        };
        if preempt {
            debug!("Preempting active speech for more urgent cue");
            if let Some(speech) = active.take() {
                speech.utterance.cancel();
            }
        }
        if active.is_some() {
            return;
        }

        while let Some(cue) = self.pop_next() {
            // Cooldown may have started after this cue was queued
            if self.in_cooldown(&cue, Instant::now()) {
                self.metrics.record_cue_suppressed();
                continue;
            }
            if let Some(speech) = self.speak(&cue).await {
                self.last_spoken.insert(cue.pair(), Instant::now());
                self.metrics.record_cue_dispatched();
                *active = Some(speech);
                break;
            }
        }
    }

    /// Start one utterance, retrying once if the output is unavailable.
    /// Returns `None` when the cue had to be dropped.
    async fn speak(&self, cue: &Cue) -> Option<ActiveSpeech> {
        for attempt in 0..2 {
            match self.output.begin(&cue.message, cue.urgency).await {
                Ok(utterance) => {
                    return Some(ActiveSpeech {
                        urgency: cue.urgency,
                        utterance,
                    });
                }
                Err(err) if attempt == 0 => {
                    self.metrics.record_speech_retry();
                    warn!("Speech output failed, retrying once: {}", err);
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
                Err(err) => {
                    self.metrics.record_cue_dropped();
                    warn!("Dropping cue '{}' after retry: {}", cue.message, err);
                }
            }
        }
        None
    }

    fn in_cooldown(&self, cue: &Cue, now: Instant) -> bool {
        self.last_spoken
            .get(&cue.pair())
            .is_some_and(|last| now.duration_since(*last) < cue.cooldown)
    }

    fn pop_next(&mut self) -> Option<Cue> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    fn sort_pending(&mut self) {
        self.pending
            .sort_by(|a, b| b.urgency.total_cmp(&a.urgency).then(a.created_at.cmp(&b.created_at)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NullSpeechOutput;
    use pathsense_core::cue::{CueKind, CueTarget};

    fn cue(urgency: f32, target: CueTarget) -> Cue {
        Cue::new(
            CueKind::ObstacleWarning,
            urgency,
            target,
            "obstacle ahead".to_string(),
            Duration::from_secs(2),
        )
    }

    fn scheduler() -> AudioCueScheduler {
        AudioCueScheduler::new(
            CueConfig::default(),
            Arc::new(NullSpeechOutput),
            Arc::new(PipelineMetrics::new()),
        )
    }

    #[test]
    fn test_enqueue_orders_by_urgency() {
        let mut s = scheduler();
        let now = Instant::now();
        s.enqueue(cue(2.0, CueTarget::Entity(1)), now);
        s.enqueue(cue(9.0, CueTarget::Entity(2)), now);
        s.enqueue(cue(5.0, CueTarget::Entity(3)), now);

        let urgencies: Vec<f32> = s.pending.iter().map(|c| c.urgency).collect();
        assert_eq!(urgencies, vec![9.0, 5.0, 2.0]);
    }

    #[test]
    fn test_full_queue_evicts_least_urgent() {
        let mut config = CueConfig::default();
        config.queue_bound = 2;
        let mut s = AudioCueScheduler::new(
            config,
            Arc::new(NullSpeechOutput),
            Arc::new(PipelineMetrics::new()),
        );
        let now = Instant::now();
        s.enqueue(cue(5.0, CueTarget::Entity(1)), now);
        s.enqueue(cue(3.0, CueTarget::Entity(2)), now);
        s.enqueue(cue(8.0, CueTarget::Entity(3)), now);

        assert_eq!(s.pending.len(), 2);
        let urgencies: Vec<f32> = s.pending.iter().map(|c| c.urgency).collect();
        assert_eq!(urgencies, vec![8.0, 5.0]);
    }

    #[test]
    fn test_full_queue_drops_new_cue_when_least_urgent() {
        let mut config = CueConfig::default();
        config.queue_bound = 2;
        let metrics = Arc::new(PipelineMetrics::new());
        let mut s = AudioCueScheduler::new(config, Arc::new(NullSpeechOutput), metrics.clone());
        let now = Instant::now();
        s.enqueue(cue(5.0, CueTarget::Entity(1)), now);
        s.enqueue(cue(3.0, CueTarget::Entity(2)), now);
        s.enqueue(cue(1.0, CueTarget::Entity(3)), now);

        assert_eq!(s.pending.len(), 2);
        assert!(s.pending.iter().all(|c| c.target != CueTarget::Entity(3)));
        assert_eq!(metrics.snapshot().cues_evicted, 1);
    }

    #[test]
    fn test_same_pair_replaces_pending() {
        let mut s = scheduler();
        let now = Instant::now();
        s.enqueue(cue(3.0, CueTarget::Entity(1)), now);
        s.enqueue(cue(7.0, CueTarget::Entity(1)), now);

        assert_eq!(s.pending.len(), 1);
        assert_eq!(s.pending[0].urgency, 7.0);
    }

    #[test]
    fn test_cooldown_suppresses_repeat() {
        let metrics = Arc::new(PipelineMetrics::new());
        let mut s = AudioCueScheduler::new(
            CueConfig::default(),
            Arc::new(NullSpeechOutput),
            metrics.clone(),
        );
        let now = Instant::now();
        s.last_spoken
            .insert(cue(5.0, CueTarget::Entity(1)).pair(), now);

        s.enqueue(cue(5.0, CueTarget::Entity(1)), now + Duration::from_millis(500));
        assert!(s.pending.is_empty());
        assert_eq!(metrics.snapshot().cues_suppressed, 1);

        // Past the 2s cooldown the same pair is admitted again
        s.enqueue(cue(5.0, CueTarget::Entity(1)), now + Duration::from_secs(3));
        assert_eq!(s.pending.len(), 1);
    }

    #[test]
    fn test_different_targets_do_not_share_cooldown() {
        let mut s = scheduler();
        let now = Instant::now();
        s.last_spoken
            .insert(cue(5.0, CueTarget::Entity(1)).pair(), now);

        s.enqueue(cue(5.0, CueTarget::Entity(2)), now);
        assert_eq!(s.pending.len(), 1);
    }
}
