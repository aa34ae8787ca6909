//! Frame source adapter
//!
//! Normalizes frames from any producer into `Arc<Frame>` records and
//! publishes them into the pipeline channel. Producers may push at an
//! arbitrary, possibly variable, rate; publication never blocks.

use crate::error::VisionError;
use bytes::Bytes;
use parking_lot::Mutex;
use pathsense_core::metrics::PipelineMetrics;
use pathsense_core::types::Frame;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Cloneable handle producers use to push frames into the pipeline
#[derive(Clone)]
pub struct FrameSource {
    inner: Arc<SourceInner>,
}

struct SourceInner {
    tx: mpsc::Sender<Arc<Frame>>,
    last_seq: Mutex<Option<u64>>,
    metrics: Arc<PipelineMetrics>,
}

impl FrameSource {
    /// Create a frame source and the receiving end of its bounded channel
    pub fn new(
        queue_depth: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> (Self, mpsc::Receiver<Arc<Frame>>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        info!("Frame source created with queue depth {}", queue_depth.max(1));
        (
            Self {
                inner: Arc::new(SourceInner {
                    tx,
                    last_seq: Mutex::new(None),
                    metrics,
                }),
            },
            rx,
        )
    }

    /// Publish one captured frame.
    ///
    /// Sequence numbers must be strictly increasing; frames violating that
    /// or carrying zero dimensions are rejected. A full pipeline channel
    /// drops the frame instead of blocking the producer.
    pub fn publish(
        &self,
        seq: u64,
        timestamp: Instant,
        width: u32,
        height: u32,
        pixels: Bytes,
    ) -> Result<Arc<Frame>, VisionError> {
        if width == 0 || height == 0 {
            self.inner.metrics.record_frame_rejected();
            return Err(VisionError::Frame(format!(
                "Frame {} has zero dimensions ({}x{})",
                seq, width, height
            )));
        }

        {
            let mut last = self.inner.last_seq.lock();
            if let Some(prev) = *last {
                if seq <= prev {
                    self.inner.metrics.record_frame_rejected();
                    warn!("Non-monotonic frame sequence: {} after {}", seq, prev);
                    return Err(VisionError::Frame(format!(
                        "Non-monotonic frame sequence: {} after {}",
                        seq, prev
                    )));
                }
            }
            *last = Some(seq);
        }

        let frame = Arc::new(Frame::new(seq, timestamp, width, height, pixels));
        self.inner.metrics.record_frame_ingested();

        match self.inner.tx.try_send(frame.clone()) {
            Ok(()) => Ok(frame),
            Err(TrySendError::Full(_)) => {
                // Bounded latency beats completeness: newest frame loses
                // only when the consumer is already behind
                debug!("Frame channel full, dropping frame {}", seq);
                Ok(frame)
            }
            Err(TrySendError::Closed(_)) => Err(VisionError::Scheduler(
                "Frame channel closed".to_string(),
            )),
        }
    }
}
