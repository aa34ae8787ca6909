//! End-to-end tests for the vision pipeline: frame source through the
//! inference scheduler into the scene fusion engine.

use async_trait::async_trait;
use bytes::Bytes;
use pathsense_core::config::FusionConfig;
use pathsense_core::metrics::PipelineMetrics;
use pathsense_core::types::{
    BoundingBox, Detection, DetectionResult, Frame, ModelOutput, ModelRole,
};
use pathsense_eye::{
    FrameSource, InferenceScheduler, PerceptionModel, SceneFusionEngine, VisionError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Detector stub that reports one box per frame, shifted a little each
/// sequence so tracking has something to follow.
struct DriftingDetector {
    delay: Duration,
}

#[async_trait]
impl PerceptionModel for DriftingDetector {
    fn role(&self) -> ModelRole {
        ModelRole::Detector
    }

    fn name(&self) -> &str {
        "drifting-detector"
    }

    async fn infer(&self, frame: &Frame) -> Result<ModelOutput, VisionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let x = 0.1 + frame.seq as f32 * 0.005;
        Ok(ModelOutput::Detections(DetectionResult {
            frame_seq: frame.seq,
            detections: vec![Detection {
                label: "person".to_string(),
                confidence: 0.9,
                bbox: BoundingBox::new(x, 0.2, 0.2, 0.4),
            }],
        }))
    }
}

#[tokio::test]
async fn test_frames_flow_into_scene_snapshots() {
    let metrics = Arc::new(PipelineMetrics::new());
    let (source, mut frames) = FrameSource::new(8, metrics.clone());

    let scheduler = Arc::new(InferenceScheduler::new(metrics.clone()));
    scheduler
        .register(Arc::new(DriftingDetector {
            delay: Duration::ZERO,
        }))
        .unwrap();
    let (results_tx, results_rx) = mpsc::channel(8);
    scheduler.start(results_tx).unwrap();

    let (engine, snapshots) = SceneFusionEngine::new(FusionConfig::default(), metrics.clone());
    let fusion = engine.spawn(results_rx);

    // Pump: frames from the source channel into the scheduler
    let pump_scheduler = scheduler.clone();
    let pump = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            pump_scheduler.submit(&frame);
        }
    });

    let now = Instant::now();
    for seq in 1..=5u64 {
        source
            .publish(seq, now, 640, 480, Bytes::new())
            .unwrap();
        tokio::task::yield_now().await;
    }

    // Wait until the fused scene has caught up with the last frame
    let mut snapshots = snapshots;
    while snapshots.borrow_and_update().reference_seq < 5 {
        snapshots.changed().await.unwrap();
    }

    let snapshot = snapshots.borrow().clone();
    assert_eq!(snapshot.entity_count(), 1);
    let entity = snapshot.entities.values().next().unwrap();
    assert_eq!(entity.label, "person");
    assert!(entity.last_seen_seq >= 1);

    scheduler.stop().await;
    drop(source);
    pump.await.unwrap();
    fusion.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_model_backpressure_drops_intermediate_frames() {
    let metrics = Arc::new(PipelineMetrics::new());
    let scheduler = InferenceScheduler::new(metrics.clone());
    // 300ms per inference against a 30fps producer
    scheduler
        .register(Arc::new(DriftingDetector {
            delay: Duration::from_millis(300),
        }))
        .unwrap();
    let (results_tx, mut results_rx) = mpsc::channel(64);
    scheduler.start(results_tx).unwrap();

    let now = Instant::now();
    for seq in 1..=30u64 {
        let frame = Arc::new(Frame::new(seq, now, 640, 480, Bytes::new()));
        scheduler.submit(&frame);
        tokio::time::sleep(Duration::from_millis(33)).await;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;
    scheduler.stop().await;

    let mut seqs = Vec::new();
    while let Ok(output) = results_rx.try_recv() {
        seqs.push(output.frame_seq());
    }

    // Roughly one result per 300ms over a second of input, never thirty
    assert!(seqs.len() >= 3 && seqs.len() <= 6, "got {:?}", seqs);
    // Results are in order and each skips to the newest available frame
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    assert!(metrics.frames_dropped(ModelRole::Detector) >= 20);
}

#[tokio::test]
async fn test_scene_survives_model_failures() {
    struct FlakyDetector;

    #[async_trait]
    impl PerceptionModel for FlakyDetector {
        fn role(&self) -> ModelRole {
            ModelRole::Detector
        }

        fn name(&self) -> &str {
            "flaky"
        }

        async fn infer(&self, frame: &Frame) -> Result<ModelOutput, VisionError> {
            if frame.seq % 2 == 0 {
                return Err(VisionError::Inference {
                    role: ModelRole::Detector,
                    reason: "intermittent".to_string(),
                });
            }
            Ok(ModelOutput::Detections(DetectionResult {
                frame_seq: frame.seq,
                detections: vec![Detection {
                    label: "person".to_string(),
                    confidence: 0.9,
                    bbox: BoundingBox::new(0.1, 0.2, 0.2, 0.4),
                }],
            }))
        }
    }

    let metrics = Arc::new(PipelineMetrics::new());
    let scheduler = InferenceScheduler::new(metrics.clone());
    scheduler.register(Arc::new(FlakyDetector)).unwrap();
    let (results_tx, mut results_rx) = mpsc::channel(8);
    scheduler.start(results_tx).unwrap();

    let now = Instant::now();
    for seq in 1..=4u64 {
        let frame = Arc::new(Frame::new(seq, now, 640, 480, Bytes::new()));
        scheduler.submit(&frame);
        // Let each inference finish so no frame is superseded
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(results_rx.recv().await.unwrap().frame_seq(), 1);
    assert_eq!(results_rx.recv().await.unwrap().frame_seq(), 3);
    scheduler.stop().await;

    assert_eq!(metrics.inference_errors(ModelRole::Detector), 2);
}
