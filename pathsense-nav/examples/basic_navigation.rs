//! Basic example of running the navigation pipeline with stub models

use async_trait::async_trait;
use bytes::Bytes;
use pathsense_core::config::PipelineConfig;
use pathsense_core::types::{
    BoundingBox, Detection, DetectionResult, Frame, ModelOutput, ModelRole,
};
use pathsense_eye::{PerceptionModel, VisionError};
use pathsense_nav::NavigationPipeline;
use pathsense_spk::{SpeechError, SpeechOutput, Utterance};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Pretends to see a pedestrian drifting across the view
struct DemoDetector;

#[async_trait]
impl PerceptionModel for DemoDetector {
    fn role(&self) -> ModelRole {
        ModelRole::Detector
    }

    fn name(&self) -> &str {
        "demo-detector"
    }

    async fn infer(&self, frame: &Frame) -> Result<ModelOutput, VisionError> {
        let x = 0.2 + (frame.seq % 60) as f32 * 0.005;
        Ok(ModelOutput::Detections(DetectionResult {
            frame_seq: frame.seq,
            detections: vec![Detection {
                label: "person".to_string(),
                confidence: 0.9,
                bbox: BoundingBox::new(x, 0.2, 0.2, 0.5),
            }],
        }))
    }
}

/// Prints cues instead of speaking them
struct ConsoleSpeech;

#[async_trait]
impl SpeechOutput for ConsoleSpeech {
    fn name(&self) -> &str {
        "console"
    }

    async fn begin(&self, text: &str, priority: f32) -> Result<Utterance, SpeechError> {
        println!("[speech p={:.1}] {}", priority, text);
        let (done_tx, done_rx) = oneshot::channel();
        let (cancel_tx, _cancel_rx) = oneshot::channel();
        let _ = done_tx.send(());
        Ok(Utterance::new(done_rx, cancel_tx))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let pipeline = NavigationPipeline::new(PipelineConfig::default(), Arc::new(ConsoleSpeech))?;
    pipeline.register_model(Arc::new(DemoDetector))?;

    let source = pipeline.start()?;
    println!("Pipeline started, feeding synthetic 30fps frames for 5 seconds");

    for seq in 1..=150u64 {
        source.publish(seq, std::time::Instant::now(), 640, 480, Bytes::new())?;
        tokio::time::sleep(Duration::from_millis(33)).await;
    }

    if let Some(scene) = pipeline.scene_snapshot() {
        println!("Final scene: {}", scene.to_json());
    }
    println!(
        "Metrics: {}",
        serde_json::to_string_pretty(&pipeline.metrics_snapshot())?
    );

    drop(source);
    pipeline.stop().await;
    println!("Pipeline stopped");
    Ok(())
}
