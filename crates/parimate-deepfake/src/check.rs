use std::path::{Path, PathBuf};

use async_trait::async_trait;

use parimate_classifier::ClassifierSignal;
use parimate_media::FrameSampler;
use parimate_metadata::MetadataForensics;
use parimate_reflection::ReflectionAnalyzer;
use parimate_types::{
    Check, CheckContext, CheckId, CheckOutcome, CheckResult, Evidence, Frame, ParimateError,
    PipelineConfig, Signal, SignalResult,
};

/// Chains the three authenticity signals into the `deepfake` check.
///
/// With `short_circuit` on, a Fake metadata verdict returns before any
/// frame is decoded and a Fake reflection verdict skips the classifier.
#[derive(Clone)]
pub struct DeepfakeCheck {
    forensics: MetadataForensics,
    sampler: FrameSampler,
    reflection: ReflectionAnalyzer,
    classifier: ClassifierSignal,
    pipeline: PipelineConfig,
}

impl DeepfakeCheck {
    pub fn new(
        forensics: MetadataForensics,
        sampler: FrameSampler,
        reflection: ReflectionAnalyzer,
        classifier: ClassifierSignal,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            forensics,
            sampler,
            reflection,
            classifier,
            pipeline,
        }
    }

    async fn metadata_signal(&self, path: &Path) -> CheckResult {
        self.forensics
            .check(path)
            .await
            .to_result(self.forensics.config().failure_policy)
    }

    async fn sample(&self, path: &Path) -> Result<Vec<Frame>, ParimateError> {
        let sampler = self.sampler.clone();
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || sampler.sample(&path))
            .await
            .map_err(|e| ParimateError::Internal(format!("frame sampling task failed: {e}")))?
    }

    /// Reflection geometry runs on a blocking thread; the frames are handed
    /// back for the classifier.
    async fn reflection_signal(
        &self,
        frames: Vec<Frame>,
    ) -> Result<(CheckResult, Vec<Frame>), ParimateError> {
        let analyzer = self.reflection.clone();
        tokio::task::spawn_blocking(move || {
            let score = analyzer.analyze(&frames);
            (score.to_result(analyzer.config().iou_threshold), frames)
        })
        .await
        .map_err(|e| ParimateError::Internal(format!("reflection task failed: {e}")))
    }

    fn stop_here(&self, result: &CheckResult) -> bool {
        self.pipeline.short_circuit && result.outcome == CheckOutcome::Fake
    }
}

/// Combine signal outcomes: any Fake wins, then any Error, then any
/// Correct; all Inconclusive stays Inconclusive.
pub fn combine(signals: Vec<SignalResult>, frames: usize) -> CheckResult {
    let has = |outcome: CheckOutcome| signals.iter().any(|s| s.outcome == outcome);
    let outcome = if has(CheckOutcome::Fake) {
        CheckOutcome::Fake
    } else if has(CheckOutcome::Error) {
        CheckOutcome::Error
    } else if has(CheckOutcome::Correct) {
        CheckOutcome::Correct
    } else {
        CheckOutcome::Inconclusive
    };

    let notes = signals
        .iter()
        .map(|s| format!("{:?}: {:?}", s.signal, s.outcome).to_lowercase())
        .collect();
    CheckResult::new(
        outcome,
        Evidence {
            samples: frames,
            notes,
            ..Evidence::default()
        },
    )
    .with_signals(signals)
}

#[async_trait]
impl Check for DeepfakeCheck {
    fn id(&self) -> CheckId {
        CheckId::Deepfake
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckResult, ParimateError> {
        let mut signals = Vec::with_capacity(3);

        let metadata = self.metadata_signal(&ctx.video_path).await;
        signals.push(metadata.as_signal(Signal::Metadata));
        if self.stop_here(&metadata) {
            tracing::info!(session_id = %ctx.session_id, "Metadata flagged, skipping frame analysis");
            return Ok(combine(signals, 0));
        }

        let frames = self.sample(&ctx.video_path).await?;
        let frame_count = frames.len();
        tracing::debug!(session_id = %ctx.session_id, frames = frame_count, "Sampled frames");

        let (reflection, frames) = self.reflection_signal(frames).await?;
        signals.push(reflection.as_signal(Signal::Reflection));
        if self.stop_here(&reflection) {
            tracing::info!(session_id = %ctx.session_id, "Reflections inconsistent, skipping classifier");
            return Ok(combine(signals, frame_count));
        }

        let classifier = match self.classifier.evaluate(frames).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(session_id = %ctx.session_id, error = %e, "Classifier failed");
                CheckResult::error(&e)
            }
        };
        signals.push(classifier.as_signal(Signal::Classifier));

        let result = combine(signals, frame_count);
        tracing::info!(
            session_id = %ctx.session_id,
            outcome = ?result.outcome,
            frames = frame_count,
            "Deepfake check finished"
        );
        Ok(result)
    }
}
