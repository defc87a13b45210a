use std::sync::Arc;

use parimate_types::{CheckResult, ClassifierConfig, Frame, ParimateError};

use crate::input::{ClassifierInput, prepare};
use crate::model::FrameClassifier;

/// Learned per-frame classifier, averaged over the session.
#[derive(Clone)]
pub struct ClassifierSignal {
    model: Arc<dyn FrameClassifier>,
    config: ClassifierConfig,
}

impl ClassifierSignal {
    pub fn new(model: Arc<dyn FrameClassifier>, config: ClassifierConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Score the frames. Mean confidence below the threshold is Fake; no
    /// usable frames is Inconclusive.
    pub async fn evaluate(&self, frames: Vec<Frame>) -> Result<CheckResult, ParimateError> {
        let side = self.config.input_size;
        let inputs: Vec<ClassifierInput> = tokio::task::spawn_blocking(move || {
            frames.iter().filter_map(|f| prepare(f, side)).collect()
        })
        .await
        .map_err(|e| ParimateError::Internal(format!("preprocessing task failed: {e}")))?;

        if inputs.is_empty() {
            return Ok(CheckResult::inconclusive("no frames to classify"));
        }

        let mut probabilities = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(self.config.batch_size.max(1)) {
            let scores = self.model.predict(batch).await?;
            if scores.len() != batch.len() {
                return Err(ParimateError::external(
                    "classifier",
                    format!("{} scores for {} frames", scores.len(), batch.len()),
                ));
            }
            if let Some(bad) = scores.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                return Err(ParimateError::external(
                    "classifier",
                    format!("probability {bad} outside [0, 1]"),
                ));
            }
            probabilities.extend(scores);
        }

        let mean = probabilities.iter().sum::<f64>() / probabilities.len() as f64;
        tracing::debug!(mean, frames = probabilities.len(), "Classifier scored");
        Ok(CheckResult::scored(
            mean,
            self.config.threshold,
            probabilities.len(),
        ))
    }
}
