use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use parimate_media::{AudioSource, FrameSampler};
use parimate_types::{
    Check, CheckContext, CheckId, CheckOutcome, CheckResult, Evidence, Frame, MatchingConfig,
    ParimateError,
};

use crate::speech::{Transcriber, language_code};

/// Text translation service.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str)
    -> Result<String, ParimateError>;
}

/// Joint image/text embedding model.
#[async_trait]
pub trait VisionTextEmbedder: Send + Sync {
    /// One embedding per frame, in order.
    async fn embed_frames(&self, frames: &[Frame]) -> Result<Vec<Vec<f32>>, ParimateError>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ParimateError>;
}

/// Cosine similarity; zero when either vector has no length.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Highest similarity between any frame and the text.
pub fn best_similarity(frames: &[Vec<f32>], text: &[f32]) -> Option<f64> {
    frames.iter().map(|f| cosine(f, text)).reduce(f64::max)
}

/// The video shows what the task description says.
///
/// Frames are compared with the translated description and, separately,
/// with the translated speech track. Either similarity clearing its
/// threshold passes the check.
#[derive(Clone)]
pub struct DescriptionCheck {
    sampler: FrameSampler,
    embedder: Arc<dyn VisionTextEmbedder>,
    translator: Arc<dyn Translator>,
    audio: Arc<dyn AudioSource>,
    transcriber: Transcriber,
    config: MatchingConfig,
}

impl DescriptionCheck {
    pub fn new(
        sampler: FrameSampler,
        embedder: Arc<dyn VisionTextEmbedder>,
        translator: Arc<dyn Translator>,
        audio: Arc<dyn AudioSource>,
        transcriber: Transcriber,
        config: MatchingConfig,
    ) -> Self {
        Self {
            sampler,
            embedder,
            translator,
            audio,
            transcriber,
            config,
        }
    }

    async fn to_target(&self, text: &str, source: &str) -> Result<String, ParimateError> {
        let target = self.config.target_language.as_str();
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        self.translator.translate(text, source, target).await
    }

    /// Similarity of the frames to what is said in the video.
    async fn speech_similarity(
        &self,
        ctx: &CheckContext,
        frames: &[Vec<f32>],
    ) -> Result<Option<f64>, ParimateError> {
        let workdir = tempfile::tempdir()
            .map_err(|e| ParimateError::io(std::env::temp_dir(), format!("tempdir: {e}")))?;
        let audio = self
            .audio
            .extract_audio(&ctx.video_path, &workdir.path().join("speech.ogg"))
            .await?;
        let transcript = self.transcriber.transcribe(&audio).await?;
        if transcript.is_empty() {
            return Ok(None);
        }
        let spoken = self
            .to_target(
                &transcript.primary.text,
                language_code(&transcript.primary.language),
            )
            .await?;
        let embedding = self.embedder.embed_text(&spoken).await?;
        Ok(best_similarity(frames, &embedding))
    }
}

#[async_trait]
impl Check for DescriptionCheck {
    fn id(&self) -> CheckId {
        CheckId::Description
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckResult, ParimateError> {
        let sampler = self.sampler.clone();
        let path: PathBuf = ctx.video_path.clone();
        let frames = tokio::task::spawn_blocking(move || sampler.sample(&path))
            .await
            .map_err(|e| ParimateError::Internal(format!("frame sampling task failed: {e}")))??;
        if frames.is_empty() {
            return Ok(CheckResult::inconclusive("no frames to compare"));
        }

        let frame_embeddings = self.embedder.embed_frames(&frames).await?;
        let description = self
            .to_target(&ctx.task.description, &self.config.source_language)
            .await?;
        let description_embedding = self.embedder.embed_text(&description).await?;
        let video_similarity =
            best_similarity(&frame_embeddings, &description_embedding).unwrap_or(0.0);

        let speech_similarity = match self.speech_similarity(ctx, &frame_embeddings).await {
            Ok(similarity) => similarity,
            Err(e) => {
                tracing::warn!(session_id = %ctx.session_id, error = %e, "Speech comparison unavailable");
                None
            }
        };

        let video_ok = video_similarity >= self.config.video_similarity_threshold;
        let speech_ok =
            speech_similarity.is_some_and(|s| s >= self.config.speech_similarity_threshold);
        let outcome = if video_ok || speech_ok {
            CheckOutcome::Correct
        } else {
            CheckOutcome::Fake
        };

        let mut notes = vec![format!("video similarity {video_similarity:.3}")];
        match speech_similarity {
            Some(s) => notes.push(format!("speech similarity {s:.3}")),
            None => notes.push("no speech compared".to_string()),
        }
        tracing::info!(
            session_id = %ctx.session_id,
            outcome = ?outcome,
            video_similarity,
            frames = frames.len(),
            "Description check finished"
        );
        Ok(CheckResult::new(
            outcome,
            Evidence {
                score: Some(video_similarity),
                threshold: Some(self.config.video_similarity_threshold),
                samples: frames.len(),
                notes,
            },
        ))
    }
}
