use std::sync::Arc;

use anyhow::{Result, bail};

use parimate_classifier::{ClassifierSignal, HttpClassifier};
use parimate_deepfake::DeepfakeCheck;
use parimate_matching::{
    DescriptionCheck, HttpEmbedder, HttpFaceVerifier, IdentityCheck, MemoryReferenceStore,
    PhraseCheck, PhraseMatcher, Transcriber, YandexCloud,
};
use parimate_media::{AudioExtractor, AudioSource, FfmpegDecoder, FrameSampler, VideoDecoder};
use parimate_metadata::MetadataForensics;
use parimate_orchestrator::{FsArtifactStore, Orchestrator, SessionRegistry};
use parimate_reflection::{HttpLandmarker, ReflectionAnalyzer};
use parimate_types::TaskRegistry;

use crate::config::ParimateConfig;

/// Every check the configuration can back, wired into one orchestrator.
///
/// A check whose model endpoint or credentials are missing is left out
/// with a warning. Building fails only when nothing at all can run.
pub struct Pipeline {
    pub orchestrator: Orchestrator,
    /// Kept for registering reference photos.
    pub identity: Option<Arc<IdentityCheck>>,
}

impl Pipeline {
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &ParimateConfig, cloud: Option<Arc<YandexCloud>>) -> Result<Self> {
        let decoder: Arc<dyn VideoDecoder> = Arc::new(FfmpegDecoder::default());
        let audio: Arc<dyn AudioSource> = Arc::new(AudioExtractor::default());
        let mut orchestrator = Orchestrator::new(
            TaskRegistry::new(),
            SessionRegistry::new(),
            Arc::new(FsArtifactStore),
            config.orchestrator.clone(),
        );

        let deepfake = HttpLandmarker::from_config(&config.reflection).and_then(|landmarker| {
            let model = HttpClassifier::from_config(&config.classifier)?;
            Ok(DeepfakeCheck::new(
                MetadataForensics::with_exiftool(config.metadata.clone()),
                FrameSampler::new(decoder.clone(), config.sampling.clone()),
                ReflectionAnalyzer::new(Arc::new(landmarker), config.reflection.clone()),
                ClassifierSignal::new(Arc::new(model), config.classifier.clone()),
                config.pipeline.clone(),
            ))
        });
        match deepfake {
            Ok(check) => orchestrator = orchestrator.with_check(Arc::new(check)),
            Err(e) => tracing::warn!(error = %e, "Deepfake check disabled"),
        }

        let matching_sampler = FrameSampler::new(decoder, config.matching.sampling.clone());
        let identity = match HttpFaceVerifier::from_config(&config.matching) {
            Ok(verifier) => {
                let check = Arc::new(IdentityCheck::new(
                    Arc::new(verifier),
                    Arc::new(MemoryReferenceStore::new()),
                    matching_sampler.clone(),
                    &config.matching,
                ));
                orchestrator = orchestrator.with_check(check.clone());
                Some(check)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity check disabled");
                None
            }
        };

        match &cloud {
            Some(cloud) => {
                let transcriber = Transcriber::new(cloud.clone(), &config.matching);
                orchestrator = orchestrator.with_check(Arc::new(PhraseCheck::new(
                    audio.clone(),
                    transcriber.clone(),
                    PhraseMatcher::from_config(&config.matching),
                )));
                match HttpEmbedder::from_config(&config.matching) {
                    Ok(embedder) => {
                        orchestrator = orchestrator.with_check(Arc::new(DescriptionCheck::new(
                            matching_sampler,
                            Arc::new(embedder),
                            cloud.clone(),
                            audio,
                            transcriber,
                            config.matching.clone(),
                        )));
                    }
                    Err(e) => tracing::warn!(error = %e, "Description check disabled"),
                }
            }
            None => tracing::warn!("Phrase and description checks disabled: no Yandex Cloud credentials"),
        }

        let checks = orchestrator.check_ids();
        if checks.is_empty() {
            bail!("No checks can run: configure model endpoints or Yandex Cloud credentials");
        }
        tracing::info!(checks = ?checks, "Pipeline assembled");
        Ok(Self {
            orchestrator,
            identity,
        })
    }
}
