use std::sync::Arc;

use async_trait::async_trait;

use parimate_media::AudioSource;
use parimate_types::{
    Check, CheckContext, CheckId, CheckOutcome, CheckResult, Evidence, ParimateError,
};

use crate::phrase::{PhraseMatch, PhraseMatcher};
use crate::speech::Transcriber;

/// The task's code phrase is spoken in the video.
#[derive(Clone)]
pub struct PhraseCheck {
    audio: Arc<dyn AudioSource>,
    transcriber: Transcriber,
    matcher: PhraseMatcher,
}

impl PhraseCheck {
    pub fn new(audio: Arc<dyn AudioSource>, transcriber: Transcriber, matcher: PhraseMatcher) -> Self {
        Self {
            audio,
            transcriber,
            matcher,
        }
    }
}

#[async_trait]
impl Check for PhraseCheck {
    fn id(&self) -> CheckId {
        CheckId::Phrase
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckResult, ParimateError> {
        let phrase = ctx.task.phrase.trim();
        if phrase.is_empty() {
            return Ok(CheckResult::inconclusive("task has no phrase"));
        }

        let workdir = tempfile::tempdir()
            .map_err(|e| ParimateError::io(std::env::temp_dir(), format!("tempdir: {e}")))?;
        let audio = self
            .audio
            .extract_audio(&ctx.video_path, &workdir.path().join("speech.ogg"))
            .await?;
        let transcript = self.transcriber.transcribe(&audio).await?;

        let mut best: Option<(PhraseMatch, &str)> = None;
        for text in transcript.texts() {
            let found = self.matcher.find(&text.text, phrase);
            let better = best.as_ref().is_none_or(|(b, _)| {
                (found.matched && !b.matched) || (found.matched == b.matched && found.ratio > b.ratio)
            });
            if better {
                best = Some((found, text.language.as_str()));
            }
        }
        let Some((found, language)) = best else {
            return Ok(CheckResult::inconclusive("empty transcript"));
        };

        let outcome = if found.matched {
            CheckOutcome::Correct
        } else {
            CheckOutcome::Fake
        };
        let mut notes = vec![format!("language: {language}")];
        if let Some(window) = &found.window {
            notes.push(format!("closest: {window}"));
        }
        tracing::info!(
            session_id = %ctx.session_id,
            outcome = ?outcome,
            ratio = found.ratio,
            "Phrase check finished"
        );
        Ok(CheckResult::new(
            outcome,
            Evidence {
                score: Some(found.ratio),
                threshold: Some(self.matcher.fuzzy_threshold),
                samples: found.words,
                notes,
            },
        ))
    }
}
