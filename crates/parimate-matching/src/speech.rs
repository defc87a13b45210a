use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parimate_types::{MatchingConfig, ParimateError};

/// Speech-to-text service.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognise the speech in an audio file, assuming `language`
    /// (BCP-47, e.g. `ru-RU`).
    async fn recognize(&self, audio: &Path, language: &str) -> Result<String, ParimateError>;
}

/// Recognised speech in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageText {
    pub language: String,
    pub text: String,
    pub words: usize,
}

/// Result of transcribing a clip in every configured language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Language that produced the most words.
    pub primary: LanguageText,
    /// Runner-up, kept when its word count is close to the primary's.
    pub secondary: Option<LanguageText>,
}

impl Transcript {
    /// Every kept text, primary first.
    pub fn texts(&self) -> impl Iterator<Item = &LanguageText> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.texts().all(|t| t.text.trim().is_empty())
    }
}

/// Two-letter language code of a BCP-47 tag: `ru-RU` → `ru`.
pub fn language_code(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Transcribes in each candidate language and keeps the one the recognizer
/// understood best, judged by word count.
#[derive(Clone)]
pub struct Transcriber {
    recognizer: Arc<dyn SpeechRecognizer>,
    languages: Vec<String>,
    second_language_ratio: f64,
}

impl Transcriber {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, config: &MatchingConfig) -> Self {
        Self {
            recognizer,
            languages: config.languages.clone(),
            second_language_ratio: config.second_language_ratio,
        }
    }

    /// Fails only when every language fails.
    pub async fn transcribe(&self, audio: &Path) -> Result<Transcript, ParimateError> {
        let mut results: Vec<LanguageText> = Vec::with_capacity(self.languages.len());
        let mut last_error = None;

        for language in &self.languages {
            match self.recognizer.recognize(audio, language).await {
                Ok(text) => results.push(LanguageText {
                    language: language.clone(),
                    words: text.split_whitespace().count(),
                    text,
                }),
                Err(e) => {
                    tracing::warn!(language = %language, error = %e, "Recognition failed");
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                ParimateError::Config("no recognition languages configured".to_string())
            }));
        }

        // Stable sort keeps configuration order among equal counts.
        results.sort_by(|a, b| b.words.cmp(&a.words));
        let mut ranked = results.into_iter();
        let primary = ranked
            .next()
            .ok_or_else(|| ParimateError::Internal("empty transcript list".to_string()))?;
        let secondary = ranked.next().filter(|second| {
            primary.words > 0
                && second.words > 0
                && second.words as f64 / primary.words as f64 > self.second_language_ratio
        });

        tracing::debug!(
            language = %primary.language,
            words = primary.words,
            bilingual = secondary.is_some(),
            "Transcribed audio"
        );
        Ok(Transcript { primary, secondary })
    }
}
