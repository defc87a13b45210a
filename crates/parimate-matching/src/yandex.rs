use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parimate_types::ParimateError;

use crate::description::Translator;
use crate::speech::SpeechRecognizer;

pub const API_KEY_VAR: &str = "YC_API_KEY";
pub const FOLDER_ID_VAR: &str = "YC_FOLDER_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YandexConfig {
    #[serde(default = "default_stt_url")]
    pub stt_url: String,

    #[serde(default = "default_translate_url")]
    pub translate_url: String,

    /// Audio encoding sent to recognition; must match the extracted track.
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_sample_rate_hertz")]
    pub sample_rate_hertz: u32,
}

fn default_stt_url() -> String {
    "https://stt.api.cloud.yandex.net/speech/v1/stt:recognize".to_string()
}

fn default_translate_url() -> String {
    "https://translate.api.cloud.yandex.net/translate/v2/translate".to_string()
}

fn default_format() -> String {
    "oggopus".to_string()
}

fn default_sample_rate_hertz() -> u32 {
    48_000
}

impl Default for YandexConfig {
    fn default() -> Self {
        Self {
            stt_url: default_stt_url(),
            translate_url: default_translate_url(),
            format: default_format(),
            sample_rate_hertz: default_sample_rate_hertz(),
        }
    }
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    result: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest<'a> {
    #[serde(rename = "folder_id")]
    folder_id: &'a str,
    texts: [&'a str; 1],
    source_language_code: &'a str,
    target_language_code: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}

/// Yandex Cloud speech recognition and translation, authenticated with an
/// API key.
pub struct YandexCloud {
    client: reqwest::Client,
    api_key: String,
    folder_id: String,
    config: YandexConfig,
}

impl YandexCloud {
    pub fn new(api_key: impl Into<String>, folder_id: impl Into<String>, config: YandexConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            folder_id: folder_id.into(),
            config,
        }
    }

    /// Credentials from `YC_API_KEY` and `YC_FOLDER_ID`.
    pub fn from_env(config: YandexConfig) -> Result<Self, ParimateError> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        config: YandexConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ParimateError> {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ParimateError::Config(format!("{name} is not set")))
        };
        Ok(Self::new(require(API_KEY_VAR)?, require(FOLDER_ID_VAR)?, config))
    }

    fn authorization(&self) -> String {
        format!("Api-Key {}", self.api_key)
    }

    async fn checked(
        service: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ParimateError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ParimateError::external(
            service,
            format!("server returned {status}: {body}"),
        ))
    }
}

#[async_trait]
impl SpeechRecognizer for YandexCloud {
    async fn recognize(&self, audio: &Path, language: &str) -> Result<String, ParimateError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| ParimateError::io(audio, e))?;
        let sample_rate = self.config.sample_rate_hertz.to_string();

        let response = self
            .client
            .post(&self.config.stt_url)
            .header("Authorization", self.authorization())
            .query(&[
                ("lang", language),
                ("format", self.config.format.as_str()),
                ("sampleRateHertz", sample_rate.as_str()),
                ("folderId", self.folder_id.as_str()),
            ])
            .body(bytes)
            .send()
            .await
            .map_err(|e| ParimateError::external("speechkit", format!("HTTP error: {e}")))?;

        let parsed: RecognizeResponse = Self::checked("speechkit", response)
            .await?
            .json()
            .await
            .map_err(|e| ParimateError::external("speechkit", format!("bad response: {e}")))?;
        Ok(parsed.result)
    }
}

#[async_trait]
impl Translator for YandexCloud {
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, ParimateError> {
        let request = TranslateRequest {
            folder_id: &self.folder_id,
            texts: [text],
            source_language_code: source,
            target_language_code: target,
        };

        let response = self
            .client
            .post(&self.config.translate_url)
            .header("Authorization", self.authorization())
            .json(&request)
            .send()
            .await
            .map_err(|e| ParimateError::external("translate", format!("HTTP error: {e}")))?;

        let parsed: TranslateResponse = Self::checked("translate", response)
            .await?
            .json()
            .await
            .map_err(|e| ParimateError::external("translate", format!("bad response: {e}")))?;
        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| ParimateError::external("translate", "empty translation list"))
    }
}
