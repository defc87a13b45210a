use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parimate_types::{ClassifierConfig, ParimateError};

use crate::input::ClassifierInput;

/// Per-frame authenticity model.
///
/// Returns one probability per input, in input order: the model's
/// confidence that the frame is a genuine capture.
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    async fn predict(&self, batch: &[ClassifierInput]) -> Result<Vec<f64>, ParimateError>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    side: usize,
    inputs: Vec<&'a [f32]>,
}

#[derive(Deserialize)]
struct PredictResponse {
    probabilities: Vec<f64>,
}

/// Classifier served over HTTP: batches are POSTed as JSON and the server
/// answers with `{"probabilities": [...]}`.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model,
        }
    }

    /// Client for `config.endpoint`, naming `config.model_path` as the
    /// weights the server should load.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ParimateError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ParimateError::Config("classifier.endpoint is not set".into()))?;
        let model = config
            .model_path
            .as_ref()
            .map(|p| p.display().to_string());
        Ok(Self::new(endpoint, model))
    }
}

#[async_trait]
impl FrameClassifier for HttpClassifier {
    async fn predict(&self, batch: &[ClassifierInput]) -> Result<Vec<f64>, ParimateError> {
        let side = batch.first().map_or(0, |i| i.side);
        let request = PredictRequest {
            model: self.model.as_deref(),
            side,
            inputs: batch.iter().map(|i| i.pixels.as_slice()).collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ParimateError::external("classifier", format!("HTTP error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ParimateError::external(
                "classifier",
                format!("server returned {status}: {body}"),
            ));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ParimateError::external("classifier", format!("bad response: {e}")))?;
        Ok(parsed.probabilities)
    }
}
