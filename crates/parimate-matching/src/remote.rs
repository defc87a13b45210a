use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use parimate_types::{Frame, MatchingConfig, ParimateError};

use crate::description::VisionTextEmbedder;
use crate::identity::FaceVerifier;

#[derive(Serialize)]
struct FrameBody<'a> {
    width: usize,
    height: usize,
    rgb: &'a [u8],
}

impl<'a> From<&'a Frame> for FrameBody<'a> {
    fn from(frame: &'a Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            rgb: &frame.data,
        }
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    frame: FrameBody<'a>,
    reference: &'a [f32],
}

#[derive(Serialize)]
struct FramesRequest<'a> {
    frames: Vec<FrameBody<'a>>,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct VerifyResponse {
    verified: bool,
}

fn endpoint(value: Option<&str>, key: &str) -> Result<String, ParimateError> {
    value
        .map(|e| e.trim_end_matches('/'))
        .filter(|e| !e.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ParimateError::Config(format!("matching.{key} is not set")))
}

async fn post_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    service: &str,
    url: String,
    body: &(impl Serialize + Sync),
) -> Result<T, ParimateError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| ParimateError::external(service, format!("HTTP error: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ParimateError::external(
            service,
            format!("server returned {status}: {body}"),
        ));
    }
    response
        .json()
        .await
        .map_err(|e| ParimateError::external(service, format!("bad response: {e}")))
}

/// Face model on an inference server: `POST /embed` for a reference
/// embedding, `POST /verify` to compare a frame against one.
pub struct HttpFaceVerifier {
    client: reqwest::Client,
    base: String,
}

impl HttpFaceVerifier {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Result<Self, ParimateError> {
        Ok(Self::new(endpoint(config.face_endpoint.as_deref(), "face_endpoint")?))
    }
}

#[async_trait]
impl FaceVerifier for HttpFaceVerifier {
    async fn embed(&self, frame: &Frame) -> Result<Vec<f32>, ParimateError> {
        let parsed: EmbeddingResponse = post_json(
            &self.client,
            "face",
            format!("{}/embed", self.base),
            &FrameBody::from(frame),
        )
        .await?;
        Ok(parsed.embedding)
    }

    async fn verify(&self, frame: &Frame, reference: &[f32]) -> Result<bool, ParimateError> {
        let request = VerifyRequest {
            frame: frame.into(),
            reference,
        };
        let parsed: VerifyResponse =
            post_json(&self.client, "face", format!("{}/verify", self.base), &request).await?;
        Ok(parsed.verified)
    }
}

/// Joint image/text embedding model on an inference server:
/// `POST /frames` and `POST /text`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base: String,
}

impl HttpEmbedder {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }

    pub fn from_config(config: &MatchingConfig) -> Result<Self, ParimateError> {
        Ok(Self::new(endpoint(
            config.embedding_endpoint.as_deref(),
            "embedding_endpoint",
        )?))
    }
}

#[async_trait]
impl VisionTextEmbedder for HttpEmbedder {
    async fn embed_frames(&self, frames: &[Frame]) -> Result<Vec<Vec<f32>>, ParimateError> {
        let request = FramesRequest {
            frames: frames.iter().map(FrameBody::from).collect(),
        };
        let parsed: EmbeddingsResponse = post_json(
            &self.client,
            "embedding",
            format!("{}/frames", self.base),
            &request,
        )
        .await?;
        if parsed.embeddings.len() != frames.len() {
            return Err(ParimateError::external(
                "embedding",
                format!(
                    "{} embeddings for {} frames",
                    parsed.embeddings.len(),
                    frames.len()
                ),
            ));
        }
        Ok(parsed.embeddings)
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ParimateError> {
        let parsed: EmbeddingResponse = post_json(
            &self.client,
            "embedding",
            format!("{}/text", self.base),
            &TextRequest { text },
        )
        .await?;
        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_config() {
        let err = HttpFaceVerifier::from_config(&MatchingConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ParimateError::Config(msg) if msg.contains("face_endpoint")));
        assert!(HttpEmbedder::from_config(&MatchingConfig::default()).is_err());

        let config = MatchingConfig {
            face_endpoint: Some("http://models:8600/".into()),
            embedding_endpoint: Some("http://models:8700".into()),
            ..MatchingConfig::default()
        };
        assert_eq!(HttpFaceVerifier::from_config(&config).unwrap().base, "http://models:8600");
        assert_eq!(HttpEmbedder::from_config(&config).unwrap().base, "http://models:8700");
    }

    #[test]
    fn test_verify_request_shape() {
        let frame = Frame::filled(1, 1, [9, 8, 7]);
        let request = VerifyRequest {
            frame: (&frame).into(),
            reference: &[0.5, -0.5],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "frame": {"width": 1, "height": 1, "rgb": [9, 8, 7]},
                "reference": [0.5, -0.5]
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_servers_are_external_errors() {
        let frame = Frame::filled(2, 2, [0, 0, 0]);

        let verifier = HttpFaceVerifier::new("http://127.0.0.1:9");
        let err = verifier.verify(&frame, &[1.0]).await.unwrap_err();
        assert!(matches!(err, ParimateError::ExternalService { service, .. } if service == "face"));

        let embedder = HttpEmbedder::new("http://127.0.0.1:9");
        let err = embedder.embed_frames(&[frame]).await.unwrap_err();
        assert!(matches!(err, ParimateError::ExternalService { .. }));
    }
}
