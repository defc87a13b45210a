use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use parimate_types::{DetectionError, Frame, ParimateError, ReflectionConfig};

use crate::landmarks::{FaceLandmarker, FaceLandmarks};

#[derive(Serialize)]
struct DetectRequest<'a> {
    width: usize,
    height: usize,
    rgb: &'a [u8],
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<FaceLandmarks>,
}

/// Eye landmarks from an inference server. Frames are POSTed as packed RGB
/// and the server answers with `{"faces": [{"left_eye": [...], "right_eye": [...]}]}`.
///
/// `detect` blocks on the runtime that was current at construction, so it
/// may only be called from blocking worker threads.
pub struct HttpLandmarker {
    client: reqwest::Client,
    endpoint: String,
    runtime: Handle,
}

impl HttpLandmarker {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ParimateError> {
        let runtime = Handle::try_current()
            .map_err(|e| ParimateError::Config(format!("landmarker needs a tokio runtime: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            runtime,
        })
    }

    pub fn from_config(config: &ReflectionConfig) -> Result<Self, ParimateError> {
        let endpoint = config
            .landmarker_endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ParimateError::Config("reflection.landmarker_endpoint is not set".into()))?;
        Self::new(endpoint)
    }

    async fn request(&self, frame: &Frame) -> Result<Vec<FaceLandmarks>, String> {
        let request = DetectRequest {
            width: frame.width,
            height: frame.height,
            rgb: &frame.data,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("server returned {status}: {body}"));
        }
        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| format!("bad response: {e}"))?;
        Ok(parsed.faces)
    }
}

impl FaceLandmarker for HttpLandmarker {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceLandmarks>, DetectionError> {
        self.runtime
            .block_on(self.request(frame))
            .map_err(DetectionError::Landmarker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::landmarks::Point;

    #[test]
    fn test_request_and_response_shape() {
        let frame = Frame::filled(1, 1, [1, 2, 3]);
        let request = DetectRequest {
            width: frame.width,
            height: frame.height,
            rgb: &frame.data,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"width": 1, "height": 1, "rgb": [1, 2, 3]})
        );

        let parsed: DetectResponse = serde_json::from_str(
            r#"{"faces":[{"left_eye":[{"x":1.0,"y":2.0}],"right_eye":[{"x":5.0,"y":2.0}]}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.faces.len(), 1);
        assert_eq!(parsed.faces[0].right_eye, vec![Point::new(5.0, 2.0)]);

        let nobody: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(nobody.faces.is_empty());
    }

    #[test]
    fn test_needs_endpoint_and_runtime() {
        let err = HttpLandmarker::from_config(&ReflectionConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ParimateError::Config(msg) if msg.contains("landmarker_endpoint")));

        let err = HttpLandmarker::new("http://127.0.0.1:9/landmarks").err().unwrap();
        assert!(matches!(err, ParimateError::Config(msg) if msg.contains("runtime")));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_landmarker_error() {
        let landmarker = Arc::new(HttpLandmarker::new("http://127.0.0.1:9/landmarks").unwrap());
        let err = tokio::task::spawn_blocking(move || {
            landmarker.detect(&Frame::filled(4, 4, [0, 0, 0]))
        })
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, DetectionError::Landmarker(_)));
    }
}
