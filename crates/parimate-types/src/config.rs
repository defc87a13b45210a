//! Thresholds and knobs for every verification stage.
//!
//! Every field has a serde default so partial TOML files load cleanly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Distance between sampled frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stride {
    /// Every Nth decoded frame.
    Frames(usize),
    /// Every N seconds, converted with the video's frame rate.
    Seconds(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_stride")]
    pub stride: Stride,

    /// Stop after this many sampled frames.
    #[serde(default)]
    pub max_frames: Option<usize>,

    /// Only look at the first N seconds of the video.
    #[serde(default)]
    pub max_seconds: Option<f64>,

    /// Keep only this fraction (0.0 - 1.0) of the sharpest frames.
    #[serde(default)]
    pub sharpness_keep: Option<f64>,
}

fn default_stride() -> Stride {
    Stride::Seconds(1.0)
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            stride: default_stride(),
            max_frames: None,
            max_seconds: None,
            sharpness_keep: None,
        }
    }
}

/// How modification timestamps are compared against creation timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePolicy {
    /// Flag when the modification time is strictly later.
    ModifiedAfter,
    /// Flag when the two times differ at all.
    AnyDifference,
}

/// What to do when the metadata tool cannot read the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFailurePolicy {
    /// Unreadable metadata is inconclusive; later signals decide.
    FailOpen,
    /// Unreadable metadata fails the video.
    FailClosed,
}

/// Known capture device and the resolutions it records at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Lower-case make or model string, e.g. "iphone".
    pub name: String,
    pub resolutions: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Maximum tolerated container vs. track duration difference, seconds.
    #[serde(default = "default_audio_threshold")]
    pub audio_threshold: f64,

    /// Maximum tolerated drift between current and original frame rate/size.
    #[serde(default = "default_original_threshold")]
    pub original_threshold: f64,

    #[serde(default = "default_time_policy")]
    pub time_policy: TimePolicy,

    #[serde(default = "default_failure_policy")]
    pub failure_policy: MetadataFailurePolicy,

    #[serde(default = "default_device_profiles")]
    pub device_profiles: Vec<DeviceProfile>,

    /// Editing tools searched for in the comment field.
    #[serde(default = "default_editor_names")]
    pub editor_names: Vec<String>,

    /// Edit-action words searched for in the comment field.
    #[serde(default = "default_edit_words")]
    pub edit_words: Vec<String>,
}

fn default_audio_threshold() -> f64 {
    1.0
}

fn default_original_threshold() -> f64 {
    1.0
}

fn default_time_policy() -> TimePolicy {
    TimePolicy::ModifiedAfter
}

fn default_failure_policy() -> MetadataFailurePolicy {
    MetadataFailurePolicy::FailOpen
}

fn default_device_profiles() -> Vec<DeviceProfile> {
    vec![DeviceProfile {
        name: "iphone".to_string(),
        resolutions: vec![(3840, 2160), (1920, 1080), (1280, 720)],
    }]
}

fn default_editor_names() -> Vec<String> {
    [
        "Adobe",
        "Premiere",
        "Final Cut",
        "DaVinci",
        "Blender",
        "After Effects",
        "Fusion",
        "CyberLink",
        "DeepFaceLab",
        "FakeApp",
        "FaceSwap",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_edit_words() -> Vec<String> {
    vec!["adjustment".to_string(), "edit".to_string()]
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            audio_threshold: default_audio_threshold(),
            original_threshold: default_original_threshold(),
            time_policy: default_time_policy(),
            failure_policy: default_failure_policy(),
            device_profiles: default_device_profiles(),
            editor_names: default_editor_names(),
            edit_words: default_edit_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Mean IOU below this fails the video.
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f64,

    /// Ring layers peeled off the iris mask before highlight extraction.
    #[serde(default = "default_erosion_depth")]
    pub erosion_depth: usize,

    /// Minimum Hough radius is `cornea diameter / radius_min_scale`.
    #[serde(default = "default_radius_min_scale")]
    pub radius_min_scale: f64,

    /// Maximum Hough radius is `cornea diameter / radius_max_scale`.
    #[serde(default = "default_radius_max_scale")]
    pub radius_max_scale: f64,

    /// HSV value at or above which an iris pixel is a highlight.
    #[serde(default = "default_highlight_level")]
    pub highlight_level: u8,

    /// HSV value at or below which an iris pixel is pupil.
    #[serde(default = "default_pupil_level")]
    pub pupil_level: u8,

    /// Eye crop margin as a fraction of the eye width, each side.
    #[serde(default = "default_horizontal_margin")]
    pub horizontal_margin: f64,

    /// Eye crop margin as a fraction of the eye height, each side.
    #[serde(default = "default_vertical_margin")]
    pub vertical_margin: f64,

    /// Inference server answering eye landmark requests.
    #[serde(default)]
    pub landmarker_endpoint: Option<String>,
}

fn default_iou_threshold() -> f64 {
    0.5
}

fn default_erosion_depth() -> usize {
    2
}

fn default_radius_min_scale() -> f64 {
    4.5
}

fn default_radius_max_scale() -> f64 {
    2.0
}

fn default_highlight_level() -> u8 {
    150
}

fn default_pupil_level() -> u8 {
    50
}

fn default_horizontal_margin() -> f64 {
    0.25
}

fn default_vertical_margin() -> f64 {
    1.75
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            iou_threshold: default_iou_threshold(),
            erosion_depth: default_erosion_depth(),
            radius_min_scale: default_radius_min_scale(),
            radius_max_scale: default_radius_max_scale(),
            highlight_level: default_highlight_level(),
            pupil_level: default_pupil_level(),
            horizontal_margin: default_horizontal_margin(),
            vertical_margin: default_vertical_margin(),
            landmarker_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Mean authenticity confidence below this fails the video.
    #[serde(default = "default_classifier_threshold")]
    pub threshold: f64,

    /// Side of the square model input, pixels.
    #[serde(default = "default_input_size")]
    pub input_size: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Weights file handed to the classifier backend.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Inference server for the HTTP backend.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_classifier_threshold() -> f64 {
    0.5
}

fn default_input_size() -> usize {
    256
}

fn default_batch_size() -> usize {
    16
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: default_classifier_threshold(),
            input_size: default_input_size(),
            batch_size: default_batch_size(),
            model_path: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stop the deepfake chain at the first Fake signal.
    #[serde(default = "default_short_circuit")]
    pub short_circuit: bool,
}

fn default_short_circuit() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            short_circuit: default_short_circuit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Share of face-bearing frames that must match the owner's reference.
    #[serde(default = "default_identity_min_ratio")]
    pub identity_min_ratio: f64,

    /// Minimum indel similarity ratio (0 - 100) between phrase and words.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Minimum character-bigram Jaccard similarity between phrase and words.
    #[serde(default = "default_jaccard_threshold")]
    pub jaccard_threshold: f64,

    /// Cosine similarity between frames and the description.
    #[serde(default = "default_video_similarity_threshold")]
    pub video_similarity_threshold: f64,

    /// Cosine similarity between frames and the recognized speech.
    #[serde(default = "default_speech_similarity_threshold")]
    pub speech_similarity_threshold: f64,

    /// Recognition languages, tried in order.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Keep a second language when its word count is within this ratio of the best.
    #[serde(default = "default_second_language_ratio")]
    pub second_language_ratio: f64,

    /// Language task descriptions are written in.
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Language the vision-text model understands.
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Frames sampled for the identity and description checks.
    #[serde(default = "default_matching_sampling")]
    pub sampling: SamplingConfig,

    /// Inference server for face embeddings and face verification.
    #[serde(default)]
    pub face_endpoint: Option<String>,

    /// Inference server for joint image/text embeddings.
    #[serde(default)]
    pub embedding_endpoint: Option<String>,
}

fn default_identity_min_ratio() -> f64 {
    0.5
}

fn default_fuzzy_threshold() -> f64 {
    55.0
}

fn default_jaccard_threshold() -> f64 {
    0.2
}

fn default_video_similarity_threshold() -> f64 {
    0.6
}

fn default_speech_similarity_threshold() -> f64 {
    0.27
}

fn default_languages() -> Vec<String> {
    vec!["ru-RU".to_string(), "en-US".to_string()]
}

fn default_second_language_ratio() -> f64 {
    0.55
}

fn default_source_language() -> String {
    "ru".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_matching_sampling() -> SamplingConfig {
    SamplingConfig {
        stride: Stride::Seconds(1.0 / 3.0),
        max_frames: None,
        max_seconds: Some(30.0),
        sharpness_keep: None,
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            identity_min_ratio: default_identity_min_ratio(),
            fuzzy_threshold: default_fuzzy_threshold(),
            jaccard_threshold: default_jaccard_threshold(),
            video_similarity_threshold: default_video_similarity_threshold(),
            speech_similarity_threshold: default_speech_similarity_threshold(),
            languages: default_languages(),
            second_language_ratio: default_second_language_ratio(),
            source_language: default_source_language(),
            target_language: default_target_language(),
            sampling: default_matching_sampling(),
            face_endpoint: None,
            embedding_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-check deadline. A check that overruns reports `Error`; blocking
    /// work it already started finishes in the background.
    #[serde(default)]
    pub check_timeout_secs: Option<u64>,
}

impl OrchestratorConfig {
    pub fn check_timeout(&self) -> Option<std::time::Duration> {
        self.check_timeout_secs.map(std::time::Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let reflection = ReflectionConfig::default();
        assert_eq!(reflection.erosion_depth, 2);
        assert!(reflection.radius_min_scale > reflection.radius_max_scale);

        let metadata = MetadataConfig::default();
        assert_eq!(metadata.failure_policy, MetadataFailurePolicy::FailOpen);
        assert_eq!(metadata.device_profiles[0].name, "iphone");
        assert!(PipelineConfig::default().short_circuit);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ReflectionConfig = serde_json::from_str(r#"{"iou_threshold": 0.3}"#).unwrap();
        assert!((config.iou_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.highlight_level, 150);
    }

    #[test]
    fn test_stride_serialization() {
        let json = serde_json::to_string(&Stride::Frames(5)).unwrap();
        assert_eq!(json, r#"{"frames":5}"#);
        let stride: Stride = serde_json::from_str(r#"{"seconds":0.5}"#).unwrap();
        assert_eq!(stride, Stride::Seconds(0.5));
    }

    #[test]
    fn test_check_timeout() {
        let config = OrchestratorConfig {
            check_timeout_secs: Some(30),
        };
        assert_eq!(config.check_timeout(), Some(std::time::Duration::from_secs(30)));
        assert_eq!(OrchestratorConfig::default().check_timeout(), None);
    }
}
