use std::path::{Path, PathBuf};

use async_trait::async_trait;

use parimate_types::ParimateError;

/// Produces a speech-ready audio file from a video.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn extract_audio(&self, video: &Path, dest: &Path) -> Result<PathBuf, ParimateError>;
}

/// Pulls the audio track out of a video as Ogg/Opus, the format the speech
/// service accepts.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    pub ffmpeg: PathBuf,
    /// Trim to this many seconds; the recognizer rejects longer clips.
    pub max_seconds: Option<f64>,
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            max_seconds: Some(29.0),
        }
    }
}

impl AudioExtractor {
    fn build_args(&self, video: &Path, dest: &Path) -> Vec<String> {
        let mut args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-vn".to_string(),
        ];
        if let Some(secs) = self.max_seconds {
            args.push("-t".to_string());
            args.push(format!("{secs}"));
        }
        args.extend(
            ["-ac", "1", "-ar", "48000", "-acodec", "libopus", "-f", "ogg"]
                .into_iter()
                .map(String::from),
        );
        args.push(dest.display().to_string());
        args
    }

    /// Write the audio of `video` to `dest`.
    pub async fn extract(&self, video: &Path, dest: &Path) -> Result<PathBuf, ParimateError> {
        if !video.is_file() {
            return Err(ParimateError::io(video, "file does not exist"));
        }
        let output = tokio::process::Command::new(&self.ffmpeg)
            .args(self.build_args(video, dest))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| ParimateError::io(video, format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ParimateError::io(
                video,
                format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        tracing::debug!(video = %video.display(), dest = %dest.display(), "Extracted audio");
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl AudioSource for AudioExtractor {
    async fn extract_audio(&self, video: &Path, dest: &Path) -> Result<PathBuf, ParimateError> {
        self.extract(video, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_trims_and_encodes_opus() {
        let extractor = AudioExtractor::default();
        let args = extractor.build_args(Path::new("in.mp4"), Path::new("out.ogg"));
        assert!(args.windows(2).any(|w| w == ["-t", "29"]));
        assert!(args.windows(2).any(|w| w == ["-acodec", "libopus"]));
        assert_eq!(args.last().unwrap(), "out.ogg");
    }

    #[test]
    fn test_build_args_without_trim() {
        let extractor = AudioExtractor {
            max_seconds: None,
            ..AudioExtractor::default()
        };
        let args = extractor.build_args(Path::new("in.mp4"), Path::new("out.ogg"));
        assert!(!args.contains(&"-t".to_string()));
    }

    #[tokio::test]
    async fn test_missing_video_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AudioExtractor::default()
            .extract(&dir.path().join("nope.mp4"), &dir.path().join("a.ogg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParimateError::Io { .. }));
    }
}
