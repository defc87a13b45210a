use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use parimate_matching::{Transcriber, YandexCloud};
use parimate_media::AudioExtractor;

use crate::config::ParimateConfig;

/// Extract the audio track and print what the recognizer heard in each
/// configured language.
pub async fn handle(video: &Path, config: &ParimateConfig) -> Result<()> {
    let cloud = YandexCloud::from_env(config.yandex.clone())?;
    let transcriber = Transcriber::new(Arc::new(cloud), &config.matching);

    let workdir = tempfile::tempdir().context("Failed to create scratch directory")?;
    let audio = AudioExtractor::default()
        .extract(video, &workdir.path().join("speech.ogg"))
        .await
        .with_context(|| format!("Failed to extract audio from {}", video.display()))?;
    let transcript = transcriber.transcribe(&audio).await?;
    println!("{}", serde_json::to_string_pretty(&transcript)?);
    Ok(())
}
