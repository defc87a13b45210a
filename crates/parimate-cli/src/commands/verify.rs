use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Args;

use parimate_matching::YandexCloud;
use parimate_media::{FfmpegDecoder, VideoDecoder};
use parimate_types::{Frame, OwnerId};

use crate::config::ParimateConfig;
use crate::pipeline::Pipeline;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Video file
    pub video: PathBuf,

    /// Submitting user
    #[arg(long, default_value_t = 0)]
    pub owner: i64,

    /// Task name
    #[arg(long, default_value = "task")]
    pub name: String,

    /// What the video should show
    #[arg(long)]
    pub description: String,

    /// Code phrase the user must say
    #[arg(long)]
    pub phrase: String,

    /// Photo of the owner for the identity check
    #[arg(long)]
    pub reference: Option<PathBuf>,
}

/// First decodable frame of an image or video.
fn first_frame(path: &Path) -> Result<Frame> {
    FfmpegDecoder::default()
        .open(path)?
        .next_frame()?
        .ok_or_else(|| anyhow!("{} has no frames", path.display()))
}

/// Run every configured check on a copy of the video and print the verdict.
pub async fn handle(args: VerifyArgs, config: &ParimateConfig) -> Result<()> {
    let cloud = match YandexCloud::from_env(config.yandex.clone()) {
        Ok(cloud) => Some(Arc::new(cloud)),
        Err(e) => {
            tracing::warn!(error = %e, "Yandex Cloud unavailable");
            None
        }
    };
    let pipeline = Pipeline::from_config(config, cloud)?;
    let owner = OwnerId(args.owner);
    let task = pipeline
        .orchestrator
        .tasks()
        .create(owner, args.name, args.description, args.phrase)
        .await;

    if let Some(photo) = args.reference {
        match &pipeline.identity {
            Some(identity) => {
                let path = photo.clone();
                let frame = tokio::task::spawn_blocking(move || first_frame(&path))
                    .await
                    .context("Reference decoding task failed")??;
                identity
                    .register_reference(owner, &frame)
                    .await
                    .with_context(|| format!("Failed to register {}", photo.display()))?;
            }
            None => tracing::warn!("Reference photo ignored: identity check is disabled"),
        }
    }

    // The session discards its video, so it gets a copy.
    let workdir = tempfile::tempdir().context("Failed to create scratch directory")?;
    let extension = args
        .video
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let upload = workdir.path().join(format!("upload.{extension}"));
    tokio::fs::copy(&args.video, &upload)
        .await
        .with_context(|| format!("Failed to read {}", args.video.display()))?;

    let verdict = pipeline
        .orchestrator
        .submit_video(owner, task.id, upload, |_| {})
        .await?
        .wait()
        .await?;
    tracing::info!(confirmed = verdict.is_confirmed(), "Verification finished");
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}
