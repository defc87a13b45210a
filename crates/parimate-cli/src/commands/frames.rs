use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use parimate_media::{FfmpegDecoder, FrameSampler, laplacian_variance};

use crate::config::ParimateConfig;

/// Sample a video with the deepfake sampling settings and list the frames.
pub async fn handle(video: &Path, config: &ParimateConfig) -> Result<()> {
    let sampler = FrameSampler::new(Arc::new(FfmpegDecoder::default()), config.sampling.clone());
    let path = video.to_path_buf();
    let frames = tokio::task::spawn_blocking(move || sampler.sample(&path))
        .await
        .context("Frame sampling task failed")?
        .with_context(|| format!("Failed to sample {}", video.display()))?;

    println!("{} frames sampled from {}", frames.len(), video.display());
    for (i, frame) in frames.iter().enumerate() {
        println!(
            "  [{i:>3}] {}x{}  sharpness {:.1}",
            frame.width,
            frame.height,
            laplacian_variance(frame)
        );
    }
    Ok(())
}
