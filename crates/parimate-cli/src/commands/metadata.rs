use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};

use parimate_metadata::{ExifTool, MetadataForensics};

use crate::config::ParimateConfig;

/// Print the metadata verdict as JSON.
pub async fn handle(video: &Path, exiftool: PathBuf, config: &ParimateConfig) -> Result<()> {
    if !video.is_file() {
        bail!("Video not found: {}", video.display());
    }
    let forensics = MetadataForensics::new(
        Arc::new(ExifTool { binary: exiftool }),
        config.metadata.clone(),
    );
    let verdict = forensics.check(video).await;
    tracing::info!(video = %video.display(), flagged = verdict.is_flagged(), "Metadata checked");
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}
