use std::path::Path;

use async_trait::async_trait;

use parimate_types::ParimateError;

/// Owner of submitted video files once a session no longer needs them.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn discard(&self, path: &Path) -> Result<(), ParimateError>;
}

/// Deletes videos from the local filesystem. A file that is already gone
/// counts as discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactStore;

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn discard(&self, path: &Path) -> Result<(), ParimateError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Discarded video");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Video already gone");
                Ok(())
            }
            Err(e) => Err(ParimateError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        FsArtifactStore.discard(&video).await.unwrap();
        assert!(!video.exists());
        // Second discard is a no-op.
        FsArtifactStore.discard(&video).await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsArtifactStore.discard(dir.path()).await.unwrap_err();
        assert!(matches!(err, ParimateError::Io { .. }));
    }
}
