use crate::artifact::MediaArtifact;
use crate::config::ExportConfig;
use crate::error::ExportError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name under which recordings are offered for saving
pub const SAVED_RECORDING_NAME: &str = "recorded-video.mp4";

/// Hands an artifact to the user as a file
#[async_trait]
pub trait FileExporter: Send + Sync {
    async fn offer(&self, artifact: &MediaArtifact, file_name: &str) -> Result<PathBuf, ExportError>;
}

/// Writes artifacts into a directory, replacing any file of the same name
pub struct DirectoryExporter {
    directory: PathBuf,
}

impl DirectoryExporter {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(&config.directory)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl FileExporter for DirectoryExporter {
    async fn offer(&self, artifact: &MediaArtifact, file_name: &str) -> Result<PathBuf, ExportError> {
        let path = self.directory.join(file_name);
        let write_error = |source| ExportError::Write {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(write_error)?;
        tokio::fs::write(&path, artifact.payload())
            .await
            .map_err(write_error)?;

        info!("Saved {} bytes to {}", artifact.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_offer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DirectoryExporter::new(dir.path().join("nested"));
        let artifact = MediaArtifact::new(Bytes::from_static(b"movie"), "video/mp4", "x.mp4");

        let path = exporter.offer(&artifact, SAVED_RECORDING_NAME).await.unwrap();
        assert_eq!(path, dir.path().join("nested").join("recorded-video.mp4"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"movie");
    }

    #[tokio::test]
    async fn test_offer_overwrites_previous_save() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DirectoryExporter::new(dir.path());

        let first = MediaArtifact::new(Bytes::from_static(b"first"), "video/mp4", "a.mp4");
        let second = MediaArtifact::new(Bytes::from_static(b"second"), "video/mp4", "b.mp4");
        exporter.offer(&first, SAVED_RECORDING_NAME).await.unwrap();
        let path = exporter.offer(&second, SAVED_RECORDING_NAME).await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_offer_into_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, b"x").await.unwrap();

        let exporter = DirectoryExporter::new(&blocker);
        let artifact = MediaArtifact::new(Bytes::from_static(b"movie"), "video/mp4", "x.mp4");
        let err = exporter.offer(&artifact, SAVED_RECORDING_NAME).await.unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
    }
}
