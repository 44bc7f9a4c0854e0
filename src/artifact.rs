use crate::error::ExportError;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::debug;

/// A finalized, immutable media payload ready for transfer.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaArtifact {
    payload: Bytes,
    mime_type: String,
    file_name: String,
    created_at: DateTime<Utc>,
}

impl MediaArtifact {
    pub fn new(payload: Bytes, mime_type: &str, file_name: &str) -> Self {
        Self {
            payload,
            mime_type: mime_type.to_string(),
            file_name: file_name.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Concatenate recorded chunks in capture order. Zero chunks yield an
    /// empty but well-formed artifact.
    pub fn from_chunks<I>(chunks: I, mime_type: &str, file_name: &str) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        let mut payload = BytesMut::new();
        let mut count = 0usize;
        for chunk in chunks {
            payload.extend_from_slice(&chunk);
            count += 1;
        }
        debug!(
            "Packaged {} chunks ({} bytes) into {}",
            count,
            payload.len(),
            file_name
        );
        Self::new(payload.freeze(), mime_type, file_name)
    }

    /// Read a user-selected video file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ExportError> {
        let path = path.as_ref();
        let mime_type = video_mime_for(path).ok_or_else(|| ExportError::NotVideo {
            path: path.display().to_string(),
        })?;

        let payload = tokio::fs::read(path)
            .await
            .map_err(|source| ExportError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());

        Ok(Self::new(Bytes::from(payload), mime_type, &file_name))
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Mime type for a video file extension; `None` for anything that is not video
pub fn video_mime_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "mp4" | "m4v" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        "mkv" => Some("video/x-matroska"),
        "avi" => Some("video/x-msvideo"),
        "ogv" => Some("video/ogg"),
        "3gp" => Some("video/3gpp"),
        _ => None,
    }
}
