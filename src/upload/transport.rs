use super::job::JobId;
use super::progress::TransferTick;
use crate::artifact::MediaArtifact;
use crate::config::ClipcastConfig;
use crate::error::{ClipcastError, Result, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Header carrying the client job id alongside the form field
pub const JOB_HEADER: &str = "X-Clipcast-Job";

/// What to send for one job
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub job_id: JobId,
    pub artifact: MediaArtifact,
}

/// Successful reply of the processing service
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    /// Reference to the processed output
    pub result_reference: String,
    /// Job id echoed or assigned by the service, when it sends one
    pub service_job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponseBody {
    #[serde(rename = "processedVideo")]
    processed_video: Option<String>,
    #[serde(rename = "jobId", default)]
    job_id: Option<String>,
}

/// Moves an artifact to the processing service, reporting each piece sent
#[async_trait]
pub trait UploadTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn transmit(
        &self,
        request: UploadRequest,
        ticks: mpsc::UnboundedSender<TransferTick>,
    ) -> std::result::Result<UploadReceipt, UploadError>;
}

/// Multipart POST over HTTP with a streamed, progress-reporting body
pub struct HttpUploadTransport {
    client: reqwest::Client,
    url: String,
    field: String,
    piece_bytes: usize,
}

impl HttpUploadTransport {
    pub fn new(url: &str, field: &str, piece_bytes: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClipcastError::system(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            field: field.to_string(),
            piece_bytes: piece_bytes.max(1),
        })
    }

    pub fn from_config(config: &ClipcastConfig) -> Result<Self> {
        Self::new(
            &config.upload_url(),
            &config.service.upload_field,
            config.service.upload_chunk_bytes,
            config.request_timeout(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn body_part(
        &self,
        artifact: &MediaArtifact,
        ticks: mpsc::UnboundedSender<TransferTick>,
    ) -> std::result::Result<Part, reqwest::Error> {
        let payload = artifact.payload().clone();
        let total_bytes = payload.len() as u64;
        let pieces: Vec<Bytes> = (0..payload.len())
            .step_by(self.piece_bytes)
            .map(|start| payload.slice(start..(start + self.piece_bytes).min(payload.len())))
            .collect();

        let mut bytes_sent = 0u64;
        let body = futures::stream::iter(pieces).map(move |piece| {
            bytes_sent += piece.len() as u64;
            // Receiver gone means nobody is watching progress any more
            let _ = ticks.send(TransferTick {
                bytes_sent,
                total_bytes,
            });
            Ok::<Bytes, std::io::Error>(piece)
        });

        Part::stream_with_length(reqwest::Body::wrap_stream(body), total_bytes)
            .file_name(artifact.file_name().to_string())
            .mime_str(artifact.mime_type())
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn transmit(
        &self,
        request: UploadRequest,
        ticks: mpsc::UnboundedSender<TransferTick>,
    ) -> std::result::Result<UploadReceipt, UploadError> {
        let job_id = request.job_id.to_string();
        let failed = |reason: String| UploadError::UploadFailed {
            job_id: job_id.clone(),
            reason,
        };

        let part = self
            .body_part(&request.artifact, ticks)
            .map_err(|e| failed(format!("invalid mime type: {}", e)))?;
        let form = Form::new()
            .text("jobId", job_id.clone())
            .part(self.field.clone(), part);

        info!(
            "Uploading {} ({} bytes) to {}",
            request.artifact.file_name(),
            request.artifact.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .header(JOB_HEADER, &job_id)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    failed(format!("processing service unreachable at {}", self.url))
                } else if e.is_timeout() {
                    failed("request timed out".to_string())
                } else {
                    failed(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(failed(format!("service returned {}: {}", status, error_text)));
        }

        let body: UploadResponseBody = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable response: {}", e)))?;

        let result_reference = body
            .processed_video
            .ok_or_else(|| failed("response lacks processedVideo".to_string()))?;

        debug!("Service answered job {} with {}", job_id, result_reference);
        Ok(UploadReceipt {
            result_reference,
            service_job_id: body.job_id,
        })
    }
}
