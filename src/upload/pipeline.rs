use super::history::{ProcessedVideoRecord, ProcessingHistory};
use super::job::{JobBoard, JobId, UploadJob};
use super::progress::{ProgressSubscription, TransferTick};
use super::transport::{UploadRequest, UploadTransport};
use crate::artifact::MediaArtifact;
use crate::error::{Result, UploadError};
use crate::events::{ClipcastEvent, EventBus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Outcome of a successful submit
#[derive(Debug, Clone)]
pub struct CompletedUpload {
    pub job: UploadJob,
    pub record: ProcessedVideoRecord,
}

/// Sends artifacts to the processing service and tracks each as a job
pub struct UploadPipeline {
    transport: Arc<dyn UploadTransport>,
    board: JobBoard,
    history: ProcessingHistory,
    event_bus: Arc<EventBus>,
}

impl UploadPipeline {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        board: JobBoard,
        history: ProcessingHistory,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            transport,
            board,
            history,
            event_bus,
        }
    }

    /// Upload an artifact as a new job.
    ///
    /// Every transfer tick is published as `UploadProgress`. On failure the
    /// job keeps its last progress value and history is untouched; a retry is
    /// a new submit.
    pub async fn submit(&self, artifact: Option<MediaArtifact>) -> Result<CompletedUpload> {
        self.submit_reporting(artifact, |_| {}).await
    }

    /// Like [`submit`](Self::submit), also handing every tick's percent to
    /// `on_progress` in order. Unlike bus subscribers, the callback never lags.
    pub async fn submit_reporting<F>(
        &self,
        artifact: Option<MediaArtifact>,
        mut on_progress: F,
    ) -> Result<CompletedUpload>
    where
        F: FnMut(u8) + Send,
    {
        let artifact = artifact.ok_or(UploadError::NoArtifact)?;

        let job = self
            .board
            .register(artifact.file_name(), artifact.len() as u64);
        self.event_bus.publish(ClipcastEvent::JobCreated {
            job_id: job.id.to_string(),
            file_name: job.file_name.clone(),
        });
        info!(
            "Job {} submitted via {} transport: {} ({} bytes)",
            job.id,
            self.transport.name(),
            job.file_name,
            job.total_bytes
        );

        let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
        let request = UploadRequest {
            job_id: job.id.clone(),
            artifact: artifact.clone(),
        };

        let transfer = self.transport.transmit(request, tick_tx);
        tokio::pin!(transfer);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(tick) = tick_rx.recv() => {
                    if let Some(percent) = self.apply_tick(&job.id, tick) {
                        on_progress(percent);
                    }
                }
                outcome = &mut transfer => break outcome,
            }
        };

        // Ticks queued just before completion still count
        while let Ok(tick) = tick_rx.try_recv() {
            if let Some(percent) = self.apply_tick(&job.id, tick) {
                on_progress(percent);
            }
        }

        match outcome {
            Ok(receipt) => {
                if let Some(service_id) = &receipt.service_job_id {
                    if service_id != job.id.as_str() {
                        debug!("Service tracks job {} as {}", job.id, service_id);
                    }
                }

                let job = self
                    .board
                    .mark_uploaded(&job.id, &receipt.result_reference)
                    .unwrap_or(job);
                let record = self.history.append(
                    job.id.clone(),
                    &receipt.result_reference,
                    artifact.file_name(),
                );
                self.event_bus.publish(ClipcastEvent::UploadCompleted {
                    job_id: job.id.to_string(),
                    result_reference: receipt.result_reference,
                });

                Ok(CompletedUpload { job, record })
            }
            Err(e) => {
                let reason = match &e {
                    UploadError::UploadFailed { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                self.board.mark_failed(&job.id);
                error!("Job {} failed: {}", job.id, reason);
                self.event_bus.publish(ClipcastEvent::UploadFailed {
                    job_id: job.id.to_string(),
                    reason: reason.clone(),
                });

                Err(UploadError::UploadFailed {
                    job_id: job.id.to_string(),
                    reason,
                }
                .into())
            }
        }
    }

    fn apply_tick(&self, job_id: &JobId, tick: TransferTick) -> Option<u8> {
        let stored = self.board.record_upload_progress(job_id, tick.percent())?;
        debug!(
            "Job {} sent {}/{} bytes ({}%)",
            job_id, tick.bytes_sent, tick.total_bytes, stored
        );
        self.event_bus.publish(ClipcastEvent::UploadProgress {
            job_id: job_id.to_string(),
            percent: stored,
        });
        Some(stored)
    }

    /// Subscribe to a job's combined upload and processing progress
    pub fn subscribe(&self, job_id: &JobId) -> Option<ProgressSubscription> {
        self.board
            .watch(job_id)
            .map(|receiver| ProgressSubscription::new(job_id.clone(), receiver))
    }

    pub fn board(&self) -> &JobBoard {
        &self.board
    }

    pub fn history(&self) -> &ProcessingHistory {
        &self.history
    }
}
