use super::progress::TransferTick;
use super::transport::{UploadReceipt, UploadRequest, UploadTransport};
use crate::error::UploadError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
enum ScriptedOutcome {
    Succeed(String),
    Fail(String),
}

/// Transport that replays a fixed tick plan instead of touching the network
#[derive(Clone)]
pub struct ScriptedTransport {
    ticks: Vec<u64>,
    outcome: ScriptedOutcome,
    tick_delay: Duration,
    requests: Arc<Mutex<Vec<UploadRequest>>>,
}

impl ScriptedTransport {
    /// Report one tick per entry of `ticks` (bytes sent so far), then succeed
    pub fn succeeding(ticks: Vec<u64>, result_reference: &str) -> Self {
        Self {
            ticks,
            outcome: ScriptedOutcome::Succeed(result_reference.to_string()),
            tick_delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report the ticks, then fail with `reason`
    pub fn failing(ticks: Vec<u64>, reason: &str) -> Self {
        Self {
            ticks,
            outcome: ScriptedOutcome::Fail(reason.to_string()),
            tick_delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep between ticks
    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = delay;
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl UploadTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn transmit(
        &self,
        request: UploadRequest,
        ticks: mpsc::UnboundedSender<TransferTick>,
    ) -> Result<UploadReceipt, UploadError> {
        let total_bytes = request.artifact.len() as u64;
        let job_id = request.job_id.to_string();
        self.requests.lock().push(request);

        for &bytes_sent in &self.ticks {
            if !self.tick_delay.is_zero() {
                tokio::time::sleep(self.tick_delay).await;
            }
            let _ = ticks.send(TransferTick {
                bytes_sent,
                total_bytes,
            });
        }

        match &self.outcome {
            ScriptedOutcome::Succeed(reference) => Ok(UploadReceipt {
                result_reference: reference.clone(),
                service_job_id: Some(job_id),
            }),
            ScriptedOutcome::Fail(reason) => Err(UploadError::UploadFailed {
                job_id,
                reason: reason.clone(),
            }),
        }
    }
}
