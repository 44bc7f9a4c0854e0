use super::job::{JobId, JobProgress};
use futures::Stream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTick {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl TransferTick {
    pub fn percent(&self) -> u8 {
        progress_percent(self.bytes_sent, self.total_bytes)
    }
}

/// `round(sent * 100 / total)` clamped to [0,100]. An empty transfer is complete.
pub fn progress_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (sent as f64 * 100.0 / total as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Cancellable view of one job's progress.
///
/// Nothing is computed until polled. Dropping or cancelling a subscription
/// leaves the job untouched, and [`resubscribe`](Self::resubscribe) starts a
/// fresh sequence from the current snapshot.
pub struct ProgressSubscription {
    job_id: JobId,
    receiver: watch::Receiver<JobProgress>,
    cancel: CancellationToken,
    started: bool,
}

impl ProgressSubscription {
    pub(crate) fn new(job_id: JobId, receiver: watch::Receiver<JobProgress>) -> Self {
        Self {
            job_id,
            receiver,
            cancel: CancellationToken::new(),
            started: false,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Latest snapshot without waiting
    pub fn current(&self) -> JobProgress {
        self.receiver.borrow().clone()
    }

    /// Next snapshot in the sequence. The first call yields the current
    /// snapshot; later calls wait for a change. `None` after cancellation.
    pub async fn next(&mut self) -> Option<JobProgress> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if !self.started {
            self.started = true;
            return Some(self.receiver.borrow_and_update().clone());
        }

        tokio::select! {
            _ = self.cancel.cancelled() => None,
            changed = self.receiver.changed() => match changed {
                Ok(()) => Some(self.receiver.borrow_and_update().clone()),
                Err(_) => None,
            },
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Handle that cancels this subscription from elsewhere
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A new, independent sequence starting from the current snapshot
    pub fn resubscribe(&self) -> Self {
        Self::new(self.job_id.clone(), self.receiver.clone())
    }

    /// Snapshots until the job settles or the subscription is cancelled
    pub fn into_stream(mut self) -> impl Stream<Item = JobProgress> {
        async_stream::stream! {
            while let Some(progress) = self.next().await {
                let settled = progress.is_final();
                yield progress;
                if settled {
                    break;
                }
            }
        }
    }
}
