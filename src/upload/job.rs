use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Identity threaded through upload ticks and channel messages of one job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Transfer in progress
    Uploading,
    /// Transfer finished; processing may still be running
    Uploaded,
    /// Transfer failed; progress is frozen
    Failed,
}

/// One logical upload-and-process request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadJob {
    pub id: JobId,
    pub file_name: String,
    pub total_bytes: u64,
    /// Transfer completion in [0,100]
    pub upload_progress: u8,
    /// Server-side processing completion in [0,100], unset until first update
    pub processing_progress: Option<f64>,
    /// Processed output returned by the service
    pub result_reference: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of a job's two progress signals
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub upload: u8,
    pub processing: Option<f64>,
    pub status: JobStatus,
}

impl JobProgress {
    /// No further change is expected: the transfer failed, or processing
    /// reached 100 after the transfer finished
    pub fn is_final(&self) -> bool {
        match self.status {
            JobStatus::Failed => true,
            JobStatus::Uploaded => self.processing.map(|p| p >= 100.0).unwrap_or(false),
            JobStatus::Uploading => false,
        }
    }
}

impl UploadJob {
    fn progress(&self) -> JobProgress {
        JobProgress {
            job_id: self.id.clone(),
            upload: self.upload_progress,
            processing: self.processing_progress,
            status: self.status,
        }
    }
}

struct JobEntry {
    job: UploadJob,
    watcher: watch::Sender<JobProgress>,
}

impl JobEntry {
    fn notify(&self) {
        self.watcher.send_replace(self.job.progress());
    }
}

#[derive(Default)]
struct BoardState {
    jobs: HashMap<JobId, JobEntry>,
    active: Option<JobId>,
}

/// Jobs of one view, shared by the upload pipeline and the real-time channel.
///
/// Both progress fields only ever move forward.
#[derive(Clone, Default)]
pub struct JobBoard {
    state: Arc<RwLock<BoardState>>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job for a new submit and make it the active one
    pub fn register(&self, file_name: &str, total_bytes: u64) -> UploadJob {
        let job = UploadJob {
            id: JobId::generate(),
            file_name: file_name.to_string(),
            total_bytes,
            upload_progress: 0,
            processing_progress: None,
            result_reference: None,
            status: JobStatus::Uploading,
            created_at: Utc::now(),
        };

        let (watcher, _) = watch::channel(job.progress());
        let mut state = self.state.write();
        state.jobs.insert(
            job.id.clone(),
            JobEntry {
                job: job.clone(),
                watcher,
            },
        );
        state.active = Some(job.id.clone());

        debug!("Registered job {} for {}", job.id, file_name);
        job
    }

    /// Record a transfer tick. Returns the stored value, or `None` when the
    /// job is unknown or no longer uploading.
    pub fn record_upload_progress(&self, id: &JobId, percent: u8) -> Option<u8> {
        let mut state = self.state.write();
        let entry = state.jobs.get_mut(id)?;
        if entry.job.status != JobStatus::Uploading {
            return None;
        }

        let next = percent.min(100).max(entry.job.upload_progress);
        if next != entry.job.upload_progress {
            entry.job.upload_progress = next;
            entry.notify();
        }
        Some(next)
    }

    /// Record a processing update for the named job, or the active job when
    /// the update carries no id. Values are clamped to [0,100].
    pub fn record_processing_progress(
        &self,
        job_id: Option<&str>,
        percent: f64,
    ) -> Option<(JobId, f64)> {
        if !percent.is_finite() {
            warn!("Ignoring non-finite processing progress {}", percent);
            return None;
        }

        let mut state = self.state.write();
        let id = match job_id {
            Some(id) => JobId::from(id),
            None => state.active.clone()?,
        };
        let Some(entry) = state.jobs.get_mut(&id) else {
            debug!("Processing update for unknown job {}", id);
            return None;
        };

        let clamped = percent.clamp(0.0, 100.0);
        let next = match entry.job.processing_progress {
            Some(current) if current >= clamped => current,
            _ => clamped,
        };
        if entry.job.processing_progress != Some(next) {
            entry.job.processing_progress = Some(next);
            entry.notify();
        }
        Some((id, next))
    }

    /// Transfer finished with a processed-output reference
    pub fn mark_uploaded(&self, id: &JobId, result_reference: &str) -> Option<UploadJob> {
        let mut state = self.state.write();
        let entry = state.jobs.get_mut(id)?;
        entry.job.status = JobStatus::Uploaded;
        entry.job.upload_progress = 100;
        entry.job.result_reference = Some(result_reference.to_string());
        entry.notify();
        Some(entry.job.clone())
    }

    /// Transfer failed; upload progress keeps its last value
    pub fn mark_failed(&self, id: &JobId) -> Option<UploadJob> {
        let mut state = self.state.write();
        let entry = state.jobs.get_mut(id)?;
        entry.job.status = JobStatus::Failed;
        entry.notify();
        Some(entry.job.clone())
    }

    pub fn get(&self, id: &JobId) -> Option<UploadJob> {
        self.state.read().jobs.get(id).map(|entry| entry.job.clone())
    }

    /// The most recently submitted job
    pub fn active(&self) -> Option<UploadJob> {
        let state = self.state.read();
        let id = state.active.as_ref()?;
        state.jobs.get(id).map(|entry| entry.job.clone())
    }

    pub fn len(&self) -> usize {
        self.state.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().jobs.is_empty()
    }

    /// Watch a job's progress snapshots
    pub fn watch(&self, id: &JobId) -> Option<watch::Receiver<JobProgress>> {
        self.state
            .read()
            .jobs
            .get(id)
            .map(|entry| entry.watcher.subscribe())
    }
}
