use super::job::JobId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// One completed upload, as listed in the processed-videos history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedVideoRecord {
    pub job_id: JobId,
    pub result_reference: String,
    pub display_name: String,
    pub completed_at: DateTime<Utc>,
}

/// Append-only list of processed videos for the lifetime of a view
#[derive(Clone, Default)]
pub struct ProcessingHistory {
    records: Arc<RwLock<Vec<ProcessedVideoRecord>>>,
}

impl ProcessingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed upload under the name of the file that was sent
    pub fn append(
        &self,
        job_id: JobId,
        result_reference: &str,
        display_name: &str,
    ) -> ProcessedVideoRecord {
        let record = ProcessedVideoRecord {
            job_id,
            result_reference: result_reference.to_string(),
            display_name: display_name.to_string(),
            completed_at: Utc::now(),
        };
        self.records.write().push(record.clone());
        record
    }

    /// Records in completion order
    pub fn records(&self) -> Vec<ProcessedVideoRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
