//! Upload pipeline
//!
//! Sends a finalized artifact to the processing service as a job, tracks the
//! transfer progress of that job and keeps the history of processed videos.
//! The [`JobBoard`] is shared with the real-time channel, which fills in the
//! processing side of the same jobs.

mod history;
mod job;
mod mock;
mod pipeline;
mod progress;
mod transport;

pub use history::{ProcessedVideoRecord, ProcessingHistory};
pub use job::{JobBoard, JobId, JobProgress, JobStatus, UploadJob};
pub use mock::ScriptedTransport;
pub use pipeline::{CompletedUpload, UploadPipeline};
pub use progress::{progress_percent, ProgressSubscription, TransferTick};
pub use transport::{HttpUploadTransport, UploadReceipt, UploadRequest, UploadTransport, JOB_HEADER};
