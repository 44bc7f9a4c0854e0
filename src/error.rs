use thiserror::Error;

use crate::media::FacingMode;
use crate::recording::{RecordingAction, RecordingPhase};

#[derive(Error, Debug)]
pub enum ClipcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Mock service error: {0}")]
    Service(#[from] ServiceError),

    #[error("System error: {message}")]
    System { message: String },
}

impl ClipcastError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Short text suitable for showing to the person operating the view
    pub fn user_message(&self) -> String {
        match self {
            ClipcastError::Media(MediaError::DeviceUnavailable { .. }) => {
                "Camera or microphone is unavailable. Check device permissions.".to_string()
            }
            ClipcastError::Recording(RecordingError::NotReady { .. }) => {
                "Recording cannot start: no capture device is available.".to_string()
            }
            ClipcastError::Recording(RecordingError::InvalidTransition { action, phase }) => {
                format!("Cannot {} while {}.", action, phase)
            }
            ClipcastError::Upload(UploadError::NoArtifact) => {
                "Please select or record a video to upload.".to_string()
            }
            ClipcastError::Upload(UploadError::UploadFailed { .. }) => {
                "Upload failed. Try uploading again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether repeating the same user action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClipcastError::Upload(UploadError::UploadFailed { .. })
                | ClipcastError::Media(MediaError::DeviceUnavailable { .. })
                | ClipcastError::Channel(ChannelError::ConnectFailed { .. })
        )
    }
}

/// Capture device errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("{facing} camera/microphone unavailable: {reason}")]
    DeviceUnavailable { facing: FacingMode, reason: String },

    #[error("capture backend failure: {details}")]
    Backend { details: String },
}

/// Recording state machine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordingError {
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        phase: RecordingPhase,
        action: RecordingAction,
    },

    #[error("no capture device ready: {reason}")]
    NotReady { reason: String },
}

/// Upload pipeline errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("no artifact selected for upload")]
    NoArtifact,

    #[error("upload of job {job_id} failed: {reason}")]
    UploadFailed { job_id: String, reason: String },
}

/// Real-time channel errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("failed to connect to {url}: {details}")]
    ConnectFailed { url: String, details: String },

    #[error("malformed frame: {details}")]
    Codec { details: String },

    #[error("channel transport error: {details}")]
    Transport { details: String },

    #[error("server refused namespace connect: {details}")]
    Refused { details: String },

    #[error("channel closed")]
    Closed,
}

/// File export and selection errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a video file")]
    NotVideo { path: String },
}

/// Local processing service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("service stopped: {details}")]
    Stopped { details: String },
}

/// Event bus errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("event bus closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, ClipcastError>;
