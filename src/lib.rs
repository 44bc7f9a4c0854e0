pub mod artifact;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod keyboard_input;
pub mod media;
pub mod overlay;
pub mod recording;
pub mod upload;
pub mod view;

#[cfg(feature = "mock-service")]
pub mod mock_service;

pub use artifact::MediaArtifact;
pub use channel::{
    ChannelConnection, ChannelConnector, ChannelMessage, RealtimeProgressChannel,
    ScriptedChannel, SocketIoConnector,
};
pub use config::ClipcastConfig;
pub use error::{ClipcastError, Result};
pub use events::{ClipcastEvent, ControlAction, EventBus, EventFilter, EventReceiver};
pub use export::{DirectoryExporter, FileExporter, SAVED_RECORDING_NAME};
pub use keyboard_input::KeyboardInputHandler;
pub use media::{
    CaptureSession, FacingMode, MediaCaptureProvider, MediaSessionManager,
    ScriptedCaptureProvider, SyntheticCaptureProvider,
};
pub use overlay::{
    DetectionEvent, GeoPoint, MapOverlay, MapOverlaySink, MarkerLayer, TracingOverlaySink,
};
pub use recording::{FinishedRecording, RecordingAction, RecordingController, RecordingPhase};
pub use upload::{
    CompletedUpload, HttpUploadTransport, JobBoard, JobId, JobProgress, JobStatus,
    ProcessedVideoRecord, ProcessingHistory, ProgressSubscription, ScriptedTransport,
    UploadJob, UploadPipeline, UploadTransport,
};
pub use view::{CaptureView, CaptureViewBuilder, ViewState};

#[cfg(feature = "mock-service")]
pub use mock_service::{MockProcessingService, MockServiceConfig};
