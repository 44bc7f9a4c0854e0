use crate::error::EventBusError;
use crate::media::FacingMode;
use crate::recording::{RecordingAction, RecordingPhase};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur while a capture view is alive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClipcastEvent {
    /// A camera+microphone stream was acquired
    CaptureAcquired {
        stream_id: String,
        facing: FacingMode,
        timestamp: SystemTime,
    },
    /// The active stream's tracks were stopped
    CaptureReleased {
        stream_id: String,
        timestamp: SystemTime,
    },
    /// The recording state machine changed phase
    RecordingPhaseChanged {
        from: RecordingPhase,
        to: RecordingPhase,
    },
    /// Elapsed recording time, emitted once per tick while recording
    RecordingTick { elapsed_seconds: u64 },
    /// A recording was finalized into an artifact
    RecordingFinished {
        file_name: String,
        size_bytes: u64,
        chunk_count: usize,
        elapsed_seconds: u64,
    },
    /// An artifact became the upload candidate
    ArtifactSelected { file_name: String, size_bytes: u64 },
    /// A new upload job was created
    JobCreated { job_id: String, file_name: String },
    /// Upload transfer progress for a job
    UploadProgress { job_id: String, percent: u8 },
    /// Upload finished and the service returned a processed-output reference
    UploadCompleted {
        job_id: String,
        result_reference: String,
    },
    /// Upload failed; job progress is frozen
    UploadFailed { job_id: String, reason: String },
    /// Server-side processing progress for a job
    ProcessingProgress { job_id: String, percent: f64 },
    /// A batch of detections was forwarded to the map overlay
    DetectionsReceived {
        job_id: Option<String>,
        count: usize,
    },
    /// Real-time channel connection status changed
    ChannelStatusChanged { connected: bool },
    /// A control surface (keyboard) asked for a recording action
    ControlRequested { action: ControlAction },
    /// Shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

/// Actions a control surface can request from the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    Recording(RecordingAction),
    TogglePause,
    SwitchCamera,
    Upload,
    Save,
}

impl ClipcastEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ClipcastEvent::CaptureAcquired {
                stream_id, facing, ..
            } => format!("Capture {} acquired ({} camera)", stream_id, facing),
            ClipcastEvent::CaptureReleased { stream_id, .. } => {
                format!("Capture {} released", stream_id)
            }
            ClipcastEvent::RecordingPhaseChanged { from, to } => {
                format!("Recording {} -> {}", from, to)
            }
            ClipcastEvent::RecordingTick { elapsed_seconds } => {
                format!("Recording time: {}s", elapsed_seconds)
            }
            ClipcastEvent::RecordingFinished {
                file_name,
                size_bytes,
                chunk_count,
                elapsed_seconds,
            } => format!(
                "Recording finished: {} ({} bytes, {} chunks, {}s)",
                file_name, size_bytes, chunk_count, elapsed_seconds
            ),
            ClipcastEvent::ArtifactSelected {
                file_name,
                size_bytes,
            } => format!("Selected {} ({} bytes)", file_name, size_bytes),
            ClipcastEvent::JobCreated { job_id, file_name } => {
                format!("Job {} created for {}", job_id, file_name)
            }
            ClipcastEvent::UploadProgress { job_id, percent } => {
                format!("Job {}: {}% uploaded", job_id, percent)
            }
            ClipcastEvent::UploadCompleted {
                job_id,
                result_reference,
            } => format!("Job {} uploaded: {}", job_id, result_reference),
            ClipcastEvent::UploadFailed { job_id, reason } => {
                format!("Job {} upload failed: {}", job_id, reason)
            }
            ClipcastEvent::ProcessingProgress { job_id, percent } => {
                format!("Job {}: {}% processed", job_id, percent)
            }
            ClipcastEvent::DetectionsReceived { job_id, count } => match job_id {
                Some(job_id) => format!("{} detections for job {}", count, job_id),
                None => format!("{} detections", count),
            },
            ClipcastEvent::ChannelStatusChanged { connected } => format!(
                "Real-time channel {}",
                if *connected {
                    "connected"
                } else {
                    "disconnected"
                }
            ),
            ClipcastEvent::ControlRequested { action } => {
                format!("Control requested: {:?}", action)
            }
            ClipcastEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ClipcastEvent::CaptureAcquired { .. } => "capture_acquired",
            ClipcastEvent::CaptureReleased { .. } => "capture_released",
            ClipcastEvent::RecordingPhaseChanged { .. } => "recording_phase_changed",
            ClipcastEvent::RecordingTick { .. } => "recording_tick",
            ClipcastEvent::RecordingFinished { .. } => "recording_finished",
            ClipcastEvent::ArtifactSelected { .. } => "artifact_selected",
            ClipcastEvent::JobCreated { .. } => "job_created",
            ClipcastEvent::UploadProgress { .. } => "upload_progress",
            ClipcastEvent::UploadCompleted { .. } => "upload_completed",
            ClipcastEvent::UploadFailed { .. } => "upload_failed",
            ClipcastEvent::ProcessingProgress { .. } => "processing_progress",
            ClipcastEvent::DetectionsReceived { .. } => "detections_received",
            ClipcastEvent::ChannelStatusChanged { .. } => "channel_status_changed",
            ClipcastEvent::ControlRequested { .. } => "control_requested",
            ClipcastEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Job identity carried by the event, if any
    pub fn job_id(&self) -> Option<&str> {
        match self {
            ClipcastEvent::JobCreated { job_id, .. }
            | ClipcastEvent::UploadProgress { job_id, .. }
            | ClipcastEvent::UploadCompleted { job_id, .. }
            | ClipcastEvent::UploadFailed { job_id, .. }
            | ClipcastEvent::ProcessingProgress { job_id, .. } => Some(job_id),
            ClipcastEvent::DetectionsReceived { job_id, .. } => job_id.as_deref(),
            _ => None,
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<ClipcastEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ClipcastEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers.
    ///
    /// Having no subscribers is not an error: views run headless in tests and
    /// from the CLI, so the event is simply dropped and 0 is returned.
    pub fn publish(&self, event: ClipcastEvent) -> usize {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            ClipcastEvent::UploadFailed { job_id, reason } => {
                error!("Upload of job {} failed: {}", job_id, reason);
            }
            ClipcastEvent::UploadCompleted {
                job_id,
                result_reference,
            } => {
                info!("Job {} processed output at {}", job_id, result_reference);
            }
            ClipcastEvent::ChannelStatusChanged { connected } => {
                if *connected {
                    info!("Real-time channel connected");
                } else {
                    warn!("Real-time channel disconnected");
                }
            }
            ClipcastEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept only events tagged with the given job
    Job(String),
    /// Custom filter function
    Custom(fn(&ClipcastEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &ClipcastEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Job(job_id) => event.job_id() == Some(job_id.as_str()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<ClipcastEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<ClipcastEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<ClipcastEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ClipcastEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain every event currently queued that passes the filter
    pub fn drain(&mut self) -> Vec<ClipcastEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let delivered = event_bus.publish(ClipcastEvent::UploadProgress {
            job_id: "job-1".to_string(),
            percent: 25,
        });
        assert_eq!(delivered, 1);

        match receiver.recv().await.unwrap() {
            ClipcastEvent::UploadProgress { job_id, percent } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(percent, 25);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());
        assert_eq!(
            event_bus.publish(ClipcastEvent::RecordingTick { elapsed_seconds: 1 }),
            0
        );
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(ClipcastEvent::ChannelStatusChanged { connected: true });

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_job_filter() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_filtered(EventFilter::Job("b".to_string()), "job-b");

        event_bus.publish(ClipcastEvent::ProcessingProgress {
            job_id: "a".to_string(),
            percent: 10.0,
        });
        event_bus.publish(ClipcastEvent::ProcessingProgress {
            job_id: "b".to_string(),
            percent: 20.0,
        });
        event_bus.publish(ClipcastEvent::ChannelStatusChanged { connected: false });

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].job_id(), Some("b"));
    }

    #[test]
    fn test_event_type_filter() {
        let filter = EventFilter::EventTypes(vec!["upload_progress"]);
        assert!(filter.matches(&ClipcastEvent::UploadProgress {
            job_id: "x".to_string(),
            percent: 1,
        }));
        assert!(!filter.matches(&ClipcastEvent::RecordingTick { elapsed_seconds: 3 }));
    }
}
