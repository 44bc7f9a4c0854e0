use super::provider::{
    CaptureStream, FacingMode, MediaCaptureProvider, MediaChunk, PreviewSink, StreamRequest,
};
use crate::error::MediaError;
use crate::events::{ClipcastEvent, EventBus};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Longest wait for a backend to flush after its tracks stop
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// The single active camera+microphone session
#[derive(Debug)]
pub struct CaptureSession {
    stream: CaptureStream,
    facing: FacingMode,
    active: bool,
    acquired_at: SystemTime,
    delivered: u64,
}

impl CaptureSession {
    fn new(stream: CaptureStream) -> Self {
        Self {
            facing: stream.facing(),
            stream,
            active: true,
            acquired_at: SystemTime::now(),
            delivered: 0,
        }
    }

    pub fn stream_id(&self) -> &str {
        self.stream.id()
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn is_active(&self) -> bool {
        self.active && self.stream.is_live()
    }

    pub fn acquired_at(&self) -> SystemTime {
        self.acquired_at
    }

    /// Chunks handed out of this session so far
    pub fn delivered_chunks(&self) -> u64 {
        self.delivered
    }
}

/// Owns the capture session exclusively; nothing else touches its tracks
pub struct MediaSessionManager {
    provider: Arc<dyn MediaCaptureProvider>,
    preview: Arc<dyn PreviewSink>,
    event_bus: Arc<EventBus>,
    facing: FacingMode,
    session: Option<CaptureSession>,
}

impl MediaSessionManager {
    pub fn new(
        provider: Arc<dyn MediaCaptureProvider>,
        preview: Arc<dyn PreviewSink>,
        event_bus: Arc<EventBus>,
        facing: FacingMode,
    ) -> Self {
        Self {
            provider,
            preview,
            event_bus,
            facing,
            session: None,
        }
    }

    /// Acquire a stream for `facing`, releasing any existing session first
    pub async fn acquire(&mut self, facing: FacingMode) -> Result<&CaptureSession, MediaError> {
        if self.session.is_some() {
            debug!("Releasing existing capture session before re-acquiring");
            self.release();
        }

        info!(
            "Requesting {} camera + microphone from {} backend",
            facing,
            self.provider.name()
        );

        let stream = match self
            .provider
            .acquire(StreamRequest::camera_and_microphone(facing))
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Capture acquisition failed: {}", e);
                return Err(e);
            }
        };

        self.facing = facing;
        self.preview.attach(stream.id(), facing);
        self.event_bus.publish(ClipcastEvent::CaptureAcquired {
            stream_id: stream.id().to_string(),
            facing,
            timestamp: SystemTime::now(),
        });
        info!("Capture session {} active ({} camera)", stream.id(), facing);

        Ok(self.session.insert(CaptureSession::new(stream)))
    }

    /// Stop all tracks of the active stream. Safe to call with no session.
    pub fn release(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };

        self.provider.release(&session.stream);
        self.retire(session);
        true
    }

    /// Stop the tracks and collect everything the backend still delivers
    /// until it closes the stream. Used when the data matters, at the end of
    /// a recording.
    pub async fn finish(&mut self) -> Vec<MediaChunk> {
        let Some(mut session) = self.session.take() else {
            return Vec::new();
        };

        self.provider.release(&session.stream);

        let mut chunks = Vec::new();
        let flushed = tokio::time::timeout(FLUSH_TIMEOUT, async {
            while let Some(chunk) = session.stream.drain_next().await {
                self.preview.present(&chunk);
                chunks.push(chunk);
            }
        })
        .await;
        if flushed.is_err() {
            warn!(
                "Capture session {} did not close within {:?}; keeping {} flushed chunks",
                session.stream_id(),
                FLUSH_TIMEOUT,
                chunks.len()
            );
        } else {
            debug!(
                "Capture session {} flushed {} chunks",
                session.stream_id(),
                chunks.len()
            );
        }

        self.retire(session);
        chunks
    }

    fn retire(&mut self, mut session: CaptureSession) {
        session.active = false;
        self.preview.detach();
        self.event_bus.publish(ClipcastEvent::CaptureReleased {
            stream_id: session.stream_id().to_string(),
            timestamp: SystemTime::now(),
        });
        info!("Capture session {} released", session.stream_id());
    }

    /// Toggle the facing mode; an existing session is re-acquired with it
    pub async fn switch_facing(&mut self) -> Result<FacingMode, MediaError> {
        let next = self.facing.toggled();

        if self.session.is_some() {
            self.acquire(next).await?;
        } else {
            self.facing = next;
        }

        info!("Camera facing switched to {}", next);
        Ok(next)
    }

    /// Drain chunks produced so far, feeding each to the preview
    pub fn poll_chunks(&mut self) -> Vec<MediaChunk> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let mut chunks = Vec::new();
        while let Some(chunk) = session.stream.try_next_chunk() {
            self.preview.present(&chunk);
            chunks.push(chunk);
        }
        session.delivered += chunks.len() as u64;
        chunks
    }

    /// Wait for the next chunk of the active stream
    pub async fn next_chunk(&mut self) -> Option<MediaChunk> {
        let session = self.session.as_mut()?;
        let chunk = session.stream.next_chunk().await?;
        session.delivered += 1;
        self.preview.present(&chunk);
        Some(chunk)
    }

    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .map(CaptureSession::is_active)
            .unwrap_or(false)
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    /// Facing mode used for the next acquisition
    pub fn facing(&self) -> FacingMode {
        self.facing
    }
}

impl Drop for MediaSessionManager {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.provider.release(&session.stream);
            self.preview.detach();
        }
    }
}
