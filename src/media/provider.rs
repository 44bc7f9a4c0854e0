use crate::error::MediaError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Which physical camera is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// User-facing camera
    Front,
    /// Environment-facing camera
    Back,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Front => FacingMode::Back,
            FacingMode::Back => FacingMode::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Front => "front",
            FacingMode::Back => "back",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(FacingMode::Front),
            "back" | "environment" => Ok(FacingMode::Back),
            other => Err(format!("unknown facing mode '{}'", other)),
        }
    }
}

/// What to ask the capture backend for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    pub video: bool,
    pub audio: bool,
}

impl StreamRequest {
    /// Camera plus microphone for the given facing mode
    pub fn camera_and_microphone(facing: FacingMode) -> Self {
        Self {
            facing,
            video: true,
            audio: true,
        }
    }
}

/// An incrementally produced fragment of captured media data
#[derive(Debug, Clone)]
pub struct MediaChunk {
    /// Position of the chunk within its stream
    pub sequence: u64,
    pub data: Bytes,
    pub captured_at: SystemTime,
}

impl MediaChunk {
    pub fn new(sequence: u64, data: Bytes) -> Self {
        Self {
            sequence,
            data,
            captured_at: SystemTime::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Producer side for backends that deliver from a thread that must not wait,
/// such as a pipeline streaming callback. A full queue drops the chunk and
/// counts it instead of stalling the producer.
#[derive(Debug)]
pub struct ChunkFeed {
    chunks: mpsc::Sender<MediaChunk>,
    sequence: AtomicU64,
    dropped: AtomicU64,
}

impl ChunkFeed {
    pub fn new(chunks: mpsc::Sender<MediaChunk>) -> Self {
        Self {
            chunks,
            sequence: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Hand `data` to the consumer without waiting. Returns false once the
    /// consumer has gone away.
    pub fn offer(&self, data: Bytes) -> bool {
        let chunk = MediaChunk::new(self.sequence.fetch_add(1, Ordering::Relaxed), data);
        match self.chunks.try_send(chunk) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Capture consumer is behind; {} chunks dropped", total);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Chunks discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle to a live camera+microphone stream.
///
/// Chunks arrive in the order the backend produced them. Stopping the tracks
/// asks the backend to flush: it hands over the data it still holds, then
/// closes the stream.
pub struct CaptureStream {
    id: String,
    facing: FacingMode,
    chunks: mpsc::Receiver<MediaChunk>,
    tracks: CancellationToken,
}

impl CaptureStream {
    pub fn new(
        facing: FacingMode,
        chunks: mpsc::Receiver<MediaChunk>,
        tracks: CancellationToken,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            facing,
            chunks,
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    /// Take the next already-produced chunk without waiting
    pub fn try_next_chunk(&mut self) -> Option<MediaChunk> {
        self.chunks.try_recv().ok()
    }

    /// Wait for the next chunk; `None` once the stream has ended
    pub async fn next_chunk(&mut self) -> Option<MediaChunk> {
        if !self.is_live() {
            return self.try_next_chunk();
        }
        self.chunks.recv().await
    }

    /// Wait for the next chunk whether or not the tracks still run; `None`
    /// once the producer has closed the stream
    pub async fn drain_next(&mut self) -> Option<MediaChunk> {
        self.chunks.recv().await
    }

    /// Stop every track of the stream. Idempotent.
    pub fn stop_tracks(&self) {
        self.tracks.cancel();
    }

    pub fn is_live(&self) -> bool {
        !self.tracks.is_cancelled()
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.tracks.cancel();
    }
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("id", &self.id)
            .field("facing", &self.facing)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Platform capability that grants camera+microphone streams
#[async_trait]
pub trait MediaCaptureProvider: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Request a stream. On failure nothing may be left running.
    async fn acquire(&self, request: StreamRequest) -> Result<CaptureStream, MediaError>;

    /// Stop all tracks of a stream previously returned by `acquire`.
    ///
    /// The producer must then deliver any buffered data and drop its sender
    /// so the stream ends.
    fn release(&self, stream: &CaptureStream) {
        stream.stop_tracks();
    }
}

/// Live preview surface fed with raw frames of the active stream
pub trait PreviewSink: Send + Sync {
    fn attach(&self, stream_id: &str, facing: FacingMode);
    fn present(&self, chunk: &MediaChunk);
    fn detach(&self);
}

/// Preview sink that shows nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn attach(&self, _stream_id: &str, _facing: FacingMode) {}
    fn present(&self, _chunk: &MediaChunk) {}
    fn detach(&self) {}
}
