use super::provider::{CaptureStream, FacingMode, MediaCaptureProvider, MediaChunk, StreamRequest};
use crate::error::MediaError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capture provider driven by the caller, for testing without hardware
#[derive(Clone, Default)]
pub struct ScriptedCaptureProvider {
    state: Arc<Mutex<ScriptState>>,
}

#[derive(Default)]
struct ScriptState {
    deny_reason: Option<String>,
    acquisitions: usize,
    streams: Vec<ScriptedStreamHandle>,
}

/// Producer side of a stream handed out by [`ScriptedCaptureProvider`]
#[derive(Clone)]
pub struct ScriptedStreamHandle {
    stream_id: String,
    facing: FacingMode,
    sender: Arc<Mutex<Option<mpsc::Sender<MediaChunk>>>>,
    tail: Arc<Mutex<Vec<Bytes>>>,
    tracks: CancellationToken,
    sequence: Arc<AtomicU64>,
}

impl ScriptedStreamHandle {
    /// Emit a chunk as if the device had produced it. Returns false once the
    /// tracks have been stopped.
    pub fn push(&self, data: impl Into<Bytes>) -> bool {
        if self.tracks.is_cancelled() {
            return false;
        }
        self.send(data.into())
    }

    /// Data the device still holds when its tracks stop, delivered during
    /// the flush before the stream closes
    pub fn hold_until_stop(&self, data: impl Into<Bytes>) {
        self.tail.lock().push(data.into());
    }

    fn send(&self, data: Bytes) -> bool {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return false;
        };
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        sender.try_send(MediaChunk::new(sequence, data)).is_ok()
    }

    /// Deliver held data, then close the stream
    fn flush(&self) {
        let tail = std::mem::take(&mut *self.tail.lock());
        for data in tail {
            self.send(data);
        }
        self.sender.lock().take();
    }

    pub fn is_stopped(&self) -> bool {
        self.tracks.is_cancelled()
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }
}

impl ScriptedCaptureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following acquisition fail as if permission were denied
    pub fn deny(&self, reason: &str) {
        self.state.lock().deny_reason = Some(reason.to_string());
    }

    pub fn allow(&self) {
        self.state.lock().deny_reason = None;
    }

    /// Number of successful acquisitions so far
    pub fn acquisitions(&self) -> usize {
        self.state.lock().acquisitions
    }

    /// Handle of the most recently acquired stream
    pub fn latest(&self) -> Option<ScriptedStreamHandle> {
        self.state.lock().streams.last().cloned()
    }

    /// Streams whose tracks are still running
    pub fn live_streams(&self) -> usize {
        self.state
            .lock()
            .streams
            .iter()
            .filter(|s| !s.is_stopped())
            .count()
    }
}

#[async_trait]
impl MediaCaptureProvider for ScriptedCaptureProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn acquire(&self, request: StreamRequest) -> Result<CaptureStream, MediaError> {
        let mut state = self.state.lock();

        if let Some(reason) = &state.deny_reason {
            return Err(MediaError::DeviceUnavailable {
                facing: request.facing,
                reason: reason.clone(),
            });
        }

        let (tx, rx) = mpsc::channel(1024);
        let tracks = CancellationToken::new();
        let stream = CaptureStream::new(request.facing, rx, tracks.clone());

        debug!("Scripted stream {} acquired", stream.id());
        let handle = ScriptedStreamHandle {
            stream_id: stream.id().to_string(),
            facing: request.facing,
            sender: Arc::new(Mutex::new(Some(tx))),
            tail: Arc::new(Mutex::new(Vec::new())),
            tracks: tracks.clone(),
            sequence: Arc::new(AtomicU64::new(0)),
        };

        let producer = handle.clone();
        tokio::spawn(async move {
            tracks.cancelled().await;
            producer.flush();
        });

        state.acquisitions += 1;
        state.streams.push(handle);

        Ok(stream)
    }
}
