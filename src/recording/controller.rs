use super::clock::ElapsedClock;
use super::state::{transition, RecordingAction, RecordingPhase, RecordingState};
use crate::artifact::MediaArtifact;
use crate::config::{CaptureConfig, RecordingConfig};
use crate::error::{RecordingError, Result};
use crate::events::{ClipcastEvent, EventBus};
use crate::media::{FacingMode, MediaSessionManager};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How recordings are packaged and ticked
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderSettings {
    pub mime_type: String,
    pub file_name: String,
    pub tick_interval: Duration,
}

impl RecorderSettings {
    pub fn from_config(capture: &CaptureConfig, recording: &RecordingConfig) -> Self {
        Self {
            mime_type: capture.mime_type.clone(),
            file_name: recording.file_name.clone(),
            tick_interval: Duration::from_millis(recording.tick_interval_ms),
        }
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            mime_type: "video/mp4".to_string(),
            file_name: "recorded-video.mp4".to_string(),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Result of stopping a recording
#[derive(Debug, Clone)]
pub struct FinishedRecording {
    pub artifact: MediaArtifact,
    /// Elapsed recording time observed at stop, before the reset
    pub elapsed_seconds: u64,
    pub chunk_count: usize,
}

/// Periodic elapsed-time publisher, cancelled on pause, stop and drop
struct ElapsedTicker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ElapsedTicker {
    fn spawn(clock: Arc<Mutex<ElapsedClock>>, event_bus: Arc<EventBus>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        let elapsed_seconds = clock.lock().elapsed_seconds();
                        event_bus.publish(ClipcastEvent::RecordingTick { elapsed_seconds });
                    }
                }
            }
        });

        Self { token, handle }
    }

    fn cancel(&self) {
        self.token.cancel();
        self.handle.abort();
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Recording state machine over the media session manager
pub struct RecordingController {
    media: MediaSessionManager,
    event_bus: Arc<EventBus>,
    settings: RecorderSettings,
    state: RecordingState,
    ticker: Option<ElapsedTicker>,
}

impl RecordingController {
    pub fn new(
        media: MediaSessionManager,
        event_bus: Arc<EventBus>,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            media,
            event_bus,
            settings,
            state: RecordingState::default(),
            ticker: None,
        }
    }

    /// Guard an action against the transition table
    fn check(&self, action: RecordingAction) -> std::result::Result<RecordingPhase, RecordingError> {
        transition(self.state.phase, action).ok_or(RecordingError::InvalidTransition {
            phase: self.state.phase,
            action,
        })
    }

    fn set_phase(&mut self, to: RecordingPhase) {
        let from = self.state.phase;
        if from == to {
            return;
        }
        self.state.phase = to;
        debug!("Recording phase {} -> {}", from, to);
        self.event_bus
            .publish(ClipcastEvent::RecordingPhaseChanged { from, to });
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();
        self.ticker = Some(ElapsedTicker::spawn(
            Arc::clone(&self.state.clock),
            Arc::clone(&self.event_bus),
            self.settings.tick_interval,
        ));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    /// Begin recording on a fresh stream from the capture device.
    ///
    /// An idle session kept for preview is reused only while it has produced
    /// nothing yet; otherwise it is re-acquired so the recording starts with
    /// the container header.
    pub async fn start(&mut self) -> Result<()> {
        let next = self.check(RecordingAction::Start)?;

        let stale = self.media.poll_chunks().len();
        let touched = self
            .media
            .session()
            .map(|session| session.delivered_chunks() > 0)
            .unwrap_or(false);
        if !self.media.is_active() || touched {
            if touched {
                debug!(
                    "Re-acquiring capture session already read for preview ({} pending chunks)",
                    stale
                );
            }
            let facing = self.media.facing();
            self.media
                .acquire(facing)
                .await
                .map_err(|e| RecordingError::NotReady {
                    reason: e.to_string(),
                })?;
        }

        self.state.clear();
        self.state.clock.lock().run();
        self.start_ticker();
        self.set_phase(next);

        info!("Recording started");
        Ok(())
    }

    /// Suspend chunk accumulation and the clock
    pub fn pause(&mut self) -> Result<()> {
        let next = self.check(RecordingAction::Pause)?;

        self.collect();
        self.state.clock.lock().hold();
        self.stop_ticker();
        self.set_phase(next);

        info!("Recording paused at {}s", self.state.elapsed_seconds());
        Ok(())
    }

    /// Continue after a pause
    pub fn resume(&mut self) -> Result<()> {
        let next = self.check(RecordingAction::Resume)?;

        // Anything produced while paused is not part of the recording
        self.collect();
        self.state.clock.lock().run();
        self.start_ticker();
        self.set_phase(next);

        info!("Recording resumed");
        Ok(())
    }

    /// Finalize the recording into an artifact and close the session.
    ///
    /// The capture device is stopped first and everything it still flushes
    /// is part of the recording. Returns `None` when called from Idle.
    pub async fn stop(&mut self) -> Result<Option<FinishedRecording>> {
        let next = self.check(RecordingAction::Stop)?;
        if next == RecordingPhase::Idle {
            debug!("Stop requested while idle; nothing to do");
            return Ok(None);
        }

        self.collect();
        self.stop_ticker();

        let elapsed_seconds = {
            let mut clock = self.state.clock.lock();
            clock.hold();
            let elapsed = clock.elapsed_seconds();
            clock.reset();
            elapsed
        };

        let tail = self.media.finish().await;
        let flushed = self.accept(tail.into_iter().map(|chunk| chunk.data));
        if flushed > 0 {
            debug!("Kept {} chunks flushed at stop", flushed);
        }

        let chunks = std::mem::take(&mut self.state.chunks);
        let chunk_count = chunks.len();
        let artifact =
            MediaArtifact::from_chunks(chunks, &self.settings.mime_type, &self.settings.file_name);

        self.set_phase(next);

        self.event_bus.publish(ClipcastEvent::RecordingFinished {
            file_name: artifact.file_name().to_string(),
            size_bytes: artifact.len() as u64,
            chunk_count,
            elapsed_seconds,
        });
        info!(
            "Recording stopped after {}s: {} chunks, {} bytes",
            elapsed_seconds,
            chunk_count,
            artifact.len()
        );

        self.state.clear();
        self.set_phase(RecordingPhase::Idle);

        Ok(Some(FinishedRecording {
            artifact,
            elapsed_seconds,
            chunk_count,
        }))
    }

    /// Switch cameras. Refused while a recording is open.
    pub async fn switch_camera(&mut self) -> Result<FacingMode> {
        self.check(RecordingAction::SwitchCamera)?;
        Ok(self.media.switch_facing().await?)
    }

    /// Drain captured chunks; they are kept only while Recording.
    ///
    /// Returns the number of chunks appended.
    pub fn collect(&mut self) -> usize {
        let chunks = self.media.poll_chunks();
        self.accept(chunks.into_iter().map(|chunk| chunk.data))
    }

    /// Wait for the next chunk from the capture session and accept it.
    ///
    /// Returns `None` when there is no session or its stream ended.
    pub async fn capture_next(&mut self) -> Option<usize> {
        let chunk = self.media.next_chunk().await?;
        Some(self.accept(std::iter::once(chunk.data)))
    }

    fn accept<I>(&mut self, chunks: I) -> usize
    where
        I: IntoIterator<Item = bytes::Bytes>,
    {
        if self.state.phase != RecordingPhase::Recording {
            let dropped = chunks.into_iter().count();
            if dropped > 0 {
                debug!("Dropped {} chunks captured while {}", dropped, self.state.phase);
            }
            return 0;
        }
        let before = self.state.chunks.len();
        self.state.chunks.extend(chunks);
        self.state.chunks.len() - before
    }

    /// Tear everything down without producing an artifact
    pub fn dispose(&mut self) {
        self.stop_ticker();
        self.state.clear();
        self.media.release();
        self.set_phase(RecordingPhase::Idle);
        debug!("Recording controller disposed");
    }

    pub fn phase(&self) -> RecordingPhase {
        self.state.phase
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.state.elapsed_seconds()
    }

    pub fn chunk_count(&self) -> usize {
        self.state.chunk_count()
    }

    pub fn state(&self) -> &RecordingState {
        &self.state
    }

    /// Whether the elapsed-time ticker is running
    pub fn has_active_timer(&self) -> bool {
        self.ticker
            .as_ref()
            .map(|ticker| !ticker.token.is_cancelled())
            .unwrap_or(false)
    }

    pub fn media(&self) -> &MediaSessionManager {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut MediaSessionManager {
        &mut self.media
    }
}
