use super::clock::ElapsedClock;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Phase of the recording state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordingPhase {
    /// No recording in progress
    #[default]
    Idle,
    /// Accumulating chunks, clock running
    Recording,
    /// Accumulation and clock suspended
    Paused,
    /// Finalizing; passes straight back to Idle
    Stopped,
}

impl fmt::Display for RecordingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordingPhase::Idle => "idle",
            RecordingPhase::Recording => "recording",
            RecordingPhase::Paused => "paused",
            RecordingPhase::Stopped => "stopped",
        })
    }
}

/// Operations a user can request of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingAction {
    Start,
    Pause,
    Resume,
    Stop,
    SwitchCamera,
}

impl fmt::Display for RecordingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordingAction::Start => "start",
            RecordingAction::Pause => "pause",
            RecordingAction::Resume => "resume",
            RecordingAction::Stop => "stop",
            RecordingAction::SwitchCamera => "switch camera",
        })
    }
}

/// Transition table. `None` marks an illegal transition.
///
/// Stop from Idle is a no-op rather than an error and maps to Idle. Switching
/// camera is only allowed while no recording is open.
pub fn transition(phase: RecordingPhase, action: RecordingAction) -> Option<RecordingPhase> {
    use RecordingAction::*;
    use RecordingPhase::*;

    match (phase, action) {
        (Idle, Start) => Some(Recording),
        (Recording, Pause) => Some(Paused),
        (Paused, Resume) => Some(Recording),
        (Recording, Stop) | (Paused, Stop) => Some(Stopped),
        (Idle, Stop) => Some(Idle),
        (Idle, SwitchCamera) => Some(Idle),
        _ => None,
    }
}

/// Mutable state of one recording, owned by the controller
#[derive(Debug, Default)]
pub struct RecordingState {
    pub(super) phase: RecordingPhase,
    pub(super) clock: Arc<Mutex<ElapsedClock>>,
    pub(super) chunks: Vec<Bytes>,
}

impl RecordingState {
    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.clock.lock().elapsed_seconds()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn byte_count(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub(super) fn clear(&mut self) {
        self.chunks.clear();
        self.clock.lock().reset();
    }
}
