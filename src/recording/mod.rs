//! Recording lifecycle
//!
//! A state machine over Idle, Recording, Paused and Stopped built on top of the
//! media session manager. Accumulates captured chunks while recording and
//! finalizes them into a single artifact on stop.

mod clock;
mod controller;
mod state;
#[cfg(test)]
mod tests;

pub use clock::ElapsedClock;
pub use controller::{FinishedRecording, RecorderSettings, RecordingController};
pub use state::{transition, RecordingAction, RecordingPhase, RecordingState};
