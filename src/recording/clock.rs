use std::time::Duration;
use tokio::time::Instant;

/// Accumulates time only while running.
///
/// Uses the tokio clock so paused-time tests drive it deterministically.
#[derive(Debug, Clone, Default)]
pub struct ElapsedClock {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl ElapsedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or resume; no effect if already running
    pub fn run(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Freeze the accumulated time
    pub fn hold(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running_since = None;
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated
            + self
                .running_since
                .map(|since| since.elapsed())
                .unwrap_or(Duration::ZERO)
    }

    /// Whole seconds of running time
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }
}
