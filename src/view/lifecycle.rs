use super::view::{CaptureView, ViewState};
use tracing::{info, warn};

impl CaptureView {
    /// Bring the view up and connect the real-time channel.
    ///
    /// A channel that cannot connect leaves the view usable for recording and
    /// uploading; `is_channel_connected` reports the outcome.
    pub async fn open(&mut self) {
        if self.state == ViewState::Open {
            return;
        }

        info!("Opening capture view");
        if let Err(e) = self.channel.connect().await {
            warn!("Processing updates unavailable: {}", e);
        }
        self.state = ViewState::Open;
    }

    /// Release the capture session, clear timers and disconnect the channel.
    /// Safe to call repeatedly.
    pub fn close(&mut self) {
        self.recorder.dispose();
        self.channel.disconnect();

        if self.state == ViewState::Open {
            self.state = ViewState::Closed;
            info!("Capture view closed");
        }
    }

    /// Close and wait for the channel connection to finish closing
    pub async fn shutdown(&mut self) {
        self.channel.shutdown().await;
        self.close();
    }
}
