use super::builder::CaptureViewBuilder;
use crate::artifact::MediaArtifact;
use crate::channel::RealtimeProgressChannel;
use crate::config::ClipcastConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::export::FileExporter;
use crate::overlay::MapOverlay;
use crate::recording::RecordingController;
use crate::upload::UploadPipeline;
use std::sync::Arc;

/// Whether the view currently holds its long-lived resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Closed,
    Open,
}

/// One capture/upload view: recorder, upload pipeline, real-time channel and
/// map overlay sharing a job board and an event bus for the view's lifetime.
pub struct CaptureView {
    pub(super) config: ClipcastConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) recorder: RecordingController,
    pub(super) pipeline: UploadPipeline,
    pub(super) channel: RealtimeProgressChannel,
    pub(super) overlay: Arc<MapOverlay>,
    pub(super) exporter: Arc<dyn FileExporter>,

    /// Last finished recording, offered by the save affordance
    pub(super) recorded: Option<MediaArtifact>,
    /// Candidate for the next upload, recorded or picked from disk
    pub(super) selected: Option<MediaArtifact>,
    pub(super) state: ViewState,
}

impl CaptureView {
    pub fn builder() -> CaptureViewBuilder {
        CaptureViewBuilder::new()
    }

    /// View with every collaborator created from `config`
    pub fn from_config(config: ClipcastConfig) -> Result<Self> {
        CaptureViewBuilder::new().with_config(config).build()
    }

    pub fn config(&self) -> &ClipcastConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }

    pub fn pipeline(&self) -> &UploadPipeline {
        &self.pipeline
    }

    pub fn overlay(&self) -> &MapOverlay {
        &self.overlay
    }

    pub fn recorded_artifact(&self) -> Option<&MediaArtifact> {
        self.recorded.as_ref()
    }

    pub fn selected_artifact(&self) -> Option<&MediaArtifact> {
        self.selected.as_ref()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn is_channel_connected(&self) -> bool {
        self.channel.is_connected()
    }
}

impl Drop for CaptureView {
    fn drop(&mut self) {
        self.close();
    }
}
