use super::view::{CaptureView, ViewState};
use crate::channel::{ChannelConnector, RealtimeProgressChannel, SocketIoConnector};
use crate::config::ClipcastConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::export::{DirectoryExporter, FileExporter};
use crate::media::{MediaCaptureProvider, MediaSessionManager, NullPreview, PreviewSink};
use crate::overlay::{GeoPoint, MapOverlay, MapOverlaySink, TracingOverlaySink};
use crate::recording::{RecorderSettings, RecordingController};
use crate::upload::{HttpUploadTransport, JobBoard, ProcessingHistory, UploadPipeline, UploadTransport};
use std::sync::Arc;
use tracing::debug;

/// Builder for CaptureView. Every collaborator not supplied is created from
/// the configuration.
pub struct CaptureViewBuilder {
    config: Option<ClipcastConfig>,
    event_bus: Option<Arc<EventBus>>,
    provider: Option<Arc<dyn MediaCaptureProvider>>,
    preview: Option<Arc<dyn PreviewSink>>,
    transport: Option<Arc<dyn UploadTransport>>,
    connector: Option<Arc<dyn ChannelConnector>>,
    exporter: Option<Arc<dyn FileExporter>>,
    overlay_sink: Option<Arc<dyn MapOverlaySink>>,
}

impl CaptureViewBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            event_bus: None,
            provider: None,
            preview: None,
            transport: None,
            connector: None,
            exporter: None,
            overlay_sink: None,
        }
    }

    pub fn with_config(mut self, config: ClipcastConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_capture_provider(mut self, provider: Arc<dyn MediaCaptureProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_preview(mut self, preview: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn UploadTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn FileExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn with_overlay_sink(mut self, sink: Arc<dyn MapOverlaySink>) -> Self {
        self.overlay_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<CaptureView> {
        let config = self.config.unwrap_or_default();
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::new(config.system.event_bus_capacity)));

        let provider = match self.provider {
            Some(provider) => provider,
            None => default_provider(&config)?,
        };
        let preview: Arc<dyn PreviewSink> = match self.preview {
            Some(preview) => preview,
            None => Arc::new(NullPreview),
        };
        let transport: Arc<dyn UploadTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpUploadTransport::from_config(&config)?),
        };
        let connector: Arc<dyn ChannelConnector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(SocketIoConnector::from_config(&config)?),
        };
        let exporter: Arc<dyn FileExporter> = match self.exporter {
            Some(exporter) => exporter,
            None => Arc::new(DirectoryExporter::from_config(&config.export)),
        };
        let overlay_sink: Arc<dyn MapOverlaySink> = match self.overlay_sink {
            Some(sink) => sink,
            None => Arc::new(TracingOverlaySink),
        };

        debug!(
            "Building capture view: {} capture, {} transport, channel at {}",
            provider.name(),
            transport.name(),
            connector.endpoint()
        );

        let media = MediaSessionManager::new(
            provider,
            preview,
            Arc::clone(&event_bus),
            config.capture.default_facing,
        );
        let recorder = RecordingController::new(
            media,
            Arc::clone(&event_bus),
            RecorderSettings::from_config(&config.capture, &config.recording),
        );

        let board = JobBoard::new();
        let pipeline = UploadPipeline::new(
            transport,
            board.clone(),
            ProcessingHistory::new(),
            Arc::clone(&event_bus),
        );

        let overlay = Arc::new(MapOverlay::new(
            overlay_sink,
            config.overlay.initial_location.map(GeoPoint::from),
        ));
        let channel =
            RealtimeProgressChannel::new(connector, board, Arc::clone(&overlay), Arc::clone(&event_bus));

        Ok(CaptureView {
            config,
            event_bus,
            recorder,
            pipeline,
            channel,
            overlay,
            exporter,
            recorded: None,
            selected: None,
            state: ViewState::Closed,
        })
    }
}

impl Default for CaptureViewBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn default_provider(config: &ClipcastConfig) -> Result<Arc<dyn MediaCaptureProvider>> {
    Ok(Arc::new(crate::media::GstCaptureProvider::new(
        config.capture.clone(),
    )?))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn default_provider(config: &ClipcastConfig) -> Result<Arc<dyn MediaCaptureProvider>> {
    Ok(Arc::new(crate::media::SyntheticCaptureProvider::new(
        std::time::Duration::from_millis(config.capture.chunk_interval_ms),
        32 * 1024,
    )))
}
