use super::connection::{ChannelConnection, ChannelConnector};
use super::message::ChannelMessage;
use crate::error::ChannelError;
use crate::events::{ClipcastEvent, EventBus};
use crate::overlay::MapOverlay;
use crate::upload::JobBoard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Applies inbound messages to jobs and the map overlay
#[derive(Clone)]
struct MessageDispatcher {
    board: JobBoard,
    overlay: Arc<MapOverlay>,
    event_bus: Arc<EventBus>,
}

impl MessageDispatcher {
    fn dispatch(&self, message: ChannelMessage) {
        match message {
            ChannelMessage::ProcessingUpdate {
                job_id,
                progress: None,
            } => {
                debug!(
                    "Ignoring processing update without progress (job {})",
                    job_id.as_deref().unwrap_or("active")
                );
            }
            ChannelMessage::ProcessingUpdate {
                job_id,
                progress: Some(progress),
            } => match self
                .board
                .record_processing_progress(job_id.as_deref(), progress)
            {
                Some((id, percent)) => {
                    debug!("Job {} processing at {}%", id, percent);
                    self.event_bus.publish(ClipcastEvent::ProcessingProgress {
                        job_id: id.to_string(),
                        percent,
                    });
                }
                None => debug!(
                    "No job for processing update {:?} ({}%)",
                    job_id, progress
                ),
            },
            ChannelMessage::DetectionData { job_id, objects } => {
                let count = objects.len();
                self.overlay.show_detections(objects);
                self.event_bus
                    .publish(ClipcastEvent::DetectionsReceived { job_id, count });
            }
        }
    }
}

struct Listener {
    token: CancellationToken,
    handle: JoinHandle<()>,
    connected: Arc<AtomicBool>,
}

/// Long-lived connection delivering processing progress and detections.
///
/// Messages are applied on a background listener task until
/// [`disconnect`](Self::disconnect) is called or the server hangs up.
pub struct RealtimeProgressChannel {
    connector: Arc<dyn ChannelConnector>,
    dispatcher: MessageDispatcher,
    listener: Option<Listener>,
}

impl RealtimeProgressChannel {
    pub fn new(
        connector: Arc<dyn ChannelConnector>,
        board: JobBoard,
        overlay: Arc<MapOverlay>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            connector,
            dispatcher: MessageDispatcher {
                board,
                overlay,
                event_bus,
            },
            listener: None,
        }
    }

    /// Connect and start listening. No-op while already connected.
    pub async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.is_connected() {
            debug!("Real-time channel already connected");
            return Ok(());
        }
        self.disconnect();

        let connection = self.connector.connect().await.map_err(|e| {
            warn!(
                "Real-time channel connect to {} failed: {}",
                self.connector.endpoint(),
                e
            );
            e
        })?;

        let token = CancellationToken::new();
        let connected = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(listen(
            connection,
            self.dispatcher.clone(),
            token.clone(),
            Arc::clone(&connected),
        ));

        self.listener = Some(Listener {
            token,
            handle,
            connected,
        });
        self.dispatcher
            .event_bus
            .publish(ClipcastEvent::ChannelStatusChanged { connected: true });
        info!("Listening for processing updates on {}", self.connector.endpoint());
        Ok(())
    }

    /// Stop dispatching immediately and close the connection in the
    /// background. Safe to call repeatedly.
    pub fn disconnect(&mut self) -> bool {
        let Some(listener) = self.listener.take() else {
            return false;
        };
        listener.token.cancel();
        debug!("Real-time channel disconnect requested");
        true
    }

    /// Disconnect and wait for the connection to be closed
    pub async fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.token.cancel();
            if let Err(e) = listener.handle.await {
                warn!("Real-time listener ended abnormally: {}", e);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.listener
            .as_ref()
            .map(|listener| listener.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

impl Drop for RealtimeProgressChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn listen(
    mut connection: Box<dyn ChannelConnection>,
    dispatcher: MessageDispatcher,
    token: CancellationToken,
    connected: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                connection.close().await;
                break;
            }
            next = connection.next_message() => match next {
                Ok(Some(message)) => {
                    if token.is_cancelled() {
                        break;
                    }
                    dispatcher.dispatch(message);
                }
                Ok(None) => {
                    info!("Real-time channel closed by server");
                    break;
                }
                Err(ChannelError::Codec { details }) => {
                    warn!("Dropping malformed real-time message: {}", details);
                }
                Err(e) => {
                    warn!("Real-time channel failed: {}", e);
                    break;
                }
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    dispatcher
        .event_bus
        .publish(ClipcastEvent::ChannelStatusChanged { connected: false });
}
