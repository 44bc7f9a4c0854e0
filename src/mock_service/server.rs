use crate::channel::ChannelMessage;
use crate::config::ClipcastConfig;
use crate::error::{Result, ServiceError};
use crate::overlay::DetectionEvent;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers::{health_handler, socket_handler, upload_handler};

#[derive(Debug, Clone)]
pub struct MockServiceConfig {
    pub upload_path: String,
    pub upload_field: String,
    pub socket_path: String,
    /// Pause before each scripted processing step
    pub step_interval: Duration,
    /// Progress increment between steps
    pub step_percent: u8,
    pub max_upload_bytes: usize,
    /// Objects reported once processing finishes
    pub detections: Vec<DetectionEvent>,
}

impl Default for MockServiceConfig {
    fn default() -> Self {
        Self {
            upload_path: "/api/videos/upload".to_string(),
            upload_field: "video".to_string(),
            socket_path: "/socket.io/".to_string(),
            step_interval: Duration::from_millis(500),
            step_percent: 25,
            max_upload_bytes: 512 * 1024 * 1024,
            detections: vec![
                DetectionEvent::new("person", 51.505, -0.09),
                DetectionEvent::new("car", 51.507, -0.087),
            ],
        }
    }
}

impl MockServiceConfig {
    /// Routes matching what the client is configured to call
    pub fn from_config(config: &ClipcastConfig) -> Self {
        Self {
            upload_path: config.service.upload_path.clone(),
            upload_field: config.service.upload_field.clone(),
            socket_path: config.channel.socket_path.clone(),
            ..Self::default()
        }
    }
}

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) config: Arc<MockServiceConfig>,
    /// Processing notices fanned out to every connected socket
    pub(crate) notices: broadcast::Sender<ChannelMessage>,
    pub(crate) uploads: Arc<AtomicU64>,
}

/// Processing service bound to a local address, not yet serving
pub struct MockProcessingService {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: ServerState,
}

impl MockProcessingService {
    /// Bind to `address`; port 0 picks a free port
    pub async fn bind(address: &str, config: MockServiceConfig) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.to_string(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;

        let (notices, _) = broadcast::channel(256);
        let state = ServerState {
            config: Arc::new(config),
            notices,
            uploads: Arc::new(AtomicU64::new(0)),
        };

        info!("Mock processing service bound to {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            state,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL a client should be configured with
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    fn router(&self) -> Router {
        let config = &self.state.config;
        Router::new()
            .route(&config.upload_path, post(upload_handler))
            .route(&config.socket_path, get(socket_handler))
            .route("/health", get(health_handler))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
            )
            .with_state(self.state.clone())
    }

    /// Serve until the task is aborted or the listener fails
    pub async fn serve(self) -> Result<()> {
        let app = self.router();
        info!(
            "Mock processing service listening on {} (upload {}, socket {})",
            self.local_addr, self.state.config.upload_path, self.state.config.socket_path
        );

        axum::serve(self.listener, app)
            .await
            .map_err(|e| ServiceError::Stopped {
                details: format!("Server error: {}", e),
            })?;

        Ok(())
    }

    /// Serve on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!("Mock processing service failed: {}", e);
            }
        })
    }
}
