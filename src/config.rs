use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::media::FacingMode;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClipcastConfig {
    pub service: ServiceConfig,
    pub channel: ChannelConfig,
    pub capture: CaptureConfig,
    pub recording: RecordingConfig,
    pub export: ExportConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Base URL of the processing service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the multipart upload endpoint
    #[serde(default = "default_upload_path")]
    pub upload_path: String,

    /// Multipart field carrying the video
    #[serde(default = "default_upload_field")]
    pub upload_field: String,

    /// Whole-request timeout for an upload
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Size of each streamed body piece (one progress tick per piece)
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Real-time channel address; falls back to the service base URL
    pub url: Option<String>,

    /// Socket.IO endpoint path
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Facing mode used until the user switches
    #[serde(default = "default_facing")]
    pub default_facing: FacingMode,

    /// Video device index of the front (user-facing) camera
    #[serde(default = "default_front_device")]
    pub front_device: u32,

    /// Video device index of the back (environment) camera
    #[serde(default = "default_back_device")]
    pub back_device: u32,

    /// Capture resolution (width, height)
    #[serde(default = "default_resolution")]
    pub resolution: (u32, u32),

    #[serde(default = "default_fps")]
    pub fps: u32,

    /// How often the capture backend emits a data chunk
    #[serde(default = "default_chunk_interval")]
    pub chunk_interval_ms: u64,

    /// Declared mime type of recorded artifacts
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecordingConfig {
    /// Suggested file name of recorded artifacts
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Interval of elapsed-time UI ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExportConfig {
    /// Directory the save affordance writes into
    #[serde(default = "default_export_directory")]
    pub directory: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct OverlayConfig {
    /// Location shown on the map before any update, as [lat, lng]
    pub initial_location: Option<(f64, f64)>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ClipcastConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("clipcast.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("service.base_url", default_base_url())?
            .set_default("service.upload_path", default_upload_path())?
            .set_default("service.upload_field", default_upload_field())?
            .set_default("service.request_timeout_seconds", default_request_timeout())?
            .set_default(
                "service.upload_chunk_bytes",
                default_upload_chunk_bytes() as u64,
            )?
            .set_default("channel.socket_path", default_socket_path())?
            .set_default("channel.connect_timeout_seconds", default_connect_timeout())?
            .set_default("capture.default_facing", default_facing().as_str())?
            .set_default("capture.front_device", default_front_device())?
            .set_default("capture.back_device", default_back_device())?
            .set_default(
                "capture.resolution",
                vec![default_resolution().0, default_resolution().1],
            )?
            .set_default("capture.fps", default_fps())?
            .set_default("capture.chunk_interval_ms", default_chunk_interval())?
            .set_default("capture.mime_type", default_mime_type())?
            .set_default("recording.file_name", default_file_name())?
            .set_default("recording.tick_interval_ms", default_tick_interval())?
            .set_default("export.directory", default_export_directory())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as u64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(Environment::with_prefix("CLIPCAST").separator("_"))
            .build()?;

        let config: ClipcastConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.base_url.trim().is_empty() {
            return Err(ConfigError::Message(
                "Service base_url must not be empty".to_string(),
            ));
        }

        if url::Url::parse(&self.service.base_url).is_err() {
            return Err(ConfigError::Message(format!(
                "Service base_url '{}' is not a valid URL",
                self.service.base_url
            )));
        }

        if self.service.upload_chunk_bytes == 0 {
            return Err(ConfigError::Message(
                "Service upload_chunk_bytes must be greater than 0".to_string(),
            ));
        }

        if self.capture.fps == 0 {
            return Err(ConfigError::Message(
                "Capture fps must be greater than 0".to_string(),
            ));
        }

        if self.capture.resolution.0 == 0 || self.capture.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Capture resolution must be greater than 0".to_string(),
            ));
        }

        if self.capture.chunk_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Capture chunk_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.recording.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Recording tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.recording.file_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "Recording file_name must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Full URL of the upload endpoint
    pub fn upload_url(&self) -> String {
        join_url(&self.service.base_url, &self.service.upload_path)
    }

    /// Base address of the real-time channel
    pub fn channel_url(&self) -> String {
        self.channel
            .url
            .clone()
            .unwrap_or_else(|| self.service.base_url.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.channel.connect_timeout_seconds)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl Default for ClipcastConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                base_url: default_base_url(),
                upload_path: default_upload_path(),
                upload_field: default_upload_field(),
                request_timeout_seconds: default_request_timeout(),
                upload_chunk_bytes: default_upload_chunk_bytes(),
            },
            channel: ChannelConfig {
                url: None,
                socket_path: default_socket_path(),
                connect_timeout_seconds: default_connect_timeout(),
            },
            capture: CaptureConfig {
                default_facing: default_facing(),
                front_device: default_front_device(),
                back_device: default_back_device(),
                resolution: default_resolution(),
                fps: default_fps(),
                chunk_interval_ms: default_chunk_interval(),
                mime_type: default_mime_type(),
            },
            recording: RecordingConfig {
                file_name: default_file_name(),
                tick_interval_ms: default_tick_interval(),
            },
            export: ExportConfig {
                directory: default_export_directory(),
            },
            overlay: OverlayConfig::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_upload_path() -> String {
    "/api/videos/upload".to_string()
}
fn default_upload_field() -> String {
    "video".to_string()
}
fn default_request_timeout() -> u64 {
    300
}
fn default_upload_chunk_bytes() -> usize {
    64 * 1024
}

fn default_socket_path() -> String {
    "/socket.io/".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}

fn default_facing() -> FacingMode {
    FacingMode::Back
}
fn default_front_device() -> u32 {
    0
}
fn default_back_device() -> u32 {
    1
}
fn default_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_fps() -> u32 {
    30
}
fn default_chunk_interval() -> u64 {
    1000
}
fn default_mime_type() -> String {
    "video/mp4".to_string()
}

fn default_file_name() -> String {
    "recorded-video.mp4".to_string()
}
fn default_tick_interval() -> u64 {
    1000
}

fn default_export_directory() -> String {
    "./recordings".to_string()
}

fn default_event_bus_capacity() -> usize {
    256
}
