use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clipcast::{ClipcastConfig, MockProcessingService, MockServiceConfig};
use tracing::{info, warn};

/// Local processing service that accepts uploads and replays a scripted
/// processing run over Socket.IO.
#[derive(Parser, Debug)]
#[command(name = "clipcast-mock-service")]
#[command(about = "Stand-in video processing service for clipcast demos and tests")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    bind: String,

    /// Clipcast configuration providing the upload and socket paths
    #[arg(short = 'c', long, default_value = "clipcast.toml")]
    config: PathBuf,

    /// Milliseconds between processing steps
    #[arg(long, default_value_t = 500)]
    step_ms: u64,

    /// Progress increment per step
    #[arg(long, default_value_t = 25)]
    step_percent: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let client_config = match ClipcastConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default routes, configuration unavailable: {}", e);
            ClipcastConfig::default()
        }
    };

    let config = MockServiceConfig {
        step_interval: Duration::from_millis(args.step_ms),
        step_percent: args.step_percent,
        ..MockServiceConfig::from_config(&client_config)
    };

    let service = MockProcessingService::bind(&args.bind, config)
        .await
        .context("Failed to start mock processing service")?;
    info!("Point clipcast at {}", service.base_url());

    tokio::select! {
        result = service.serve() => result.context("Mock processing service stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
