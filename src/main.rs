use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clipcast::error::EventBusError;
use clipcast::{
    CaptureView, ClipcastConfig, ClipcastError, ClipcastEvent, EventFilter, FacingMode,
    KeyboardInputHandler, RecordingPhase,
};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "clipcast")]
#[command(about = "Record or pick a video, upload it for object detection and follow its processing")]
#[command(version)]
#[command(long_about = "Captures video from a camera and microphone, uploads recordings or \
selected files to a processing service with live upload progress, and follows server-side \
processing and detections over a real-time channel.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "clipcast.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Append logs to a file in addition to the console")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a video file and follow its processing
    Upload {
        /// Video file to upload
        file: PathBuf,

        /// How long to follow processing after the upload (0 to skip)
        #[arg(long, default_value_t = 120)]
        wait_seconds: u64,
    },
    /// Record from the camera and microphone
    Record {
        /// Camera to record from
        #[arg(long)]
        facing: Option<FacingMode>,

        /// Stop automatically after this many seconds
        #[arg(long)]
        seconds: Option<u64>,

        /// Control the recording from the keyboard
        #[arg(short, long)]
        interactive: bool,

        /// Upload the recording once stopped
        #[arg(long)]
        upload: bool,

        /// Save the recording to the export directory once stopped
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting clipcast v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match ClipcastConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;

    match args.command {
        Some(Command::Upload { file, wait_seconds }) => run_upload(config, file, wait_seconds).await,
        Some(Command::Record {
            facing,
            seconds,
            interactive,
            upload,
            save,
        }) => {
            let options = RecordOptions {
                facing,
                seconds,
                interactive,
                upload,
                save,
            };
            run_record(config, options).await
        }
        None => {
            Args::command().print_help()?;
            Ok(())
        }
    }
}

/// Surface a library error the way the view would prompt for it
fn report(e: ClipcastError) -> anyhow::Error {
    eprintln!("✗ {}", e.user_message());
    if e.is_retryable() {
        eprintln!("  (this may succeed if you try again)");
    }
    e.into()
}

async fn run_upload(config: ClipcastConfig, file: PathBuf, wait_seconds: u64) -> Result<()> {
    let mut view = CaptureView::from_config(config).map_err(report)?;
    view.open().await;
    if !view.is_channel_connected() {
        warn!("Real-time channel unavailable; processing progress will not be shown");
    }

    let artifact = view.select_file(&file).await.map_err(report)?;
    println!("Uploading {} ({} bytes)", artifact.file_name(), artifact.len());

    let outcome = upload_with_progress(&view).await;
    let completed = match outcome {
        Ok(completed) => completed,
        Err(e) => {
            view.shutdown().await;
            return Err(report(e));
        }
    };
    println!("Processed video: {}", completed.record.result_reference);

    if wait_seconds > 0 && view.is_channel_connected() {
        if let Some(subscription) = view.subscribe_progress(&completed.job.id) {
            let follow = async {
                let mut snapshots = Box::pin(subscription.into_stream());
                while let Some(progress) = snapshots.next().await {
                    if let Some(percent) = progress.processing {
                        println!("Processing: {:.0}%", percent);
                    }
                }
            };
            if tokio::time::timeout(Duration::from_secs(wait_seconds), follow)
                .await
                .is_err()
            {
                warn!("Stopped following processing after {}s", wait_seconds);
            }
        }
    }

    print_history(&view);
    view.shutdown().await;
    Ok(())
}

/// Upload the selected artifact, printing each transfer tick
async fn upload_with_progress(
    view: &CaptureView,
) -> clipcast::Result<clipcast::CompletedUpload> {
    view.upload_reporting(|percent| println!("{}% Uploaded", percent))
        .await
}

fn print_history(view: &CaptureView) {
    let history = view.history();
    if history.is_empty() {
        return;
    }
    println!("Processed videos:");
    for record in history {
        println!("  {} -> {}", record.display_name, record.result_reference);
    }
}

struct RecordOptions {
    facing: Option<FacingMode>,
    seconds: Option<u64>,
    interactive: bool,
    upload: bool,
    save: bool,
}

async fn run_record(config: ClipcastConfig, options: RecordOptions) -> Result<()> {
    let mut view = CaptureView::from_config(config).map_err(report)?;
    view.open().await;

    if let Some(facing) = options.facing {
        if view.recorder().media().facing() != facing {
            view.switch_camera().await.map_err(report)?;
        }
    }

    let mut controls = view.event_bus().subscribe_filtered(
        EventFilter::EventTypes(vec!["control_requested", "shutdown_requested"]),
        "cli-controls",
    );
    let keyboard = KeyboardInputHandler::new(view.event_bus());
    if options.interactive {
        keyboard.start().await?;
    }

    view.start_recording().await.map_err(report)?;
    println!("Recording... (Ctrl+C to finish)");

    let deadline = options
        .seconds
        .map(|seconds| Instant::now() + Duration::from_secs(seconds));
    let mut pump = tokio::time::interval(Duration::from_millis(200));

    loop {
        let until_deadline = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = pump.tick() => {
                view.pump_capture();
            }
            _ = until_deadline => {
                info!("Recording time limit reached");
                break;
            }
            event = controls.recv() => match event {
                Ok(ClipcastEvent::ControlRequested { action }) => {
                    view.pump_capture();
                    if let Err(e) = view.handle_control(action).await {
                        warn!("{:?}: {}", action, e.user_message());
                    }
                }
                Ok(ClipcastEvent::ShutdownRequested { reason, .. }) => {
                    info!("Finishing: {}", reason);
                    break;
                }
                Ok(_) => {}
                Err(EventBusError::Lagged { skipped }) => {
                    warn!("Missed {} control requests", skipped);
                }
                Err(EventBusError::ChannelClosed) => {
                    warn!("Control events unavailable");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if options.interactive {
        keyboard.stop().await?;
    }

    if matches!(
        view.recorder().phase(),
        RecordingPhase::Recording | RecordingPhase::Paused
    ) {
        view.pump_capture();
        if let Some(finished) = view.stop_recording().await.map_err(report)? {
            println!(
                "Recorded {} ({} bytes, {} chunks, {}s)",
                finished.artifact.file_name(),
                finished.artifact.len(),
                finished.chunk_count,
                finished.elapsed_seconds
            );
        }
    }

    if options.save {
        match view.save_recording().await.map_err(report)? {
            Some(path) => println!("Saved to {}", path.display()),
            None => println!("Nothing recorded to save"),
        }
    }

    if options.upload {
        let completed = upload_with_progress(&view).await.map_err(report)?;
        println!("Processed video: {}", completed.record.result_reference);
    }

    print_history(&view);
    view.shutdown().await;
    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clipcast={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Log file path has no file name"))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Clipcast Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Every key can be overridden with CLIPCAST_<SECTION>_<KEY> environment variables");
    println!();
    println!("{}", toml::to_string_pretty(&ClipcastConfig::default())?);
    Ok(())
}
