use super::provider::{CaptureStream, ChunkFeed, FacingMode, MediaCaptureProvider, StreamRequest};
use crate::config::CaptureConfig;
use crate::error::MediaError;
use async_trait::async_trait;
use bytes::Bytes;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest wait for the muxer to drain after EOS
const EOS_TIMEOUT_SECONDS: u64 = 5;

/// Send EOS, wait for it to reach the bus, then tear the pipeline down.
/// Dropping the pipeline drops the appsink callbacks and closes the stream.
fn finish_pipeline(pipeline: &Pipeline, stream_id: &str) {
    if !pipeline.send_event(gstreamer::event::Eos::new()) {
        warn!("Pipeline did not accept EOS for stream {}", stream_id);
    } else if let Some(bus) = pipeline.bus() {
        let message = bus.timed_pop_filtered(
            gstreamer::ClockTime::from_seconds(EOS_TIMEOUT_SECONDS),
            &[gstreamer::MessageType::Eos, gstreamer::MessageType::Error],
        );
        match message.as_ref().map(|m| m.view()) {
            Some(gstreamer::MessageView::Eos(_)) => {
                debug!("Stream {} drained", stream_id)
            }
            Some(gstreamer::MessageView::Error(err)) => {
                warn!("Stream {} errored while draining: {}", stream_id, err.error())
            }
            Some(_) => {}
            None => warn!(
                "Stream {} did not drain within {}s",
                stream_id, EOS_TIMEOUT_SECONDS
            ),
        }
    }

    if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
        error!("Failed to stop GStreamer pipeline: {}", e);
    }
}

/// GStreamer camera + microphone capture producing fragmented MP4 chunks
pub struct GstCaptureProvider {
    config: CaptureConfig,
}

impl GstCaptureProvider {
    pub fn new(config: CaptureConfig) -> Result<Self, MediaError> {
        gstreamer::init().map_err(|e| MediaError::Backend {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self { config })
    }

    fn device_index(&self, facing: FacingMode) -> u32 {
        match facing {
            FacingMode::Front => self.config.front_device,
            FacingMode::Back => self.config.back_device,
        }
    }

    /// Build the capture pipeline description for one request
    fn build_pipeline_string(&self, request: &StreamRequest) -> String {
        let (width, height) = self.config.resolution;
        let fps = self.config.fps;
        let fragment_ms = self.config.chunk_interval_ms;

        let mut pipeline = format!(
            "mp4mux name=mux fragment-duration={} streamable=true ! \
             appsink name=sink sync=false max-buffers=64 drop=false emit-signals=false",
            fragment_ms
        );

        if request.video {
            pipeline.push_str(&format!(
                " v4l2src device=/dev/video{} do-timestamp=true ! videoconvert ! \
                 video/x-raw,width={},height={},framerate={}/1 ! \
                 x264enc tune=zerolatency speed-preset=ultrafast key-int-max={} ! \
                 h264parse ! queue ! mux.",
                self.device_index(request.facing),
                width,
                height,
                fps,
                fps
            ));
        }

        if request.audio {
            pipeline.push_str(
                " pulsesrc do-timestamp=true ! audioconvert ! audioresample ! \
                 avenc_aac ! aacparse ! queue ! mux.",
            );
        }

        pipeline
    }
}

#[async_trait]
impl MediaCaptureProvider for GstCaptureProvider {
    fn name(&self) -> &str {
        "gstreamer"
    }

    async fn acquire(&self, request: StreamRequest) -> Result<CaptureStream, MediaError> {
        let unavailable = |reason: String| MediaError::DeviceUnavailable {
            facing: request.facing,
            reason,
        };

        let pipeline_desc = self.build_pipeline_string(&request);
        info!("Creating GStreamer capture pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| unavailable(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| unavailable("Failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| unavailable("Pipeline has no appsink".to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        let feed = ChunkFeed::new(tx);

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    let map = buffer
                        .map_readable()
                        .map_err(|_| gstreamer::FlowError::Error)?;

                    // Never wait on the streaming thread
                    if feed.offer(Bytes::copy_from_slice(map.as_slice())) {
                        Ok(gstreamer::FlowSuccess::Ok)
                    } else {
                        Err(gstreamer::FlowError::Eos)
                    }
                })
                .build(),
        );

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(unavailable(format!("Failed to start pipeline: {}", e)));
        }

        let starting = pipeline.clone();
        let result = tokio::task::spawn_blocking(move || {
            starting.state(gstreamer::ClockTime::from_seconds(5)).0
        })
        .await
        .map_err(|e| unavailable(format!("State query failed: {}", e)))?;
        if result.is_err() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(unavailable("Capture device refused to start".to_string()));
        }

        let tracks = CancellationToken::new();
        let stream = CaptureStream::new(request.facing, rx, tracks.clone());
        let stream_id = stream.id().to_string();

        tokio::spawn(async move {
            tracks.cancelled().await;
            debug!("Flushing GStreamer pipeline for stream {}", stream_id);

            // mp4mux writes the open fragment on EOS; the appsink hands it
            // over before EOS reaches the bus
            let stopped = tokio::task::spawn_blocking(move || {
                finish_pipeline(&pipeline, &stream_id);
            })
            .await;
            if let Err(e) = stopped {
                error!("GStreamer shutdown task failed: {}", e);
            }
        });

        info!("GStreamer {} capture started", request.facing);
        Ok(stream)
    }
}
