use super::view::CaptureView;
use crate::artifact::MediaArtifact;
use crate::error::Result;
use crate::events::{ClipcastEvent, ControlAction};
use crate::export::SAVED_RECORDING_NAME;
use crate::media::FacingMode;
use crate::overlay::GeoPoint;
use crate::recording::{FinishedRecording, RecordingAction, RecordingPhase};
use crate::upload::{CompletedUpload, JobId, ProcessedVideoRecord, ProgressSubscription, UploadJob};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

impl CaptureView {
    pub async fn switch_camera(&mut self) -> Result<FacingMode> {
        self.recorder.switch_camera().await
    }

    pub async fn start_recording(&mut self) -> Result<()> {
        self.recorder.start().await
    }

    pub fn pause_recording(&mut self) -> Result<()> {
        self.recorder.pause()
    }

    pub fn resume_recording(&mut self) -> Result<()> {
        self.recorder.resume()
    }

    /// Stop recording. The artifact becomes both the saveable recording and
    /// the upload candidate.
    pub async fn stop_recording(&mut self) -> Result<Option<FinishedRecording>> {
        let finished = self.recorder.stop().await?;
        if let Some(finished) = &finished {
            self.recorded = Some(finished.artifact.clone());
            self.select(finished.artifact.clone());
        }
        Ok(finished)
    }

    /// Pick a video file from disk as the upload candidate
    pub async fn select_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&MediaArtifact> {
        let artifact = MediaArtifact::from_file(path).await?;
        Ok(self.select(artifact))
    }

    fn select(&mut self, artifact: MediaArtifact) -> &MediaArtifact {
        self.event_bus.publish(ClipcastEvent::ArtifactSelected {
            file_name: artifact.file_name().to_string(),
            size_bytes: artifact.len() as u64,
        });
        debug!("Upload candidate is now {}", artifact.file_name());
        self.selected.insert(artifact)
    }

    /// Upload the current candidate as a new job
    pub async fn upload(&self) -> Result<CompletedUpload> {
        self.pipeline.submit(self.selected.clone()).await
    }

    /// Upload the current candidate, handing each transfer tick's percent
    /// to `on_progress`
    pub async fn upload_reporting<F>(&self, on_progress: F) -> Result<CompletedUpload>
    where
        F: FnMut(u8) + Send,
    {
        self.pipeline
            .submit_reporting(self.selected.clone(), on_progress)
            .await
    }

    /// Write the last recording to the export directory. `None` when nothing
    /// has been recorded.
    pub async fn save_recording(&self) -> Result<Option<PathBuf>> {
        let Some(artifact) = &self.recorded else {
            debug!("Nothing recorded to save");
            return Ok(None);
        };
        let path = self.exporter.offer(artifact, SAVED_RECORDING_NAME).await?;
        Ok(Some(path))
    }

    pub fn history(&self) -> Vec<ProcessedVideoRecord> {
        self.pipeline.history().records()
    }

    pub fn job(&self, job_id: &JobId) -> Option<UploadJob> {
        self.pipeline.board().get(job_id)
    }

    pub fn active_job(&self) -> Option<UploadJob> {
        self.pipeline.board().active()
    }

    pub fn subscribe_progress(&self, job_id: &JobId) -> Option<ProgressSubscription> {
        self.pipeline.subscribe(job_id)
    }

    pub fn set_location(&self, location: GeoPoint) {
        self.overlay.set_location(location);
    }

    /// Drain chunks produced by the capture device since the last call
    pub fn pump_capture(&mut self) -> usize {
        self.recorder.collect()
    }

    /// Apply a request from a control surface
    pub async fn handle_control(&mut self, action: ControlAction) -> Result<()> {
        info!("Control requested: {:?}", action);
        match action {
            ControlAction::Recording(RecordingAction::Start) => self.start_recording().await,
            ControlAction::Recording(RecordingAction::Pause) => self.pause_recording(),
            ControlAction::Recording(RecordingAction::Resume) => self.resume_recording(),
            ControlAction::Recording(RecordingAction::Stop) => self.stop_recording().await.map(|_| ()),
            ControlAction::Recording(RecordingAction::SwitchCamera) | ControlAction::SwitchCamera => {
                self.switch_camera().await.map(|_| ())
            }
            ControlAction::TogglePause => match self.recorder.phase() {
                RecordingPhase::Paused => self.resume_recording(),
                _ => self.pause_recording(),
            },
            ControlAction::Upload => self.upload().await.map(|_| ()),
            ControlAction::Save => self.save_recording().await.map(|_| ()),
        }
    }
}
