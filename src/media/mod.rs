mod mock;
mod provider;
mod session;
mod synthetic;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
#[cfg(test)]
mod tests;

pub use mock::{ScriptedCaptureProvider, ScriptedStreamHandle};
pub use provider::{
    CaptureStream, ChunkFeed, FacingMode, MediaCaptureProvider, MediaChunk, NullPreview,
    PreviewSink, StreamRequest,
};
pub use session::{CaptureSession, MediaSessionManager};
pub use synthetic::SyntheticCaptureProvider;
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::GstCaptureProvider;
