//! Capture view
//!
//! Composes the media session, recorder, upload pipeline, real-time channel
//! and map overlay for the lifetime of one view.

mod actions;
mod builder;
mod lifecycle;
#[allow(clippy::module_inception)]
mod view;

pub use builder::CaptureViewBuilder;
pub use view::{CaptureView, ViewState};
