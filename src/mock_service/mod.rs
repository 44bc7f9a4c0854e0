//! Local stand-in for the video processing service
//!
//! Accepts multipart uploads and replays a scripted processing run for each
//! one over a Socket.IO-compatible WebSocket endpoint.

mod handlers;
mod server;

pub use server::{MockProcessingService, MockServiceConfig};
