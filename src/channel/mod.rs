//! Real-time progress channel
//!
//! A persistent Socket.IO connection to the processing service that delivers
//! `processingUpdate` and `detectionData` messages independently of the
//! upload's HTTP request.

pub mod codec;
mod connection;
mod message;
mod mock;
mod progress_channel;
#[cfg(test)]
mod tests;

pub use connection::{websocket_url, ChannelConnection, ChannelConnector, SocketIoConnector};
pub use message::{ChannelMessage, DETECTION_DATA, PROCESSING_UPDATE};
pub use mock::ScriptedChannel;
pub use progress_channel::RealtimeProgressChannel;
