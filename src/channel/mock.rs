use super::connection::{ChannelConnection, ChannelConnector};
use super::message::ChannelMessage;
use crate::error::ChannelError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

type Delivery = Result<ChannelMessage, ChannelError>;

#[derive(Default)]
struct ScriptState {
    refuse_reason: Option<String>,
    connects: usize,
    senders: Vec<mpsc::UnboundedSender<Delivery>>,
}

/// In-process connector whose connections deliver whatever the test injects
#[derive(Clone, Default)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make following connection attempts fail
    pub fn refuse(&self, reason: &str) {
        self.state.lock().refuse_reason = Some(reason.to_string());
    }

    /// Deliver a message to every open connection; returns how many got it
    pub fn inject(&self, message: ChannelMessage) -> usize {
        self.deliver(|| Ok(message.clone()))
    }

    /// Deliver a frame that fails to decode
    pub fn inject_malformed(&self, details: &str) -> usize {
        self.deliver(|| {
            Err(ChannelError::Codec {
                details: details.to_string(),
            })
        })
    }

    /// Close every open connection from the server side
    pub fn hang_up(&self) {
        self.state.lock().senders.clear();
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Connections whose client side is still open
    pub fn open_connections(&self) -> usize {
        self.state
            .lock()
            .senders
            .iter()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    fn deliver<F: Fn() -> Delivery>(&self, make: F) -> usize {
        let mut state = self.state.lock();
        state.senders.retain(|sender| !sender.is_closed());
        state
            .senders
            .iter()
            .filter(|sender| sender.send(make()).is_ok())
            .count()
    }
}

#[async_trait]
impl ChannelConnector for ScriptedChannel {
    fn endpoint(&self) -> String {
        "scripted://channel".to_string()
    }

    async fn connect(&self) -> Result<Box<dyn ChannelConnection>, ChannelError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.refuse_reason {
            return Err(ChannelError::ConnectFailed {
                url: "scripted://channel".to_string(),
                details: reason.clone(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.connects += 1;
        state.senders.push(tx);
        Ok(Box::new(ScriptedConnection { receiver: rx }))
    }
}

struct ScriptedConnection {
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

#[async_trait]
impl ChannelConnection for ScriptedConnection {
    async fn next_message(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        match self.receiver.recv().await {
            Some(delivery) => delivery.map(Some),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.receiver.close();
    }
}
