use super::codec::{
    decode_engine, decode_socket, encode_engine, encode_message, EnginePacket, SocketPacket,
    ENGINE_PROTOCOL,
};
use super::message::ChannelMessage;
use crate::config::ClipcastConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

/// Opens connections to the processing service's real-time endpoint
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Address connections are made to, for logging
    fn endpoint(&self) -> String;

    async fn connect(&self) -> Result<Box<dyn ChannelConnection>, ChannelError>;
}

/// One established real-time connection
#[async_trait]
pub trait ChannelConnection: Send {
    /// Next application message. `Ok(None)` once the server has closed the
    /// connection; `Err(ChannelError::Codec)` for a malformed message, after
    /// which the connection is still usable.
    async fn next_message(&mut self) -> Result<Option<ChannelMessage>, ChannelError>;

    async fn close(&mut self);
}

/// WebSocket URL of a Socket.IO endpoint below `base`
pub fn websocket_url(base: &str, socket_path: &str) -> Result<Url, ChannelError> {
    let invalid = |details: String| ChannelError::ConnectFailed {
        url: base.to_string(),
        details,
    };

    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to {}", scheme)))?;
    url.set_path(socket_path);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", &ENGINE_PROTOCOL.to_string())
        .append_pair("transport", "websocket");
    Ok(url)
}

/// Socket.IO client over a plain WebSocket transport
pub struct SocketIoConnector {
    url: Url,
    connect_timeout: Duration,
}

impl SocketIoConnector {
    pub fn new(base_url: &str, socket_path: &str, connect_timeout: Duration) -> Result<Self, ChannelError> {
        Ok(Self {
            url: websocket_url(base_url, socket_path)?,
            connect_timeout,
        })
    }

    pub fn from_config(config: &ClipcastConfig) -> Result<Self, ChannelError> {
        Self::new(
            &config.channel_url(),
            &config.channel.socket_path,
            config.connect_timeout(),
        )
    }
}

#[async_trait]
impl ChannelConnector for SocketIoConnector {
    fn endpoint(&self) -> String {
        self.url.to_string()
    }

    async fn connect(&self) -> Result<Box<dyn ChannelConnection>, ChannelError> {
        let failed = |details: String| ChannelError::ConnectFailed {
            url: self.url.to_string(),
            details,
        };

        debug!("Connecting real-time channel to {}", self.url);
        let (ws, _response) = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| failed(format!("timed out after {:?}", self.connect_timeout)))?
            .map_err(|e| failed(e.to_string()))?;

        let mut connection = SocketIoConnection { ws, sid: None };
        tokio::time::timeout(self.connect_timeout, connection.handshake())
            .await
            .map_err(|_| failed("handshake timed out".to_string()))??;

        info!(
            "Real-time channel connected to {} (sid {})",
            self.url,
            connection.sid.as_deref().unwrap_or("-")
        );
        Ok(Box::new(connection))
    }
}

struct SocketIoConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    sid: Option<String>,
}

impl SocketIoConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::Transport {
                details: e.to_string(),
            })
    }

    /// Next engine packet; `Ok(None)` when the socket closed
    async fn next_engine_packet(&mut self) -> Result<Option<EnginePacket>, ChannelError> {
        loop {
            let frame = match self.ws.next().await {
                None => return Ok(None),
                Some(Err(e)) => {
                    return Err(ChannelError::Transport {
                        details: e.to_string(),
                    })
                }
                Some(Ok(frame)) => frame,
            };

            match frame {
                Message::Text(text) => return decode_engine(&text).map(Some),
                Message::Close(_) => return Ok(None),
                Message::Binary(data) => {
                    warn!("Ignoring {} byte binary frame", data.len());
                }
                _ => {}
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), ChannelError> {
        loop {
            match self.next_engine_packet().await? {
                Some(EnginePacket::Open(handshake)) => {
                    debug!(
                        "Engine open: sid {}, ping every {}ms",
                        handshake.sid, handshake.ping_interval
                    );
                    self.sid = Some(handshake.sid);
                    break;
                }
                Some(_) => continue,
                None => return Err(ChannelError::Closed),
            }
        }

        self.send_text(encode_message(&SocketPacket::connect_root()))
            .await?;

        loop {
            match self.next_engine_packet().await? {
                Some(EnginePacket::Message(payload)) => match decode_socket(&payload)? {
                    SocketPacket::Connect { .. } => return Ok(()),
                    SocketPacket::ConnectError { data, .. } => {
                        return Err(ChannelError::Refused {
                            details: data.map(|d| d.to_string()).unwrap_or_default(),
                        })
                    }
                    other => debug!("Skipping {:?} before namespace connect", other),
                },
                Some(EnginePacket::Ping(data)) => {
                    self.send_text(encode_engine(&EnginePacket::Pong(data)))
                        .await?
                }
                Some(EnginePacket::Close) | None => return Err(ChannelError::Closed),
                Some(_) => continue,
            }
        }
    }
}

#[async_trait]
impl ChannelConnection for SocketIoConnection {
    async fn next_message(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        loop {
            let packet = match self.next_engine_packet().await? {
                Some(packet) => packet,
                None => return Ok(None),
            };

            match packet {
                EnginePacket::Ping(data) => {
                    self.send_text(encode_engine(&EnginePacket::Pong(data)))
                        .await?
                }
                EnginePacket::Close => return Ok(None),
                EnginePacket::Message(payload) => match decode_socket(&payload)? {
                    SocketPacket::Event { name, args, .. } => {
                        match ChannelMessage::from_event(&name, &args)? {
                            Some(message) => return Ok(Some(message)),
                            None => debug!("Ignoring unknown event '{}'", name),
                        }
                    }
                    SocketPacket::Disconnect { .. } => return Ok(None),
                    SocketPacket::ConnectError { data, .. } => {
                        return Err(ChannelError::Refused {
                            details: data.map(|d| d.to_string()).unwrap_or_default(),
                        })
                    }
                    SocketPacket::Connect { .. } | SocketPacket::Ack { .. } => {}
                },
                EnginePacket::Open(_)
                | EnginePacket::Pong(_)
                | EnginePacket::Upgrade
                | EnginePacket::Noop => {}
            }
        }
    }

    async fn close(&mut self) {
        let disconnect = encode_message(&SocketPacket::Disconnect {
            namespace: super::codec::ROOT_NAMESPACE.to_string(),
        });
        if let Err(e) = self.send_text(disconnect).await {
            debug!("Disconnect packet not delivered: {}", e);
        }
        if let Err(e) = self.ws.close(None).await {
            debug!("WebSocket close failed: {}", e);
        }
    }
}
