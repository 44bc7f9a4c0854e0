//! Engine.IO v4 / Socket.IO v5 text framing
//!
//! Each WebSocket text frame is one engine packet: a single type digit
//! followed by its payload. Engine `message` packets carry a socket packet:
//! `<type>[<namespace>,][<ack id>][<json>]`.

use crate::error::ChannelError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Engine.IO protocol revision spoken on the wire
pub const ENGINE_PROTOCOL: u8 = 4;
pub const ROOT_NAMESPACE: &str = "/";

/// Handshake payload of an engine `open` packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    pub ping_interval: u64,
    /// Milliseconds to wait for a ping before considering the link dead
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// Event on the root namespace without acknowledgement
    pub fn event(name: &str, payload: Value) -> Self {
        SocketPacket::Event {
            namespace: ROOT_NAMESPACE.to_string(),
            ack: None,
            name: name.to_string(),
            args: vec![payload],
        }
    }

    pub fn connect_root() -> Self {
        SocketPacket::Connect {
            namespace: ROOT_NAMESPACE.to_string(),
            data: None,
        }
    }
}

fn codec_error(details: impl Into<String>) -> ChannelError {
    ChannelError::Codec {
        details: details.into(),
    }
}

pub fn decode_engine(frame: &str) -> Result<EnginePacket, ChannelError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or_else(|| codec_error("empty frame"))?;
    let payload = chars.as_str();

    match kind {
        '0' => serde_json::from_str(payload)
            .map(EnginePacket::Open)
            .map_err(|e| codec_error(format!("bad open handshake: {}", e))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(payload.to_string())),
        '3' => Ok(EnginePacket::Pong(payload.to_string())),
        '4' => Ok(EnginePacket::Message(payload.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(codec_error(format!("unknown engine packet type '{}'", other))),
    }
}

pub fn encode_engine(packet: &EnginePacket) -> String {
    match packet {
        EnginePacket::Open(handshake) => {
            // A struct of strings and integers always serializes
            format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
        }
        EnginePacket::Close => "1".to_string(),
        EnginePacket::Ping(data) => format!("2{}", data),
        EnginePacket::Pong(data) => format!("3{}", data),
        EnginePacket::Message(data) => format!("4{}", data),
        EnginePacket::Upgrade => "5".to_string(),
        EnginePacket::Noop => "6".to_string(),
    }
}

pub fn decode_socket(payload: &str) -> Result<SocketPacket, ChannelError> {
    let mut chars = payload.chars();
    let kind = chars.next().ok_or_else(|| codec_error("empty socket packet"))?;
    let rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(codec_error("binary packets are not supported"));
    }

    let (namespace, rest) = if rest.starts_with('/') {
        match rest.find(',') {
            Some(comma) => (&rest[..comma], &rest[comma + 1..]),
            None => (rest, ""),
        }
    } else {
        (ROOT_NAMESPACE, rest)
    };
    let namespace = namespace.to_string();

    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let ack = if digits > 0 {
        Some(
            rest[..digits]
                .parse::<u64>()
                .map_err(|e| codec_error(format!("bad ack id: {}", e)))?,
        )
    } else {
        None
    };
    let rest = &rest[digits..];

    let data: Option<Value> = if rest.trim().is_empty() {
        None
    } else {
        Some(
            serde_json::from_str(rest)
                .map_err(|e| codec_error(format!("bad packet data: {}", e)))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, data }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args = match data {
                Some(Value::Array(args)) => args,
                _ => return Err(codec_error("event data is not an array")),
            };
            if args.is_empty() {
                return Err(codec_error("event without a name"));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                _ => return Err(codec_error("event name is not a string")),
            };
            Ok(SocketPacket::Event {
                namespace,
                ack,
                name,
                args,
            })
        }
        '3' => {
            let ack = ack.ok_or_else(|| codec_error("ack without id"))?;
            let args = match data {
                Some(Value::Array(args)) => args,
                _ => return Err(codec_error("ack data is not an array")),
            };
            Ok(SocketPacket::Ack {
                namespace,
                ack,
                args,
            })
        }
        '4' => Ok(SocketPacket::ConnectError { namespace, data }),
        other => Err(codec_error(format!("unknown socket packet type '{}'", other))),
    }
}

pub fn encode_socket(packet: &SocketPacket) -> String {
    fn prefix(kind: char, namespace: &str) -> String {
        if namespace == ROOT_NAMESPACE {
            kind.to_string()
        } else {
            format!("{}{},", kind, namespace)
        }
    }

    match packet {
        SocketPacket::Connect { namespace, data } => {
            let mut out = prefix('0', namespace);
            if let Some(data) = data {
                out.push_str(&data.to_string());
            }
            out
        }
        SocketPacket::Disconnect { namespace } => prefix('1', namespace),
        SocketPacket::Event {
            namespace,
            ack,
            name,
            args,
        } => {
            let mut out = prefix('2', namespace);
            if let Some(ack) = ack {
                out.push_str(&ack.to_string());
            }
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            out.push_str(&Value::Array(items).to_string());
            out
        }
        SocketPacket::Ack {
            namespace,
            ack,
            args,
        } => {
            let mut out = prefix('3', namespace);
            out.push_str(&ack.to_string());
            out.push_str(&Value::Array(args.clone()).to_string());
            out
        }
        SocketPacket::ConnectError { namespace, data } => {
            let mut out = prefix('4', namespace);
            if let Some(data) = data {
                out.push_str(&data.to_string());
            }
            out
        }
    }
}

/// A socket packet wrapped in an engine `message` frame
pub fn encode_message(packet: &SocketPacket) -> String {
    encode_engine(&EnginePacket::Message(encode_socket(packet)))
}
