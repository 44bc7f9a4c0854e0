use crate::channel::codec::{
    decode_engine, decode_socket, encode_engine, encode_message, EnginePacket, OpenHandshake,
    SocketPacket, ROOT_NAMESPACE,
};
use crate::channel::ChannelMessage;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::server::ServerState;

const PING_INTERVAL_MS: u64 = 25_000;
const PING_TIMEOUT_MS: u64 = 20_000;

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Accept a multipart video upload and start its processing run
pub async fn upload_handler(State(state): State<ServerState>, mut multipart: Multipart) -> Response {
    let mut job_id: Option<String> = None;
    let mut video: Option<(String, usize)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Rejecting malformed upload: {}", e);
                return bad_request("Malformed multipart body");
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == "jobId" {
            match field.text().await {
                Ok(text) => job_id = Some(text),
                Err(e) => return bad_request(&format!("Unreadable jobId: {}", e)),
            }
        } else if name == state.config.upload_field {
            let file_name = field.file_name().unwrap_or("upload.mp4").to_string();
            match field.bytes().await {
                Ok(bytes) => video = Some((file_name, bytes.len())),
                Err(e) => return bad_request(&format!("Unreadable video: {}", e)),
            }
        } else {
            debug!("Ignoring form field '{}'", name);
        }
    }

    let Some((file_name, size)) = video else {
        return bad_request("No video file provided");
    };
    let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let processed = format!("/processed/{}", file_name);

    let count = state.uploads.fetch_add(1, Ordering::SeqCst) + 1;
    info!(
        "Received upload #{} '{}' ({} bytes) as job {}",
        count, file_name, size, job_id
    );

    tokio::spawn(run_processing(state, job_id.clone()));

    Json(json!({ "processedVideo": processed, "jobId": job_id })).into_response()
}

/// Emit progress steps then the detections for one job
async fn run_processing(state: ServerState, job_id: String) {
    let step = state.config.step_percent.max(1) as usize;

    for progress in (0..=100u32).step_by(step) {
        tokio::time::sleep(state.config.step_interval).await;
        notify(
            &state,
            ChannelMessage::ProcessingUpdate {
                job_id: Some(job_id.clone()),
                progress: Some(progress as f64),
            },
        );
    }

    notify(
        &state,
        ChannelMessage::DetectionData {
            job_id: Some(job_id.clone()),
            objects: state.config.detections.clone(),
        },
    );
    debug!("Processing run for job {} finished", job_id);
}

fn notify(state: &ServerState, message: ChannelMessage) {
    if state.notices.send(message).is_err() {
        debug!("No sockets connected for processing notice");
    }
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Engine.IO websocket endpoint
pub async fn socket_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn send_text(socket: &mut WebSocket, text: String) -> bool {
    socket.send(Message::Text(text)).await.is_ok()
}

async fn serve_socket(mut socket: WebSocket, state: ServerState) {
    let sid = Uuid::new_v4().simple().to_string();
    let mut notices = state.notices.subscribe();
    let mut joined = false;

    let handshake = OpenHandshake {
        sid: sid.clone(),
        upgrades: Vec::new(),
        ping_interval: PING_INTERVAL_MS,
        ping_timeout: PING_TIMEOUT_MS,
        max_payload: Some(state.config.max_upload_bytes as u64),
    };
    if !send_text(&mut socket, encode_engine(&EnginePacket::Open(handshake))).await {
        return;
    }
    info!("Socket {} opened", sid);

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Socket {} read failed: {}", sid, e);
                        break;
                    }
                };

                match decode_engine(&text) {
                    Ok(EnginePacket::Message(payload)) => match decode_socket(&payload) {
                        Ok(SocketPacket::Connect { .. }) => {
                            joined = true;
                            let ack = SocketPacket::Connect {
                                namespace: ROOT_NAMESPACE.to_string(),
                                data: Some(json!({ "sid": sid })),
                            };
                            if !send_text(&mut socket, encode_message(&ack)).await {
                                break;
                            }
                        }
                        Ok(SocketPacket::Disconnect { .. }) => break,
                        Ok(other) => debug!("Socket {} sent {:?}", sid, other),
                        Err(e) => warn!("Socket {} sent a bad packet: {}", sid, e),
                    },
                    Ok(EnginePacket::Ping(data)) => {
                        if !send_text(&mut socket, encode_engine(&EnginePacket::Pong(data))).await {
                            break;
                        }
                    }
                    Ok(EnginePacket::Close) => break,
                    Ok(_) => {}
                    Err(e) => warn!("Socket {} sent a bad frame: {}", sid, e),
                }
            }
            notice = notices.recv() => match notice {
                Ok(message) if joined => {
                    let packet = SocketPacket::event(message.event_name(), message.payload());
                    if !send_text(&mut socket, encode_message(&packet)).await {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Socket {} skipped {} processing notices", sid, skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    info!("Socket {} closed", sid);
}
