use super::codec::*;
use super::*;
use crate::error::ChannelError;
use crate::events::{ClipcastEvent, EventBus, EventFilter, EventReceiver};
use crate::overlay::{DetectionEvent, MapOverlay, MarkerLayer};
use crate::upload::JobBoard;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

struct Harness {
    channel: RealtimeProgressChannel,
    scripted: ScriptedChannel,
    board: JobBoard,
    layer: MarkerLayer,
    event_bus: Arc<EventBus>,
}

fn create_harness() -> Harness {
    let scripted = ScriptedChannel::new();
    let board = JobBoard::new();
    let layer = MarkerLayer::new();
    let event_bus = Arc::new(EventBus::new(256));
    let overlay = Arc::new(MapOverlay::new(Arc::new(layer.clone()), None));
    let channel = RealtimeProgressChannel::new(
        Arc::new(scripted.clone()),
        board.clone(),
        overlay,
        Arc::clone(&event_bus),
    );
    Harness {
        channel,
        scripted,
        board,
        layer,
        event_bus,
    }
}

async fn next_event(receiver: &mut EventReceiver) -> ClipcastEvent {
    timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out waiting for event")
        .unwrap()
}

fn update(job_id: Option<&str>, progress: Option<f64>) -> ChannelMessage {
    ChannelMessage::ProcessingUpdate {
        job_id: job_id.map(str::to_string),
        progress,
    }
}

#[test]
fn test_decode_engine_packets() {
    let open = decode_engine(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
        .unwrap();
    match open {
        EnginePacket::Open(handshake) => {
            assert_eq!(handshake.sid, "abc");
            assert_eq!(handshake.ping_interval, 25000);
            assert_eq!(handshake.ping_timeout, 20000);
        }
        other => panic!("Expected open, got {:?}", other),
    }

    assert_eq!(decode_engine("2").unwrap(), EnginePacket::Ping(String::new()));
    assert_eq!(decode_engine("6").unwrap(), EnginePacket::Noop);
    assert_eq!(
        decode_engine("40").unwrap(),
        EnginePacket::Message("0".to_string())
    );
    assert!(decode_engine("").is_err());
    assert!(decode_engine("9").is_err());
}

#[test]
fn test_decode_socket_event() {
    let packet = decode_socket(r#"2["processingUpdate",{"progress":40}]"#).unwrap();
    assert_eq!(
        packet,
        SocketPacket::Event {
            namespace: "/".to_string(),
            ack: None,
            name: "processingUpdate".to_string(),
            args: vec![json!({"progress": 40})],
        }
    );

    let packet = decode_socket(r#"2/jobs,17["detectionData",{"objects":[]}]"#).unwrap();
    match packet {
        SocketPacket::Event {
            namespace,
            ack,
            name,
            ..
        } => {
            assert_eq!(namespace, "/jobs");
            assert_eq!(ack, Some(17));
            assert_eq!(name, "detectionData");
        }
        other => panic!("Expected event, got {:?}", other),
    }
}

#[test]
fn test_decode_socket_connect_and_errors() {
    assert_eq!(
        decode_socket(r#"0{"sid":"xyz"}"#).unwrap(),
        SocketPacket::Connect {
            namespace: "/".to_string(),
            data: Some(json!({"sid": "xyz"})),
        }
    );
    assert!(matches!(
        decode_socket(r#"4{"message":"nope"}"#).unwrap(),
        SocketPacket::ConnectError { .. }
    ));
    assert!(decode_socket("2{}").is_err());
    assert!(decode_socket("2[42]").is_err());
    assert!(decode_socket(r#"51-["upload",{"_placeholder":true,"num":0}]"#).is_err());
    assert!(decode_socket(r#"2["unterminated""#).is_err());
}

#[test]
fn test_encode_frames() {
    assert_eq!(encode_message(&SocketPacket::connect_root()), "40");
    assert_eq!(encode_engine(&EnginePacket::Pong(String::new())), "3");
    assert_eq!(
        encode_message(&SocketPacket::event("processingUpdate", json!({"progress": 50}))),
        r#"42["processingUpdate",{"progress":50}]"#
    );
    assert_eq!(
        encode_socket(&SocketPacket::Disconnect {
            namespace: "/jobs".to_string()
        }),
        "1/jobs,"
    );

    let packet = SocketPacket::Event {
        namespace: "/jobs".to_string(),
        ack: Some(3),
        name: "detectionData".to_string(),
        args: vec![json!({"objects": []})],
    };
    assert_eq!(decode_socket(&encode_socket(&packet)).unwrap(), packet);
}

#[test]
fn test_message_from_event() {
    let message =
        ChannelMessage::from_event(PROCESSING_UPDATE, &[json!({"progress": 0, "jobId": "j1"})])
            .unwrap()
            .unwrap();
    assert_eq!(message, update(Some("j1"), Some(0.0)));

    let message = ChannelMessage::from_event(PROCESSING_UPDATE, &[json!({"stage": "decode"})])
        .unwrap()
        .unwrap();
    assert_eq!(message, update(None, None));

    let message = ChannelMessage::from_event(PROCESSING_UPDATE, &[json!({"progress": "50"})])
        .unwrap()
        .unwrap();
    assert_eq!(message, update(None, None));

    let message = ChannelMessage::from_event(
        DETECTION_DATA,
        &[json!({"objects": [{"label": "car", "lat": 1.5, "lng": 2.5}]})],
    )
    .unwrap()
    .unwrap();
    assert_eq!(
        message,
        ChannelMessage::DetectionData {
            job_id: None,
            objects: vec![DetectionEvent::new("car", 1.5, 2.5)],
        }
    );

    assert!(ChannelMessage::from_event(DETECTION_DATA, &[json!({"items": []})]).is_err());
    assert!(ChannelMessage::from_event("chat", &[json!("hi")]).unwrap().is_none());
}

#[test]
fn test_message_payload_round_trips_through_wire_names() {
    let message = ChannelMessage::DetectionData {
        job_id: Some("j9".to_string()),
        objects: vec![DetectionEvent::new("bike", 3.0, 4.0)],
    };
    assert_eq!(
        message.payload(),
        json!({"jobId": "j9", "objects": [{"label": "bike", "lat": 3.0, "lng": 4.0}]})
    );
    assert_eq!(message.event_name(), DETECTION_DATA);
}

#[test]
fn test_websocket_url() {
    let url = websocket_url("http://localhost:5000", "/socket.io/").unwrap();
    assert_eq!(
        url.as_str(),
        "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
    );
    let url = websocket_url("https://media.example.com/base", "/socket.io/").unwrap();
    assert_eq!(url.scheme(), "wss");
    assert!(websocket_url("ftp://example.com", "/socket.io/").is_err());
    assert!(websocket_url("not a url", "/socket.io/").is_err());
}

#[tokio::test]
async fn test_processing_update_applies_to_active_job() {
    let mut harness = create_harness();
    let job = harness.board.register("clip.mp4", 100);
    let mut progress = harness.event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["processing_progress"]),
        "progress",
    );

    harness.channel.connect().await.unwrap();
    assert!(harness.channel.is_connected());

    harness.scripted.inject(update(None, Some(0.0)));
    harness.scripted.inject(update(None, None));
    harness.scripted.inject(update(None, Some(45.0)));

    match next_event(&mut progress).await {
        ClipcastEvent::ProcessingProgress { job_id, percent } => {
            assert_eq!(job_id, job.id.to_string());
            assert_eq!(percent, 0.0);
        }
        other => panic!("Unexpected event {:?}", other),
    }
    match next_event(&mut progress).await {
        ClipcastEvent::ProcessingProgress { percent, .. } => assert_eq!(percent, 45.0),
        other => panic!("Unexpected event {:?}", other),
    }
    assert_eq!(
        harness.board.get(&job.id).unwrap().processing_progress,
        Some(45.0)
    );
}

#[tokio::test]
async fn test_update_with_job_id_targets_that_job() {
    let mut harness = create_harness();
    let first = harness.board.register("a.mp4", 100);
    let second = harness.board.register("b.mp4", 100);
    let mut progress = harness.event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["processing_progress"]),
        "progress",
    );

    harness.channel.connect().await.unwrap();
    harness
        .scripted
        .inject(update(Some(first.id.as_str()), Some(80.0)));

    let event = next_event(&mut progress).await;
    assert_eq!(event.job_id(), Some(first.id.as_str()));
    assert_eq!(harness.board.get(&first.id).unwrap().processing_progress, Some(80.0));
    assert_eq!(harness.board.get(&second.id).unwrap().processing_progress, None);
}

#[tokio::test]
async fn test_detections_reach_overlay_in_order() {
    let mut harness = create_harness();
    let job = harness.board.register("clip.mp4", 100);
    let mut detections = harness.event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["detections_received"]),
        "detections",
    );

    harness.channel.connect().await.unwrap();
    harness.scripted.inject(ChannelMessage::DetectionData {
        job_id: None,
        objects: vec![DetectionEvent::new("car", 1.0, 1.0)],
    });
    harness.scripted.inject(ChannelMessage::DetectionData {
        job_id: None,
        objects: vec![
            DetectionEvent::new("person", 2.0, 2.0),
            DetectionEvent::new("dog", 3.0, 3.0),
        ],
    });

    let mut counts = Vec::new();
    for _ in 0..2 {
        match next_event(&mut detections).await {
            ClipcastEvent::DetectionsReceived { count, .. } => counts.push(count),
            other => panic!("Unexpected event {:?}", other),
        }
    }
    assert_eq!(counts, vec![1, 2]);

    let popups: Vec<String> = harness.layer.markers().into_iter().map(|m| m.popup).collect();
    assert_eq!(
        popups,
        vec!["Detected: car", "Detected: person", "Detected: dog"]
    );
    assert_eq!(harness.board.get(&job.id).unwrap().processing_progress, None);
}

#[tokio::test]
async fn test_malformed_message_is_dropped() {
    let mut harness = create_harness();
    let job = harness.board.register("clip.mp4", 100);
    let mut progress = harness.event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["processing_progress"]),
        "progress",
    );

    harness.channel.connect().await.unwrap();
    harness.scripted.inject_malformed("truncated frame");
    harness.scripted.inject(update(None, Some(10.0)));

    next_event(&mut progress).await;
    assert!(harness.channel.is_connected());
    assert_eq!(harness.board.get(&job.id).unwrap().processing_progress, Some(10.0));
}

#[tokio::test]
async fn test_disconnect_is_idempotent_and_stops_dispatch() {
    let mut harness = create_harness();
    let job = harness.board.register("clip.mp4", 100);
    let mut status = harness.event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["channel_status_changed"]),
        "status",
    );

    harness.channel.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut status).await,
        ClipcastEvent::ChannelStatusChanged { connected: true }
    ));

    assert!(harness.channel.disconnect());
    assert!(!harness.channel.disconnect());
    assert!(!harness.channel.is_connected());

    assert!(matches!(
        next_event(&mut status).await,
        ClipcastEvent::ChannelStatusChanged { connected: false }
    ));
    assert_eq!(harness.scripted.open_connections(), 0);
    assert_eq!(harness.scripted.inject(update(None, Some(90.0))), 0);
    assert_eq!(harness.board.get(&job.id).unwrap().processing_progress, None);
}

#[tokio::test]
async fn test_reconnect_after_server_hang_up() {
    let mut harness = create_harness();
    let mut status = harness.event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["channel_status_changed"]),
        "status",
    );

    harness.channel.connect().await.unwrap();
    next_event(&mut status).await;

    harness.scripted.hang_up();
    assert!(matches!(
        next_event(&mut status).await,
        ClipcastEvent::ChannelStatusChanged { connected: false }
    ));
    assert!(!harness.channel.is_connected());

    harness.channel.connect().await.unwrap();
    assert!(harness.channel.is_connected());
    assert_eq!(harness.scripted.connects(), 2);
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let mut harness = create_harness();
    harness.scripted.refuse("service offline");

    match harness.channel.connect().await {
        Err(ChannelError::ConnectFailed { details, .. }) => assert_eq!(details, "service offline"),
        other => panic!("Expected ConnectFailed, got {:?}", other),
    }
    assert!(!harness.channel.is_connected());
}

#[tokio::test]
async fn test_connect_twice_keeps_one_connection() {
    let mut harness = create_harness();
    harness.channel.connect().await.unwrap();
    harness.channel.connect().await.unwrap();
    assert_eq!(harness.scripted.connects(), 1);
    harness.channel.shutdown().await;
    assert_eq!(harness.scripted.open_connections(), 0);
}
