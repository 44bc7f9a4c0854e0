use super::*;
use crate::error::MediaError;
use crate::events::{ClipcastEvent, EventBus, EventFilter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingPreview {
    attached: Mutex<Vec<String>>,
    frames: Mutex<usize>,
    detached: Mutex<usize>,
}

impl PreviewSink for RecordingPreview {
    fn attach(&self, stream_id: &str, _facing: FacingMode) {
        self.attached.lock().push(stream_id.to_string());
    }

    fn present(&self, _chunk: &MediaChunk) {
        *self.frames.lock() += 1;
    }

    fn detach(&self) {
        *self.detached.lock() += 1;
    }
}

fn create_manager(
    provider: &ScriptedCaptureProvider,
) -> (MediaSessionManager, Arc<RecordingPreview>, Arc<EventBus>) {
    let preview = Arc::new(RecordingPreview::default());
    let event_bus = Arc::new(EventBus::new(32));
    let manager = MediaSessionManager::new(
        Arc::new(provider.clone()),
        preview.clone(),
        Arc::clone(&event_bus),
        FacingMode::Back,
    );
    (manager, preview, event_bus)
}

#[tokio::test]
async fn test_acquire_attaches_preview_and_publishes() {
    let provider = ScriptedCaptureProvider::new();
    let (mut manager, preview, event_bus) = create_manager(&provider);
    let mut events = event_bus.subscribe();

    let stream_id = manager
        .acquire(FacingMode::Front)
        .await
        .unwrap()
        .stream_id()
        .to_string();

    assert!(manager.is_active());
    assert_eq!(manager.facing(), FacingMode::Front);
    assert_eq!(preview.attached.lock().as_slice(), &[stream_id.clone()]);

    match events.try_recv().unwrap() {
        ClipcastEvent::CaptureAcquired {
            stream_id: id,
            facing,
            ..
        } => {
            assert_eq!(id, stream_id);
            assert_eq!(facing, FacingMode::Front);
        }
        other => panic!("Unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_reacquire_releases_prior_tracks() {
    let provider = ScriptedCaptureProvider::new();
    let (mut manager, _preview, _bus) = create_manager(&provider);

    manager.acquire(FacingMode::Back).await.unwrap();
    let first = provider.latest().unwrap();

    manager.acquire(FacingMode::Back).await.unwrap();
    let second = provider.latest().unwrap();

    assert!(first.is_stopped());
    assert!(!second.is_stopped());
    assert_eq!(provider.live_streams(), 1);
}

#[tokio::test]
async fn test_acquire_denied_leaves_no_session() {
    let provider = ScriptedCaptureProvider::new();
    provider.deny("permission denied");
    let (mut manager, preview, _bus) = create_manager(&provider);

    let err = manager.acquire(FacingMode::Back).await.unwrap_err();
    assert!(matches!(err, MediaError::DeviceUnavailable { .. }));
    assert!(!manager.is_active());
    assert!(manager.session().is_none());
    assert!(preview.attached.lock().is_empty());
    assert_eq!(provider.live_streams(), 0);
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let provider = ScriptedCaptureProvider::new();
    let (mut manager, preview, _bus) = create_manager(&provider);

    assert!(!manager.release());

    manager.acquire(FacingMode::Back).await.unwrap();
    assert!(manager.release());
    assert!(!manager.release());

    assert!(provider.latest().unwrap().is_stopped());
    assert_eq!(*preview.detached.lock(), 1);
}

#[tokio::test]
async fn test_switch_facing_without_session_only_changes_preference() {
    let provider = ScriptedCaptureProvider::new();
    let (mut manager, _preview, _bus) = create_manager(&provider);

    let facing = manager.switch_facing().await.unwrap();
    assert_eq!(facing, FacingMode::Front);
    assert_eq!(provider.acquisitions(), 0);
}

#[tokio::test]
async fn test_switch_facing_reacquires_active_session() {
    let provider = ScriptedCaptureProvider::new();
    let (mut manager, _preview, _bus) = create_manager(&provider);

    manager.acquire(FacingMode::Back).await.unwrap();
    let back = provider.latest().unwrap();

    manager.switch_facing().await.unwrap();
    let front = provider.latest().unwrap();

    assert!(back.is_stopped());
    assert_eq!(front.facing(), FacingMode::Front);
    assert_eq!(manager.session().unwrap().facing(), FacingMode::Front);
}

#[tokio::test]
async fn test_poll_chunks_preserves_order_and_feeds_preview() {
    let provider = ScriptedCaptureProvider::new();
    let (mut manager, preview, _bus) = create_manager(&provider);
    manager.acquire(FacingMode::Back).await.unwrap();

    let handle = provider.latest().unwrap();
    assert!(handle.push(vec![1u8]));
    assert!(handle.push(vec![2u8, 2]));
    assert!(handle.push(vec![3u8, 3, 3]));

    let chunks = manager.poll_chunks();
    let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(chunks[2].len(), 3);
    assert_eq!(*preview.frames.lock(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_synthetic_provider_stops_on_release() {
    let provider = SyntheticCaptureProvider::new(Duration::from_millis(100), 64);
    let mut stream = provider
        .acquire(StreamRequest::camera_and_microphone(FacingMode::Back))
        .await
        .unwrap();

    let first = stream.next_chunk().await.unwrap();
    assert_eq!(first.sequence, 0);
    assert_eq!(&first.data[4..8], b"ftyp");

    provider.release(&stream);
    assert!(!stream.is_live());

    tokio::time::sleep(Duration::from_millis(500)).await;
    let mut drained = 0;
    while stream.try_next_chunk().is_some() {
        drained += 1;
    }
    assert!(drained <= 1);
}

#[test]
fn test_facing_mode_parsing() {
    assert_eq!("user".parse::<FacingMode>().unwrap(), FacingMode::Front);
    assert_eq!("environment".parse::<FacingMode>().unwrap(), FacingMode::Back);
    assert_eq!("BACK".parse::<FacingMode>().unwrap(), FacingMode::Back);
    assert!("sideways".parse::<FacingMode>().is_err());
    assert_eq!(FacingMode::Front.toggled(), FacingMode::Back);
}

#[tokio::test(start_paused = true)]
async fn test_finish_collects_flushed_data_then_releases() {
    let provider = ScriptedCaptureProvider::new();
    let (mut manager, preview, event_bus) = create_manager(&provider);
    let mut released =
        event_bus.subscribe_filtered(EventFilter::EventTypes(vec!["capture_released"]), "released");
    manager.acquire(FacingMode::Back).await.unwrap();

    let handle = provider.latest().unwrap();
    handle.push(vec![1u8]);
    handle.hold_until_stop(vec![2u8, 2]);

    let chunks = manager.finish().await;
    let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![0, 1]);
    assert_eq!(chunks[1].len(), 2);
    assert_eq!(*preview.frames.lock(), 2);
    assert_eq!(*preview.detached.lock(), 1);
    assert!(handle.is_stopped());
    assert!(manager.session().is_none());
    assert_eq!(released.drain().len(), 1);

    assert!(manager.finish().await.is_empty());
}

/// Backend that keeps its stream open after the tracks stop
#[derive(Default)]
struct StuckProvider {
    senders: Mutex<Vec<tokio::sync::mpsc::Sender<MediaChunk>>>,
}

#[async_trait::async_trait]
impl MediaCaptureProvider for StuckProvider {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn acquire(&self, request: StreamRequest) -> Result<CaptureStream, MediaError> {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.try_send(MediaChunk::new(0, bytes::Bytes::from_static(b"held")))
            .unwrap();
        self.senders.lock().push(tx);
        Ok(CaptureStream::new(
            request.facing,
            rx,
            tokio_util::sync::CancellationToken::new(),
        ))
    }
}

#[tokio::test(start_paused = true)]
async fn test_finish_gives_up_on_stream_that_never_closes() {
    let event_bus = Arc::new(EventBus::new(8));
    let mut manager = MediaSessionManager::new(
        Arc::new(StuckProvider::default()),
        Arc::new(NullPreview),
        event_bus,
        FacingMode::Back,
    );
    manager.acquire(FacingMode::Back).await.unwrap();

    let chunks = manager.finish().await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].data.as_ref(), b"held");
    assert!(!manager.is_active());
}

#[tokio::test]
async fn test_chunk_feed_drops_instead_of_waiting() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(2);
    let feed = ChunkFeed::new(tx);

    assert!(feed.offer(bytes::Bytes::from_static(b"a")));
    assert!(feed.offer(bytes::Bytes::from_static(b"b")));
    assert!(feed.offer(bytes::Bytes::from_static(b"c")));
    assert_eq!(feed.dropped(), 1);

    assert_eq!(rx.recv().await.unwrap().sequence, 0);
    assert_eq!(rx.recv().await.unwrap().sequence, 1);
    assert!(feed.offer(bytes::Bytes::from_static(b"d")));
    let next = rx.recv().await.unwrap();
    assert_eq!(next.sequence, 3);
    assert_eq!(next.data.as_ref(), b"d");

    drop(rx);
    assert!(!feed.offer(bytes::Bytes::from_static(b"e")));
    assert_eq!(feed.dropped(), 1);
}
