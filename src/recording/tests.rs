use super::*;
use crate::error::{ClipcastError, RecordingError};
use crate::events::{ClipcastEvent, EventBus, EventFilter};
use crate::media::{FacingMode, MediaSessionManager, NullPreview, ScriptedCaptureProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn create_controller(provider: &ScriptedCaptureProvider) -> (RecordingController, Arc<EventBus>) {
    let event_bus = Arc::new(EventBus::new(256));
    let media = MediaSessionManager::new(
        Arc::new(provider.clone()),
        Arc::new(NullPreview),
        Arc::clone(&event_bus),
        FacingMode::Back,
    );
    let controller =
        RecordingController::new(media, Arc::clone(&event_bus), RecorderSettings::default());
    (controller, event_bus)
}

fn assert_invalid(result: crate::error::Result<impl std::fmt::Debug>, phase: RecordingPhase) {
    match result {
        Err(ClipcastError::Recording(RecordingError::InvalidTransition { phase: p, .. })) => {
            assert_eq!(p, phase)
        }
        other => panic!("Expected InvalidTransition, got {:?}", other),
    }
}

#[test]
fn test_transition_table() {
    use RecordingAction::*;
    use RecordingPhase::*;

    assert_eq!(transition(Idle, Start), Some(Recording));
    assert_eq!(transition(Recording, Pause), Some(Paused));
    assert_eq!(transition(Paused, Resume), Some(Recording));
    assert_eq!(transition(Recording, Stop), Some(Stopped));
    assert_eq!(transition(Paused, Stop), Some(Stopped));
    assert_eq!(transition(Idle, Stop), Some(Idle));

    assert_eq!(transition(Idle, Pause), None);
    assert_eq!(transition(Idle, Resume), None);
    assert_eq!(transition(Recording, Start), None);
    assert_eq!(transition(Recording, Resume), None);
    assert_eq!(transition(Paused, Pause), None);
    assert_eq!(transition(Paused, Start), None);
    assert_eq!(transition(Recording, SwitchCamera), None);
    assert_eq!(transition(Paused, SwitchCamera), None);
}

#[tokio::test(start_paused = true)]
async fn test_illegal_transitions_leave_state_unchanged() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    assert_invalid(controller.pause(), RecordingPhase::Idle);
    assert_invalid(controller.resume(), RecordingPhase::Idle);
    assert_eq!(controller.phase(), RecordingPhase::Idle);

    controller.start().await.unwrap();
    assert_invalid(controller.start().await, RecordingPhase::Recording);
    assert_invalid(controller.resume(), RecordingPhase::Recording);
    assert_eq!(controller.phase(), RecordingPhase::Recording);

    controller.pause().unwrap();
    assert_invalid(controller.pause(), RecordingPhase::Paused);
    assert_invalid(controller.start().await, RecordingPhase::Paused);
    assert_eq!(controller.phase(), RecordingPhase::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_replayed_sequences_follow_table() {
    use RecordingAction::*;

    let sequences: Vec<Vec<RecordingAction>> = vec![
        vec![Start, Pause, Resume, Stop],
        vec![Pause, Start, Start, Stop, Stop],
        vec![Start, Resume, Pause, Pause, Resume, Pause, Stop, Resume],
        vec![Stop, Start, Stop, Start, Pause, Stop],
    ];

    for sequence in sequences {
        let provider = ScriptedCaptureProvider::new();
        let (mut controller, _bus) = create_controller(&provider);
        let mut expected = RecordingPhase::Idle;

        for action in sequence {
            let outcome = match action {
                Start => controller.start().await.map(|_| ()),
                Pause => controller.pause(),
                Resume => controller.resume(),
                Stop => controller.stop().await.map(|_| ()),
                SwitchCamera => controller.switch_camera().await.map(|_| ()),
            };

            match transition(expected, action) {
                Some(RecordingPhase::Stopped) => {
                    assert!(outcome.is_ok());
                    expected = RecordingPhase::Idle;
                }
                Some(next) => {
                    assert!(outcome.is_ok(), "{:?} from {:?}", action, expected);
                    expected = next;
                }
                None => assert_invalid(outcome, expected),
            }
            assert_eq!(controller.phase(), expected);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_pause_excluded_from_elapsed_time() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    sleep(Duration::from_secs(3)).await;
    assert_eq!(controller.elapsed_seconds(), 3);

    controller.pause().unwrap();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(controller.elapsed_seconds(), 3);

    controller.resume().unwrap();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(controller.elapsed_seconds(), 5);

    let finished = controller.stop().await.unwrap().unwrap();
    assert_eq!(finished.elapsed_seconds, 5);
    assert_eq!(controller.elapsed_seconds(), 0);
    assert_eq!(controller.phase(), RecordingPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_increments_once_per_second() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    let mut observed = Vec::new();
    for _ in 0..4 {
        sleep(Duration::from_millis(500)).await;
        observed.push(controller.elapsed_seconds());
    }
    assert_eq!(observed, vec![0, 1, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_publishes_and_is_cleared() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, event_bus) = create_controller(&provider);
    let mut ticks = event_bus.subscribe_filtered(EventFilter::EventTypes(vec!["recording_tick"]), "ticks");

    controller.start().await.unwrap();
    assert!(controller.has_active_timer());
    sleep(Duration::from_millis(2500)).await;

    controller.pause().unwrap();
    assert!(!controller.has_active_timer());
    sleep(Duration::from_secs(3)).await;

    let seconds: Vec<u64> = ticks
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            ClipcastEvent::RecordingTick { elapsed_seconds } => Some(elapsed_seconds),
            _ => None,
        })
        .collect();
    assert_eq!(seconds, vec![1, 2]);

    controller.resume().unwrap();
    assert!(controller.has_active_timer());
    controller.stop().await.unwrap();
    assert!(!controller.has_active_timer());
}

#[tokio::test(start_paused = true)]
async fn test_chunks_accumulate_only_while_recording() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    let stream = provider.latest().unwrap();

    stream.push(b"one".to_vec());
    stream.push(b"two".to_vec());
    assert_eq!(controller.collect(), 2);

    stream.push(b"-three".to_vec());
    controller.pause().unwrap();
    stream.push(b"paused".to_vec());
    assert_eq!(controller.collect(), 0);

    controller.resume().unwrap();
    stream.push(b"-four".to_vec());

    let finished = controller.stop().await.unwrap().unwrap();
    assert_eq!(finished.chunk_count, 4);
    assert_eq!(finished.artifact.payload().as_ref(), b"onetwo-three-four");
    assert_eq!(finished.artifact.file_name(), "recorded-video.mp4");
    assert_eq!(finished.artifact.mime_type(), "video/mp4");
}

#[tokio::test(start_paused = true)]
async fn test_immediate_stop_yields_empty_artifact() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    let finished = controller.stop().await.unwrap().unwrap();

    assert!(finished.artifact.is_empty());
    assert_eq!(finished.chunk_count, 0);
    assert_eq!(finished.elapsed_seconds, 0);
}

#[tokio::test]
async fn test_stop_from_idle_is_noop() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    assert!(controller.stop().await.unwrap().is_none());
    assert_eq!(controller.phase(), RecordingPhase::Idle);
    assert_eq!(provider.acquisitions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_releases_capture_session() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, event_bus) = create_controller(&provider);
    let mut phases = event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["recording_phase_changed"]),
        "phases",
    );

    controller.start().await.unwrap();
    controller.stop().await.unwrap();

    assert!(provider.latest().unwrap().is_stopped());
    assert!(!controller.media().is_active());

    let transitions: Vec<(RecordingPhase, RecordingPhase)> = phases
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            ClipcastEvent::RecordingPhaseChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (RecordingPhase::Idle, RecordingPhase::Recording),
            (RecordingPhase::Recording, RecordingPhase::Stopped),
            (RecordingPhase::Stopped, RecordingPhase::Idle),
        ]
    );
}

#[tokio::test]
async fn test_start_without_device_is_not_ready() {
    let provider = ScriptedCaptureProvider::new();
    provider.deny("no camera present");
    let (mut controller, _bus) = create_controller(&provider);

    match controller.start().await {
        Err(ClipcastError::Recording(RecordingError::NotReady { reason })) => {
            assert!(reason.contains("no camera present"));
        }
        other => panic!("Expected NotReady, got {:?}", other),
    }
    assert_eq!(controller.phase(), RecordingPhase::Idle);
    assert!(!controller.has_active_timer());
}

#[tokio::test(start_paused = true)]
async fn test_switch_camera_refused_while_recording() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    assert_invalid(controller.switch_camera().await, RecordingPhase::Recording);
    controller.pause().unwrap();
    assert_invalid(controller.switch_camera().await, RecordingPhase::Paused);
    controller.stop().await.unwrap();

    assert_eq!(controller.switch_camera().await.unwrap(), FacingMode::Front);
    controller.start().await.unwrap();
    assert_eq!(provider.latest().unwrap().facing(), FacingMode::Front);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_releases_everything() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    provider.latest().unwrap().push(b"data".to_vec());
    controller.collect();

    controller.dispose();
    assert_eq!(controller.phase(), RecordingPhase::Idle);
    assert_eq!(controller.chunk_count(), 0);
    assert!(!controller.has_active_timer());
    assert_eq!(provider.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_capture_next_appends_while_recording() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    provider.latest().unwrap().push(b"frame".to_vec());
    assert_eq!(controller.capture_next().await, Some(1));
    assert_eq!(controller.chunk_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_keeps_data_flushed_by_the_device() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.start().await.unwrap();
    let stream = provider.latest().unwrap();
    stream.push(b"header-".to_vec());
    stream.push(b"body-".to_vec());
    stream.hold_until_stop(b"tail".to_vec());

    let finished = controller.stop().await.unwrap().unwrap();
    assert_eq!(finished.chunk_count, 3);
    assert_eq!(finished.artifact.payload().as_ref(), b"header-body-tail");
    assert!(stream.is_stopped());
    assert!(!controller.media().is_active());
}

#[tokio::test(start_paused = true)]
async fn test_start_reacquires_session_read_for_preview() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.media_mut().acquire(FacingMode::Back).await.unwrap();
    let preview = provider.latest().unwrap();
    preview.push(b"ftyp-moov-".to_vec());
    preview.push(b"preview-".to_vec());
    assert_eq!(controller.collect(), 0);

    controller.start().await.unwrap();
    assert_eq!(provider.acquisitions(), 2);
    assert!(preview.is_stopped());

    let stream = provider.latest().unwrap();
    stream.push(b"ftyp-moov-".to_vec());
    stream.push(b"recorded".to_vec());

    let finished = controller.stop().await.unwrap().unwrap();
    assert_eq!(finished.artifact.payload().as_ref(), b"ftyp-moov-recorded");
}

#[tokio::test(start_paused = true)]
async fn test_start_reuses_untouched_session() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.media_mut().acquire(FacingMode::Back).await.unwrap();
    controller.start().await.unwrap();
    assert_eq!(provider.acquisitions(), 1);

    let stream = provider.latest().unwrap();
    stream.push(b"ftyp-moov-".to_vec());
    stream.push(b"recorded".to_vec());

    let finished = controller.stop().await.unwrap().unwrap();
    assert_eq!(finished.artifact.payload().as_ref(), b"ftyp-moov-recorded");
}

#[tokio::test(start_paused = true)]
async fn test_start_reacquires_when_header_is_pending() {
    let provider = ScriptedCaptureProvider::new();
    let (mut controller, _bus) = create_controller(&provider);

    controller.media_mut().acquire(FacingMode::Back).await.unwrap();
    provider.latest().unwrap().push(b"ftyp-moov-early".to_vec());

    controller.start().await.unwrap();
    assert_eq!(provider.acquisitions(), 2);
    assert_eq!(controller.chunk_count(), 0);
}
