use crate::error::Result;
use crate::events::{ClipcastEvent, ControlAction, EventBus};
use crate::recording::RecordingAction;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Control(ControlAction),
    Quit,
}

/// Key bindings of the interactive recorder
pub fn command_for_key(code: KeyCode) -> Option<KeyCommand> {
    match code {
        KeyCode::Char(' ') => Some(KeyCommand::Control(ControlAction::TogglePause)),
        KeyCode::Char('r') => Some(KeyCommand::Control(ControlAction::Recording(
            RecordingAction::Start,
        ))),
        KeyCode::Char('s') => Some(KeyCommand::Control(ControlAction::Recording(
            RecordingAction::Stop,
        ))),
        KeyCode::Char('c') => Some(KeyCommand::Control(ControlAction::SwitchCamera)),
        KeyCode::Char('u') => Some(KeyCommand::Control(ControlAction::Upload)),
        KeyCode::Char('w') => Some(KeyCommand::Control(ControlAction::Save)),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyCommand::Quit),
        _ => None,
    }
}

/// Terminal keyboard control surface for the recorder
pub struct KeyboardInputHandler {
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!(
            "Keys: r start, SPACE pause/resume, s stop, c switch camera, u upload, w save, q quit"
        );

        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle key press events (not release)
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match command_for_key(key_event.code) {
                            Some(KeyCommand::Control(action)) => {
                                debug!("Key {:?} -> {:?}", key_event.code, action);
                                event_bus.publish(ClipcastEvent::ControlRequested { action });
                            }
                            Some(KeyCommand::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                event_bus.publish(ClipcastEvent::ShutdownRequested {
                                    timestamp: SystemTime::now(),
                                    reason: "User requested via keyboard".to_string(),
                                });
                                break;
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }

            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        debug!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(
            command_for_key(KeyCode::Char(' ')),
            Some(KeyCommand::Control(ControlAction::TogglePause))
        );
        assert_eq!(
            command_for_key(KeyCode::Char('s')),
            Some(KeyCommand::Control(ControlAction::Recording(
                RecordingAction::Stop
            )))
        );
        assert_eq!(
            command_for_key(KeyCode::Char('c')),
            Some(KeyCommand::Control(ControlAction::SwitchCamera))
        );
        assert_eq!(command_for_key(KeyCode::Esc), Some(KeyCommand::Quit));
        assert_eq!(command_for_key(KeyCode::Char('x')), None);
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let event_bus = Arc::new(EventBus::new(100));
        let handler = KeyboardInputHandler::new(event_bus);

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
