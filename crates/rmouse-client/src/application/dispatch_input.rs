//! CommandDispatcher: routes decoded protocol commands to OS input actions.
//!
//! This use case sits at the application layer and delegates to an
//! [`InputAction`] trait object for OS-level event injection.  The concrete
//! backend lives in the infrastructure layer.

use rmouse_core::protocol::commands::{Command, MouseButton, Phase};
use thiserror::Error;
use tracing::debug;

/// Error type for input injection operations.
#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("platform error: {0}")]
    Platform(String),
    #[error("unsupported key code: {0}")]
    UnsupportedKey(String),
}

/// Error type for command dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("input injection failed: {0}")]
    Emulation(#[from] EmulationError),
}

/// Platform-agnostic input action trait.
///
/// Each supported backend provides an implementation in the infrastructure
/// layer; tests use the recording mock.
pub trait InputAction: Send + Sync {
    /// Moves the cursor by a pixel delta from its current position.
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), EmulationError>;

    /// Moves the cursor to an absolute screen position.
    fn move_absolute(&self, x: i32, y: i32) -> Result<(), EmulationError>;

    /// Scrolls the wheel; positive `dy` is up, positive `dx` is right.
    fn scroll(&self, dx: i32, dy: i32) -> Result<(), EmulationError>;

    /// Presses, releases, or fully clicks a mouse button.
    fn click(&self, button: MouseButton, phase: Phase) -> Result<(), EmulationError>;

    /// Presses, releases, or fully taps a named key.
    fn key(&self, code: &str, phase: Phase) -> Result<(), EmulationError>;

    /// Types a literal string.
    fn type_text(&self, text: &str) -> Result<(), EmulationError>;
}

/// What the dispatcher did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// An input command was injected (or deliberately suppressed).
    Input,
    /// A control acknowledgement that needs no action at this layer.
    Control,
    /// The peer asked to close the session.
    CloseRequested,
}

/// The Command Dispatcher use case.
///
/// Receives decoded protocol commands and routes them to the input backend.
pub struct CommandDispatcher {
    actions: std::sync::Arc<dyn InputAction>,
}

impl CommandDispatcher {
    /// Creates a new dispatcher with the given input backend.
    pub fn new(actions: std::sync::Arc<dyn InputAction>) -> Self {
        Self { actions }
    }

    /// Routes one decoded command.
    ///
    /// Control acknowledgements (`Heartbeat`, `OpenAck`, `SeqAck`) are
    /// no-ops here; `Close` is reported to the caller, which owns the
    /// session lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the backend rejects the injection.
    pub fn handle(&self, cmd: &Command) -> Result<Handled, DispatchError> {
        match cmd {
            Command::Move { dx, dy } => {
                self.actions.move_relative(*dx, *dy)?;
                Ok(Handled::Input)
            }
            Command::MoveAbs { x, y } => {
                self.actions.move_absolute(*x, *y)?;
                Ok(Handled::Input)
            }
            Command::Scroll { dx, dy } => self.handle_scroll(*dx, *dy),
            Command::Click { button, phase } => {
                self.actions.click(*button, *phase)?;
                Ok(Handled::Input)
            }
            Command::Key { code, phase } => {
                self.actions.key(decompress_key_code(code), *phase)?;
                Ok(Handled::Input)
            }
            Command::TypeText(text) => {
                self.actions.type_text(text)?;
                Ok(Handled::Input)
            }
            Command::Heartbeat | Command::OpenAck | Command::SeqAck => Ok(Handled::Control),
            Command::Close => Ok(Handled::CloseRequested),
        }
    }

    /// Applies the scroll workarounds before injecting.
    ///
    /// Small negative horizontal magnitudes (−9..−1) trigger a platform
    /// bug in common automation backends (pyautogui issue 154: the scroll
    /// gets misinterpreted as a huge jump), so they are suppressed.
    /// A scroll left with no delta at all is dropped rather than injected.
    fn handle_scroll(&self, dx: i32, dy: i32) -> Result<Handled, DispatchError> {
        let dx = if (-9..=-1).contains(&dx) {
            debug!(dx, "suppressed small negative horizontal scroll");
            0
        } else {
            dx
        };
        if dx != 0 || dy != 0 {
            self.actions.scroll(dx, dy)?;
        }
        Ok(Handled::Input)
    }
}

/// Expands abbreviated key codes the sender compresses to save frame bytes.
fn decompress_key_code(code: &str) -> &str {
    match code {
        "bspace" => "backspace",
        other => other,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // ── Recording backend ─────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingActions {
        moves: Mutex<Vec<(i32, i32)>>,
        abs_moves: Mutex<Vec<(i32, i32)>>,
        scrolls: Mutex<Vec<(i32, i32)>>,
        clicks: Mutex<Vec<(MouseButton, Phase)>>,
        keys: Mutex<Vec<(String, Phase)>>,
        typed: Mutex<Vec<String>>,
        should_fail: bool,
    }

    impl InputAction for RecordingActions {
        fn move_relative(&self, dx: i32, dy: i32) -> Result<(), EmulationError> {
            if self.should_fail {
                return Err(EmulationError::Platform("injected failure".to_string()));
            }
            self.moves.lock().unwrap().push((dx, dy));
            Ok(())
        }

        fn move_absolute(&self, x: i32, y: i32) -> Result<(), EmulationError> {
            if self.should_fail {
                return Err(EmulationError::Platform("injected failure".to_string()));
            }
            self.abs_moves.lock().unwrap().push((x, y));
            Ok(())
        }

        fn scroll(&self, dx: i32, dy: i32) -> Result<(), EmulationError> {
            if self.should_fail {
                return Err(EmulationError::Platform("injected failure".to_string()));
            }
            self.scrolls.lock().unwrap().push((dx, dy));
            Ok(())
        }

        fn click(&self, button: MouseButton, phase: Phase) -> Result<(), EmulationError> {
            if self.should_fail {
                return Err(EmulationError::Platform("injected failure".to_string()));
            }
            self.clicks.lock().unwrap().push((button, phase));
            Ok(())
        }

        fn key(&self, code: &str, phase: Phase) -> Result<(), EmulationError> {
            if self.should_fail {
                return Err(EmulationError::Platform("injected failure".to_string()));
            }
            self.keys.lock().unwrap().push((code.to_string(), phase));
            Ok(())
        }

        fn type_text(&self, text: &str) -> Result<(), EmulationError> {
            if self.should_fail {
                return Err(EmulationError::Platform("injected failure".to_string()));
            }
            self.typed.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn make_dispatcher() -> (CommandDispatcher, Arc<RecordingActions>) {
        let actions = Arc::new(RecordingActions::default());
        let dispatcher = CommandDispatcher::new(Arc::clone(&actions) as Arc<dyn InputAction>);
        (dispatcher, actions)
    }

    // ── Moves ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_move_routes_to_move_relative() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act
        let handled = dispatcher.handle(&Command::Move { dx: -75, dy: 25 }).unwrap();

        // Assert
        assert_eq!(handled, Handled::Input);
        assert_eq!(*actions.moves.lock().unwrap(), vec![(-75, 25)]);
    }

    #[test]
    fn test_move_abs_routes_to_move_absolute() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act
        dispatcher.handle(&Command::MoveAbs { x: 400, y: 500 }).unwrap();

        // Assert
        assert_eq!(*actions.abs_moves.lock().unwrap(), vec![(400, 500)]);
    }

    // ── Scroll workarounds ────────────────────────────────────────────────────

    #[test]
    fn test_small_negative_horizontal_scroll_is_suppressed() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act – dx in the buggy −9..−1 range, no vertical component
        let handled = dispatcher.handle(&Command::Scroll { dx: -5, dy: 0 }).unwrap();

        // Assert – handled, but nothing was injected
        assert_eq!(handled, Handled::Input);
        assert!(actions.scrolls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_large_negative_horizontal_scroll_passes_through() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act
        dispatcher.handle(&Command::Scroll { dx: -15, dy: 0 }).unwrap();

        // Assert
        assert_eq!(*actions.scrolls.lock().unwrap(), vec![(-15, 0)]);
    }

    #[test]
    fn test_suppressed_horizontal_keeps_vertical_component() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act
        dispatcher.handle(&Command::Scroll { dx: -3, dy: 7 }).unwrap();

        // Assert – the vertical part still scrolls
        assert_eq!(*actions.scrolls.lock().unwrap(), vec![(0, 7)]);
    }

    #[test]
    fn test_zero_scroll_injects_nothing() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act
        dispatcher.handle(&Command::Scroll { dx: 0, dy: 0 }).unwrap();

        // Assert
        assert!(actions.scrolls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_positive_horizontal_scroll_passes_through() {
        let (dispatcher, actions) = make_dispatcher();
        dispatcher.handle(&Command::Scroll { dx: 5, dy: -2 }).unwrap();
        assert_eq!(*actions.scrolls.lock().unwrap(), vec![(5, -2)]);
    }

    // ── Clicks and keys ───────────────────────────────────────────────────────

    #[test]
    fn test_click_routes_button_and_phase() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act
        dispatcher
            .handle(&Command::Click {
                button: MouseButton::Right,
                phase: Phase::Down,
            })
            .unwrap();

        // Assert
        assert_eq!(
            *actions.clicks.lock().unwrap(),
            vec![(MouseButton::Right, Phase::Down)]
        );
    }

    #[test]
    fn test_bspace_is_decompressed_to_backspace() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act
        dispatcher
            .handle(&Command::Key {
                code: "bspace".to_string(),
                phase: Phase::Full,
            })
            .unwrap();

        // Assert
        assert_eq!(
            *actions.keys.lock().unwrap(),
            vec![("backspace".to_string(), Phase::Full)]
        );
    }

    #[test]
    fn test_other_key_codes_pass_through_unchanged() {
        let (dispatcher, actions) = make_dispatcher();
        dispatcher
            .handle(&Command::Key {
                code: "enter".to_string(),
                phase: Phase::Up,
            })
            .unwrap();
        assert_eq!(
            *actions.keys.lock().unwrap(),
            vec![("enter".to_string(), Phase::Up)]
        );
    }

    #[test]
    fn test_type_text_routes_literal_string() {
        let (dispatcher, actions) = make_dispatcher();
        dispatcher
            .handle(&Command::TypeText("hello".to_string()))
            .unwrap();
        assert_eq!(*actions.typed.lock().unwrap(), vec!["hello".to_string()]);
    }

    // ── Control commands ──────────────────────────────────────────────────────

    #[test]
    fn test_control_acks_are_no_ops() {
        // Arrange
        let (dispatcher, actions) = make_dispatcher();

        // Act / Assert
        for cmd in [Command::Heartbeat, Command::OpenAck, Command::SeqAck] {
            assert_eq!(dispatcher.handle(&cmd).unwrap(), Handled::Control);
        }
        assert!(actions.moves.lock().unwrap().is_empty());
        assert!(actions.keys.lock().unwrap().is_empty());
    }

    #[test]
    fn test_close_is_reported_to_the_caller() {
        let (dispatcher, _) = make_dispatcher();
        assert_eq!(
            dispatcher.handle(&Command::Close).unwrap(),
            Handled::CloseRequested
        );
    }

    // ── Error propagation ─────────────────────────────────────────────────────

    #[test]
    fn test_backend_failure_propagates_as_dispatch_error() {
        // Arrange
        let actions = Arc::new(RecordingActions {
            should_fail: true,
            ..Default::default()
        });
        let dispatcher = CommandDispatcher::new(actions as Arc<dyn InputAction>);

        // Act
        let result = dispatcher.handle(&Command::Move { dx: 1, dy: 1 });

        // Assert
        assert!(matches!(result, Err(DispatchError::Emulation(_))));
    }
}
