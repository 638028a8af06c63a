//! Mock input backend for unit and integration testing.
//!
//! # Why a mock backend?
//!
//! A real input backend makes OS API calls that:
//!
//! - Require a physical desktop environment to run.
//! - Actually move the cursor or press keys on the test machine.
//! - Cannot be observed directly from Rust test code.
//!
//! The `MockInputEmulator` replaces all OS calls with simple in-memory
//! recording.  Each injected action is pushed into a `Mutex<Vec<...>>` so
//! that test assertions can inspect exactly what was injected and in what
//! order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` at construction to make every method return an
//! `EmulationError::Platform`.  This lets you test error-handling paths in
//! the dispatcher and session without needing a broken OS.

use std::sync::Mutex;

use rmouse_core::protocol::commands::{MouseButton, Phase};

use crate::application::dispatch_input::{EmulationError, InputAction};

/// A mock backend that records all calls without performing OS API calls.
///
/// All records live in `Mutex<Vec<...>>` fields so tests can safely share
/// the backend across threads (e.g. when wrapping it in an `Arc`).
#[derive(Default)]
pub struct MockInputEmulator {
    /// Records each (dx, dy) delta passed to `move_relative`.
    pub moves: Mutex<Vec<(i32, i32)>>,
    /// Records each (x, y) position passed to `move_absolute`.
    pub abs_moves: Mutex<Vec<(i32, i32)>>,
    /// Records each (dx, dy) pair passed to `scroll`.
    pub scrolls: Mutex<Vec<(i32, i32)>>,
    /// Records (button, phase) pairs from `click`.
    pub clicks: Mutex<Vec<(MouseButton, Phase)>>,
    /// Records (code, phase) pairs from `key`.
    pub keys: Mutex<Vec<(String, Phase)>>,
    /// Records each string passed to `type_text`.
    pub typed: Mutex<Vec<String>>,
    /// When `true`, every method immediately returns an
    /// `EmulationError::Platform`.
    pub should_fail: bool,
}

impl MockInputEmulator {
    /// Creates a new mock with empty records and `should_fail = false`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputAction for MockInputEmulator {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.moves.lock().unwrap().push((dx, dy));
        Ok(())
    }

    fn move_absolute(&self, x: i32, y: i32) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.abs_moves.lock().unwrap().push((x, y));
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.scrolls.lock().unwrap().push((dx, dy));
        Ok(())
    }

    fn click(&self, button: MouseButton, phase: Phase) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.clicks.lock().unwrap().push((button, phase));
        Ok(())
    }

    fn key(&self, code: &str, phase: Phase) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.keys.lock().unwrap().push((code.to_string(), phase));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), EmulationError> {
        if self.should_fail {
            return Err(EmulationError::Platform("mock failure".into()));
        }
        self.typed.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
