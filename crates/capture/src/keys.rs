//! Simulated keystrokes for the destructive capture fallback.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use shared::error::CaptureError;
use std::thread;
use std::time::Duration;

fn input_err(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Input(e.to_string())
}

/// Simulate Ctrl+C in the focused application. The trigger hotkey's own
/// modifiers are released first so they cannot combine with the copy
/// chord.
pub fn send_copy() -> Result<(), CaptureError> {
    let mut enigo = Enigo::new(&Settings::default()).map_err(input_err)?;

    for key in [Key::Alt, Key::Shift, Key::Control] {
        let _ = enigo.key(key, Direction::Release);
    }
    thread::sleep(Duration::from_millis(30));

    enigo.key(Key::Control, Direction::Press).map_err(input_err)?;
    let result = enigo.key(Key::Unicode('c'), Direction::Click).map_err(input_err);
    let _ = enigo.key(Key::Control, Direction::Release);
    result
}
