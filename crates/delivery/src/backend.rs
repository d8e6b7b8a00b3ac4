//! The OS side of direct-paste delivery, behind a trait so the paste
//! loop can be exercised in tests without a clipboard or input device.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use shared::error::DeliveryError;

pub trait PasteBackend: Send {
    /// Current clipboard text, if any. Taken once at session start for
    /// the final restore.
    fn clipboard_text(&mut self) -> Option<String>;

    fn set_clipboard_text(&mut self, text: &str) -> Result<(), DeliveryError>;

    /// Simulate the paste chord in the focused application.
    fn send_paste(&mut self) -> Result<(), DeliveryError>;

    /// Release every modifier we may have touched, so a failed paste can
    /// never leave a stuck key behind.
    fn release_modifiers(&mut self);
}

fn input_err(e: impl std::fmt::Display) -> DeliveryError {
    DeliveryError::Input(e.to_string())
}

pub struct SystemBackend {
    clipboard: arboard::Clipboard,
    enigo: Enigo,
}

impl SystemBackend {
    pub fn new() -> Result<Self, DeliveryError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| DeliveryError::Clipboard(e.to_string()))?;
        let enigo = Enigo::new(&Settings::default()).map_err(input_err)?;
        Ok(Self { clipboard, enigo })
    }
}

impl PasteBackend for SystemBackend {
    fn clipboard_text(&mut self) -> Option<String> {
        self.clipboard.get_text().ok()
    }

    fn set_clipboard_text(&mut self, text: &str) -> Result<(), DeliveryError> {
        self.clipboard
            .set_text(text.to_string())
            .map_err(|e| DeliveryError::Clipboard(e.to_string()))
    }

    fn send_paste(&mut self) -> Result<(), DeliveryError> {
        self.enigo
            .key(Key::Control, Direction::Press)
            .map_err(input_err)?;
        let result = self
            .enigo
            .key(Key::Unicode('v'), Direction::Click)
            .map_err(input_err);
        let _ = self.enigo.key(Key::Control, Direction::Release);
        result
    }

    fn release_modifiers(&mut self) {
        for key in [Key::Control, Key::Shift, Key::Alt] {
            let _ = self.enigo.key(key, Direction::Release);
        }
    }
}
