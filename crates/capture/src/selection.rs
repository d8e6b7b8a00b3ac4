//! Selected-text capture.
//!
//! The non-destructive path asks the platform's accessibility layer
//! through the injected [`SelectionInspector`]. When that yields nothing,
//! the fallback snapshots the clipboard, simulates a copy, reads the
//! result and restores the snapshot. The restore runs on every exit
//! path, including a failed read.

use crate::keys;
use shared::capture::Region;
use shared::contracts::SelectionInspector;
use shared::error::CaptureError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// How long the target application gets to service the copy command.
const COPY_SETTLE: Duration = Duration::from_millis(100);

/// Clipboard operations needed by the fallback path, kept behind a trait
/// so the restore-on-every-exit behavior is testable without a display
/// server.
pub trait ClipboardOps {
    fn read_text(&mut self) -> Result<String, CaptureError>;
    fn write_text(&mut self, text: &str) -> Result<(), CaptureError>;
}

pub struct SystemClipboard(arboard::Clipboard);

impl SystemClipboard {
    pub fn new() -> Result<Self, CaptureError> {
        arboard::Clipboard::new()
            .map(Self)
            .map_err(|e| CaptureError::Clipboard(e.to_string()))
    }
}

impl ClipboardOps for SystemClipboard {
    fn read_text(&mut self) -> Result<String, CaptureError> {
        // An empty or non-text clipboard reads as empty text here.
        Ok(self.0.get_text().unwrap_or_default())
    }

    fn write_text(&mut self, text: &str) -> Result<(), CaptureError> {
        self.0
            .set_text(text.to_string())
            .map_err(|e| CaptureError::Clipboard(e.to_string()))
    }
}

pub struct SelectionCapturer {
    inspector: Arc<dyn SelectionInspector>,
}

impl SelectionCapturer {
    pub fn new(inspector: Arc<dyn SelectionInspector>) -> Self {
        Self { inspector }
    }

    /// Capture the active selection. Empty text means nothing was
    /// selected; callers decide whether that is retryable.
    pub fn capture(&self) -> Result<(String, Option<Region>), CaptureError> {
        if let Some((text, region)) = self.inspector.selection() {
            if !text.trim().is_empty() {
                debug!("selection captured via accessibility inspector");
                return Ok((text, region));
            }
        }

        let mut clipboard = SystemClipboard::new()?;
        let text = copy_fallback(&mut clipboard, keys::send_copy, COPY_SETTLE)?;
        Ok((text, None))
    }
}

/// The destructive fallback. Returns empty text when the clipboard did
/// not change, meaning there was no selection to copy.
pub fn copy_fallback<C: ClipboardOps>(
    clipboard: &mut C,
    send_copy: impl FnOnce() -> Result<(), CaptureError>,
    settle: Duration,
) -> Result<String, CaptureError> {
    let original = clipboard.read_text().unwrap_or_default();

    let captured = (|| {
        // Clear first so an empty selection reads back as empty.
        clipboard.write_text("")?;
        send_copy()?;
        thread::sleep(settle);
        clipboard.read_text()
    })();

    if let Err(err) = clipboard.write_text(&original) {
        warn!("failed to restore clipboard after selection capture: {err}");
    }

    let captured = captured?;
    if captured == original {
        return Ok(String::new());
    }
    Ok(captured)
}
