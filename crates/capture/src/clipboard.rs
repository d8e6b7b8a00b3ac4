//! Clipboard content classification.
//!
//! Native format markers are inspected in priority order (file-drop
//! list, then bitmap, then unicode text) so a copied file is treated as a file
//! even though Explorer also puts its name on the clipboard as text.
//! When native inspection is unavailable the portable path falls back to
//! whatever arboard can read.

use shared::capture::CaptureResult;
use std::io::Cursor;
use tracing::debug;

pub fn classify_clipboard() -> CaptureResult {
    #[cfg(windows)]
    {
        if let Some(result) = win::classify() {
            return result;
        }
    }
    portable_classify()
}

/// arboard-only classification: image, then non-empty text.
fn portable_classify() -> CaptureResult {
    match read_image() {
        CaptureResult::Empty => read_text(),
        image => image,
    }
}

fn read_image() -> CaptureResult {
    let Ok(mut clipboard) = arboard::Clipboard::new() else {
        return CaptureResult::Empty;
    };
    match clipboard.get_image().ok().and_then(|i| encode_png(&i)) {
        Some(data) => CaptureResult::Image {
            data,
            mime: "image/png".to_string(),
        },
        None => CaptureResult::Empty,
    }
}

fn read_text() -> CaptureResult {
    let Ok(mut clipboard) = arboard::Clipboard::new() else {
        return CaptureResult::Empty;
    };
    match clipboard.get_text() {
        Ok(text) if !text.trim().is_empty() => CaptureResult::Text(text),
        _ => CaptureResult::Empty,
    }
}

/// Clipboard bitmaps arrive as raw RGBA; providers want a real encoding,
/// so re-encode as PNG.
fn encode_png(image: &arboard::ImageData<'_>) -> Option<Vec<u8>> {
    let rgba = image::RgbaImage::from_raw(
        image.width as u32,
        image.height as u32,
        image.bytes.clone().into_owned(),
    )?;
    let mut out = Vec::new();
    if let Err(err) =
        image::DynamicImage::ImageRgba8(rgba).write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
    {
        debug!("failed to encode clipboard bitmap: {err}");
        return None;
    }
    Some(out)
}

#[cfg(windows)]
mod win {
    use super::*;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;
    use windows::Win32::System::DataExchange::{
        CloseClipboard, GetClipboardData, IsClipboardFormatAvailable, OpenClipboard,
    };
    use windows::Win32::UI::Shell::{DragQueryFileW, HDROP};

    // Standard clipboard format ids.
    const CF_BITMAP: u32 = 2;
    const CF_UNICODETEXT: u32 = 13;
    const CF_HDROP: u32 = 15;

    /// Inspect native formats in priority order. `None` means the
    /// clipboard could not be opened and the portable path should decide.
    pub(super) fn classify() -> Option<CaptureResult> {
        let (file, has_bitmap, has_text) = unsafe {
            // Clipboard access races with other processes; retry briefly.
            let mut opened = false;
            for _ in 0..5 {
                if OpenClipboard(None).is_ok() {
                    opened = true;
                    break;
                }
                thread::sleep(Duration::from_millis(50));
            }
            if !opened {
                return None;
            }

            let file = if IsClipboardFormatAvailable(CF_HDROP).is_ok() {
                first_drop_file()
            } else {
                None
            };
            let has_bitmap = IsClipboardFormatAvailable(CF_BITMAP).is_ok();
            let has_text = IsClipboardFormatAvailable(CF_UNICODETEXT).is_ok();
            let _ = CloseClipboard();
            (file, has_bitmap, has_text)
        };

        if let Some(path) = file {
            return Some(CaptureResult::FilePath(path));
        }
        // The clipboard is closed again before arboard re-opens it below.
        if has_bitmap {
            return Some(read_image());
        }
        if has_text {
            return Some(read_text());
        }
        Some(CaptureResult::Empty)
    }

    unsafe fn first_drop_file() -> Option<PathBuf> {
        let handle = GetClipboardData(CF_HDROP).ok()?;
        if handle.0.is_null() {
            return None;
        }
        let hdrop = HDROP(handle.0);

        let count = DragQueryFileW(hdrop, u32::MAX, None);
        if count == 0 {
            return None;
        }
        let needed = DragQueryFileW(hdrop, 0, None);
        if needed == 0 {
            return None;
        }
        let mut buf = vec![0u16; needed as usize + 1];
        let copied = DragQueryFileW(hdrop, 0, Some(&mut buf));
        if copied == 0 {
            return None;
        }
        Some(PathBuf::from(OsString::from_wide(&buf[..copied as usize])))
    }
}
