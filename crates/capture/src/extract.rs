//! Text extraction for captured file paths.
//!
//! Plain-text formats are read directly, PDF and DOCX get a lightweight
//! structural scan (enough for typical generators; exotic files simply
//! fail as a recoverable extraction error), and images are OCR'd through
//! the external `tesseract` binary.

use flate2::read::{DeflateDecoder, ZlibDecoder};
use shared::error::CaptureError;
use std::io::Read;
use std::path::Path;
use std::process::Command;
use tracing::debug;

const PLAIN_TEXT_EXTS: &[&str] = &[
    "txt", "md", "py", "js", "rs", "html", "css", "json", "xml", "csv", "log",
];

const IMAGE_EXTS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("bmp", "image/bmp"),
    ("tiff", "image/tiff"),
    ("tif", "image/tiff"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
];

fn ext_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn extraction_err(path: &Path, detail: impl Into<String>) -> CaptureError {
    CaptureError::Extraction {
        path: path.display().to_string(),
        detail: detail.into(),
    }
}

pub fn is_image_path(path: &Path) -> bool {
    let ext = ext_of(path);
    IMAGE_EXTS.iter().any(|(e, _)| *e == ext)
}

pub fn image_mime(path: &Path) -> &'static str {
    let ext = ext_of(path);
    IMAGE_EXTS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or("image/png")
}

/// Raw bytes plus MIME for handing an image file to a multimodal model.
pub fn load_image(path: &Path) -> Result<(Vec<u8>, String), CaptureError> {
    if !is_image_path(path) {
        return Err(extraction_err(path, "not an image file"));
    }
    let bytes = std::fs::read(path).map_err(|e| extraction_err(path, e.to_string()))?;
    Ok((bytes, image_mime(path).to_string()))
}

/// Extract plain text from a file, dispatching on the extension.
pub fn extract_text(path: &Path) -> Result<String, CaptureError> {
    let ext = ext_of(path);
    if PLAIN_TEXT_EXTS.contains(&ext.as_str()) {
        read_plain(path)
    } else if ext == "pdf" {
        let bytes = std::fs::read(path).map_err(|e| extraction_err(path, e.to_string()))?;
        let text = pdf_text(&bytes);
        if text.trim().is_empty() {
            return Err(extraction_err(path, "no extractable text in PDF"));
        }
        Ok(text)
    } else if ext == "docx" {
        let bytes = std::fs::read(path).map_err(|e| extraction_err(path, e.to_string()))?;
        docx_text(&bytes).map_err(|e| extraction_err(path, e))
    } else if is_image_path(path) {
        ocr_image(path)
    } else {
        Err(extraction_err(path, format!("unsupported file type `.{ext}`")))
    }
}

fn read_plain(path: &Path) -> Result<String, CaptureError> {
    let bytes = std::fs::read(path).map_err(|e| extraction_err(path, e.to_string()))?;
    // Not all "text" files are valid UTF-8; degrade instead of failing.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ── PDF ──────────────────────────────────────────────────────────────

/// Best-effort text recovery: inflate FlateDecode streams, then collect
/// the string operands of Tj/TJ show-text operators. Enough for simple
/// generators; a full parser is out of scope here.
pub fn pdf_text(bytes: &[u8]) -> String {
    let mut pieces = Vec::new();
    for stream in pdf_streams(bytes) {
        let content = match inflate_zlib(stream) {
            Some(inflated) => inflated,
            None => stream.to_vec(),
        };
        let content = String::from_utf8_lossy(&content);
        collect_show_text(&content, &mut pieces);
    }
    pieces.join(" ")
}

/// Slices between `stream`/`endstream` keywords.
fn pdf_streams(bytes: &[u8]) -> Vec<&[u8]> {
    let mut found = Vec::new();
    let mut at = 0;
    while let Some(start) = find_sub(&bytes[at..], b"stream") {
        let mut begin = at + start + b"stream".len();
        // The keyword is followed by an EOL before the data.
        if bytes.get(begin) == Some(&b'\r') {
            begin += 1;
        }
        if bytes.get(begin) == Some(&b'\n') {
            begin += 1;
        }
        match find_sub(&bytes[begin..], b"endstream") {
            Some(len) => {
                found.push(&bytes[begin..begin + len]);
                at = begin + len + b"endstream".len();
            }
            None => break,
        }
    }
    found
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn inflate_zlib(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).ok()?;
    (!out.is_empty()).then_some(out)
}

/// Pull `(...)` operands that precede Tj or TJ operators.
fn collect_show_text(content: &str, out: &mut Vec<String>) {
    let mut chars = content.char_indices();
    while let Some((_, ch)) = chars.next() {
        if ch != '(' {
            continue;
        }
        let mut text = String::new();
        let mut escaped = false;
        let mut end = None;
        for (i, c) in chars.by_ref() {
            if escaped {
                match c {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => (),
                    other => text.push(other),
                }
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == ')' {
                end = Some(i);
                break;
            } else {
                text.push(c);
            }
        }
        let Some(end) = end else { break };
        // Only keep strings actually shown as text.
        let tail: String = content[end + 1..]
            .chars()
            .take(8)
            .collect();
        if tail.trim_start().starts_with("Tj")
            || tail.trim_start().starts_with("TJ")
            || tail.trim_start().starts_with(']')
        {
            if !text.trim().is_empty() {
                out.push(text);
            }
        }
    }
}

// ── DOCX ─────────────────────────────────────────────────────────────

/// DOCX is a zip archive; the document body lives in
/// `word/document.xml`. This walks the central directory, inflates that
/// one member and strips the markup.
pub fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let xml = zip_member(bytes, "word/document.xml")?;
    let xml = String::from_utf8_lossy(&xml).into_owned();
    Ok(strip_document_xml(&xml))
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes([
        *bytes.get(at)?,
        *bytes.get(at + 1)?,
        *bytes.get(at + 2)?,
        *bytes.get(at + 3)?,
    ]))
}

const EOCD_SIG: &[u8] = &[0x50, 0x4b, 0x05, 0x06];
const CENTRAL_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;

fn zip_member(bytes: &[u8], wanted: &str) -> Result<Vec<u8>, String> {
    // End-of-central-directory record sits near the end of the file.
    let tail_start = bytes.len().saturating_sub(66_000);
    let eocd = bytes[tail_start..]
        .windows(EOCD_SIG.len())
        .rposition(|w| w == EOCD_SIG)
        .map(|p| tail_start + p)
        .ok_or("not a zip archive")?;

    let entries = le_u16(bytes, eocd + 10).ok_or("truncated archive")?;
    let mut at = le_u32(bytes, eocd + 16).ok_or("truncated archive")? as usize;

    for _ in 0..entries {
        if le_u32(bytes, at) != Some(CENTRAL_SIG) {
            return Err("corrupt central directory".to_string());
        }
        let method = le_u16(bytes, at + 10).ok_or("truncated entry")?;
        let compressed = le_u32(bytes, at + 20).ok_or("truncated entry")? as usize;
        let name_len = le_u16(bytes, at + 28).ok_or("truncated entry")? as usize;
        let extra_len = le_u16(bytes, at + 30).ok_or("truncated entry")? as usize;
        let comment_len = le_u16(bytes, at + 32).ok_or("truncated entry")? as usize;
        let header_offset = le_u32(bytes, at + 42).ok_or("truncated entry")? as usize;
        let name = bytes
            .get(at + 46..at + 46 + name_len)
            .ok_or("truncated entry")?;

        if name == wanted.as_bytes() {
            if le_u32(bytes, header_offset) != Some(LOCAL_SIG) {
                return Err("corrupt local header".to_string());
            }
            let lh_name = le_u16(bytes, header_offset + 26).ok_or("truncated header")? as usize;
            let lh_extra = le_u16(bytes, header_offset + 28).ok_or("truncated header")? as usize;
            let data_start = header_offset + 30 + lh_name + lh_extra;
            let data = bytes
                .get(data_start..data_start + compressed)
                .ok_or("truncated member data")?;
            return match method {
                0 => Ok(data.to_vec()),
                8 => {
                    let mut out = Vec::new();
                    DeflateDecoder::new(data)
                        .read_to_end(&mut out)
                        .map_err(|e| format!("inflate failed: {e}"))?;
                    Ok(out)
                }
                other => Err(format!("unsupported compression method {other}")),
            };
        }
        at += 46 + name_len + extra_len + comment_len;
    }
    Err(format!("archive has no `{wanted}` member"))
}

/// WordprocessingML → plain text: paragraph ends become newlines, every
/// other tag is dropped, basic entities are decoded.
pub fn strip_document_xml(xml: &str) -> String {
    let with_breaks = xml.replace("</w:p>", "\n").replace("<w:br/>", "\n");
    let tag_re = regex::Regex::new(r"<[^>]+>").expect("static regex");
    let stripped = tag_re.replace_all(&with_breaks, "");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .trim()
        .to_string()
}

// ── OCR ──────────────────────────────────────────────────────────────

fn tesseract_cmd() -> String {
    std::env::var("TESSERACT_CMD").unwrap_or_else(|_| "tesseract".to_string())
}

/// OCR an image file through the external tesseract binary. Used for
/// image content when the active model cannot take the image directly.
pub fn ocr_image(path: &Path) -> Result<String, CaptureError> {
    let output = Command::new(tesseract_cmd())
        .arg(path)
        .arg("stdout")
        .output()
        .map_err(|e| {
            extraction_err(
                path,
                format!("tesseract not runnable ({e}); install it or set TESSERACT_CMD"),
            )
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(extraction_err(path, format!("tesseract failed: {}", stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// OCR in-memory image bytes by staging them in a temp file.
pub fn ocr_image_bytes(data: &[u8], mime: &str) -> Result<String, CaptureError> {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/bmp" => "bmp",
        _ => "png",
    };
    let path = std::env::temp_dir().join(format!("flick-ocr-{}.{ext}", std::process::id()));
    std::fs::write(&path, data).map_err(|e| extraction_err(&path, e.to_string()))?;
    let result = ocr_image(&path);
    if let Err(err) = std::fs::remove_file(&path) {
        debug!("could not remove OCR temp file: {err}");
    }
    result
}
