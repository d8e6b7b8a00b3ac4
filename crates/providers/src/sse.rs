//! Minimal incremental SSE reader for streaming provider responses.
//!
//! Both the OpenAI-compatible and Gemini streaming endpoints put the whole
//! payload in `data:` lines, so this parser only surfaces data payloads.

pub struct SseReader {
    buffer: String,
}

impl SseReader {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Feed raw bytes from the HTTP body. Returns the `data:` payloads of
    /// every event completed by this chunk, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        loop {
            // Events end at a blank line; tolerate CRLF-terminated streams.
            let Some((boundary, sep_len)) = find_event_boundary(&self.buffer) else {
                break;
            };
            let block: String = self.buffer.drain(..boundary + sep_len).collect();

            let mut data_lines = Vec::new();
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
                }
                // `event:`, `id:`, `retry:` and comment lines are ignored.
            }
            if !data_lines.is_empty() {
                payloads.push(data_lines.join("\n"));
            }
        }
        payloads
    }
}

impl Default for SseReader {
    fn default() -> Self {
        Self::new()
    }
}

fn find_event_boundary(buf: &str) -> Option<(usize, usize)> {
    let lf = buf.find("\n\n").map(|i| (i, 2));
    let crlf = buf.find("\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 < b.0 { a } else { b }),
        (one, two) => one.or(two),
    }
}
