//! Ollama client. Streams `/api/chat`, which answers with line-delimited
//! JSON rather than SSE.

use crate::{status_error, transport_error};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::chat::{ContentPart, Message, MessageContent, StreamChunk};
use shared::error::ProviderError;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const BACKEND: &str = "ollama";

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
}

/// Ollama's multimodal shape: text in `content`, images as a sibling
/// array of base64 payloads (no MIME on the wire).
#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct StreamLine {
    message: Option<ReplyMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

fn to_wire(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| match &m.content {
            MessageContent::Text(text) => WireMessage {
                role: m.role.as_str(),
                content: text.clone(),
                images: None,
            },
            MessageContent::Parts(parts) => {
                let mut content = String::new();
                let mut images = Vec::new();
                for part in parts {
                    match part {
                        ContentPart::Text { text } => content.push_str(text),
                        ContentPart::Image { data, .. } => images.push(data.clone()),
                    }
                }
                WireMessage {
                    role: m.role.as_str(),
                    content,
                    images: (!images.is_empty()).then_some(images),
                }
            }
        })
        .collect()
}

pub struct OllamaClient {
    http: Client,
    base: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            base: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Stream one exchange, sending each response fragment over `tx` in
    /// arrival order. Returns once the daemon reports `done` or the
    /// connection ends.
    pub async fn stream(
        &self,
        messages: &[Message],
        tx: &UnboundedSender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/api/chat", self.base);
        let req = ChatRequest {
            model: &self.model,
            messages: to_wire(messages),
            stream: true,
        };
        let resp = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(BACKEND, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(BACKEND, status, &body));
        }

        let mut stream = resp.bytes_stream();
        let mut buf = String::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| transport_error(BACKEND, e))?;
            buf.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buf.find('\n') {
                let line: String = buf.drain(..pos + 1).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // Skip malformed lines; the daemon occasionally interleaves
                // keepalive noise.
                let Ok(parsed) = serde_json::from_str::<StreamLine>(line) else {
                    continue;
                };
                if let Some(msg) = parsed.message {
                    if !msg.content.is_empty() {
                        let _ = tx.send(StreamChunk::Text(msg.content));
                    }
                }
                if parsed.done {
                    let _ = tx.send(StreamChunk::Done);
                    return Ok(());
                }
            }
        }

        let _ = tx.send(StreamChunk::Done);
        Ok(())
    }
}
