//! OpenAI-compatible chat completions client.
//!
//! Also serves LM Studio, whose local daemon speaks the same protocol on
//! a different base URL and without credentials.

use crate::sse::SseReader;
use crate::{status_error, transport_error};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::chat::{ContentPart, Message, MessageContent, StreamChunk};
use shared::error::ProviderError;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Text-only messages stay plain strings; multimodal content becomes the
/// part-array form with images as `data:` URIs.
fn to_wire_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| match &m.content {
            MessageContent::Text(text) => serde_json::json!({
                "role": m.role.as_str(),
                "content": text,
            }),
            MessageContent::Parts(parts) => {
                let wire_parts: Vec<serde_json::Value> = parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => serde_json::json!({
                            "type": "text",
                            "text": text,
                        }),
                        ContentPart::Image { data, mime } => serde_json::json!({
                            "type": "image_url",
                            "image_url": { "url": format!("data:{mime};base64,{data}") },
                        }),
                    })
                    .collect();
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": wire_parts,
                })
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    backend: &'static str,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiClient {
    /// Cloud client. Requires a configured API key.
    pub fn new(model: &str, api_key: Option<&str>, base_url: Option<&str>) -> Result<Self, ProviderError> {
        let key = api_key
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Config("OpenAI API key not configured".to_string()))?;
        Ok(Self {
            http: SHARED_HTTP.clone(),
            backend: "openai",
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: Some(key),
            model: model.to_string(),
        })
    }

    /// LM Studio speaks the same dialect locally and needs no key.
    pub fn lmstudio(model: &str, base_url: &str) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            backend: "lmstudio",
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: model.to_string(),
        }
    }

    pub async fn stream(
        &self,
        messages: &[Message],
        tx: &UnboundedSender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let req = ChatRequest {
            model: self.model.clone(),
            messages: to_wire_messages(messages),
            stream: true,
        };
        let mut request = self.http.post(&url).json(&req);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let resp = request
            .send()
            .await
            .map_err(|e| transport_error(self.backend, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(self.backend, status, &body));
        }

        let mut reader = SseReader::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| transport_error(self.backend, e))?;
            for payload in reader.feed(&bytes) {
                if payload == "[DONE]" {
                    let _ = tx.send(StreamChunk::Done);
                    return Ok(());
                }
                let Ok(parsed) = serde_json::from_str::<StreamResponse>(&payload) else {
                    continue;
                };
                if let Some(choice) = parsed.choices.first() {
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            let _ = tx.send(StreamChunk::Text(content.clone()));
                        }
                    }
                    if choice.finish_reason.is_some() {
                        let _ = tx.send(StreamChunk::Done);
                        return Ok(());
                    }
                }
            }
        }

        let _ = tx.send(StreamChunk::Done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::chat::Role;

    #[test]
    fn missing_key_is_a_config_error() {
        let err = OpenAiClient::new("gpt-4o-mini", None, None).unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn image_parts_become_data_uris() {
        let msg = Message::parts(
            Role::User,
            vec![ContentPart::Image {
                data: "QUJD".into(),
                mime: "image/jpeg".into(),
            }],
        );
        let wire = to_wire_messages(&[msg]);
        let url = wire[0]["content"][0]["image_url"]["url"].as_str().unwrap();
        assert_eq!(url, "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn lmstudio_needs_no_key() {
        let client = OpenAiClient::lmstudio("qwen2.5-7b", "http://localhost:1234/");
        assert_eq!(client.base_url, "http://localhost:1234");
        assert!(client.api_key.is_none());
    }
}
