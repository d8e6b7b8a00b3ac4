//! Gemini client, streaming via `streamGenerateContent?alt=sse`.

use crate::sse::SseReader;
use crate::{status_error, transport_error};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::chat::{ContentPart, Message, MessageContent, Role, StreamChunk};
use shared::error::ProviderError;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const BACKEND: &str = "gemini";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
}

#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn to_wire_parts(content: &MessageContent) -> Vec<WirePart> {
    match content {
        MessageContent::Text(text) => vec![WirePart::Text { text: text.clone() }],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => WirePart::Text { text: text.clone() },
                ContentPart::Image { data, mime } => WirePart::InlineData {
                    inline_data: InlineData {
                        mime_type: mime.clone(),
                        data: data.clone(),
                    },
                },
            })
            .collect(),
    }
}

/// Gemini's roles are "user" and "model"; the system prompt rides in a
/// separate `system_instruction` field.
fn to_wire(messages: &[Message]) -> GenerateRequest {
    let mut system_instruction = None;
    let mut contents = Vec::new();
    for m in messages {
        match m.role {
            Role::System => {
                system_instruction = Some(WireContent {
                    role: "system",
                    parts: to_wire_parts(&m.content),
                });
            }
            Role::Assistant => contents.push(WireContent {
                role: "model",
                parts: to_wire_parts(&m.content),
            }),
            Role::User => contents.push(WireContent {
                role: "user",
                parts: to_wire_parts(&m.content),
            }),
        }
    }
    GenerateRequest {
        contents,
        system_instruction,
    }
}

#[derive(Debug)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(model: &str, api_key: Option<&str>) -> Result<Self, ProviderError> {
        let key = api_key
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Config("Gemini API key not configured".to_string()))?;
        Ok(Self {
            http: SHARED_HTTP.clone(),
            api_key: key,
            model: model.to_string(),
        })
    }

    pub async fn stream(
        &self,
        messages: &[Message],
        tx: &UnboundedSender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let url = format!(
            "{BASE_URL}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.model, self.api_key
        );
        let resp = self
            .http
            .post(url)
            .json(&to_wire(messages))
            .send()
            .await
            .map_err(|e| transport_error(BACKEND, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(BACKEND, status, &body));
        }

        let mut reader = SseReader::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| transport_error(BACKEND, e))?;
            for payload in reader.feed(&bytes) {
                let Ok(parsed) = serde_json::from_str::<GenerateResponse>(&payload) else {
                    continue;
                };
                let text: String = parsed
                    .candidates
                    .first()
                    .and_then(|c| c.content.as_ref())
                    .map(|c| {
                        c.parts
                            .iter()
                            .filter_map(|p| p.text.as_deref())
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default();
                if !text.is_empty() {
                    let _ = tx.send(StreamChunk::Text(text));
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

    #[test]
    fn system_prompt_moves_to_system_instruction() {
        let req = to_wire(&[
            Message::text(Role::System, "be brief"),
            Message::text(Role::User, "hi"),
            Message::text(Role::Assistant, "hello"),
        ]);
        assert!(req.system_instruction.is_some());
        assert_eq!(req.contents.len(), 2);
        assert_eq!(req.contents[0].role, "user");
        assert_eq!(req.contents[1].role, "model");
    }

    #[test]
    fn image_parts_serialize_as_inline_data() {
        let msg = Message::parts(
            Role::User,
            vec![ContentPart::Image {
                data: "QUJD".into(),
                mime: "image/png".into(),
            }],
        );
        let req = to_wire(&[msg]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"inline_data\""));
        assert!(json.contains("\"mime_type\":\"image/png\""));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        assert!(matches!(
            GeminiClient::new("gemini-1.5-flash", None).unwrap_err(),
            ProviderError::Config(_)
        ));
    }
}
