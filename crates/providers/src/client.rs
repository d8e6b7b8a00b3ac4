//! Dispatch from a parsed [`ModelRef`] to the matching backend client.

use crate::gemini::GeminiClient;
use crate::model_ref::{ModelRef, ProviderKind};
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;
use shared::chat::{Message, StreamChunk};
use shared::error::ProviderError;
use shared::settings::ProviderSettings;
use tokio::sync::mpsc::UnboundedSender;

/// One streaming-query entry point over all backends. Construction is
/// cheap; clients share pooled HTTP connections underneath.
pub struct LlmClient {
    model: ModelRef,
    cfg: ProviderSettings,
}

impl LlmClient {
    pub fn new(model: ModelRef, cfg: ProviderSettings) -> Self {
        Self { model, cfg }
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Send `messages` and stream response fragments into `tx` until the
    /// backend finishes or fails. Chunks arrive in provider order; no
    /// coalescing happens here.
    pub async fn stream(
        &self,
        messages: &[Message],
        tx: UnboundedSender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        match self.model.kind {
            ProviderKind::Ollama => {
                OllamaClient::new(&self.cfg.ollama_base_url, &self.model.name)
                    .stream(messages, &tx)
                    .await
            }
            ProviderKind::LmStudio => {
                OpenAiClient::lmstudio(&self.model.name, &self.cfg.lmstudio_base_url)
                    .stream(messages, &tx)
                    .await
            }
            ProviderKind::OpenAi => {
                OpenAiClient::new(
                    &self.model.name,
                    self.cfg.openai_api_key.as_deref(),
                    self.cfg.openai_base_url.as_deref(),
                )?
                .stream(messages, &tx)
                .await
            }
            ProviderKind::Gemini => {
                GeminiClient::new(&self.model.name, self.cfg.gemini_api_key.as_deref())?
                    .stream(messages, &tx)
                    .await
            }
        }
    }
}
