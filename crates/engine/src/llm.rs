//! Blocking bridge between the orchestrator's worker thread and the
//! async provider clients.

use providers::{LlmClient, ModelRef, ModelRegistry};
use shared::chat::{Message, StreamChunk};
use shared::error::ProviderError;
use shared::settings::AppSettings;
use tokio::sync::mpsc::unbounded_channel;
use tracing::debug;

/// What the orchestrator needs from a model backend. The production
/// implementation drives a provider client on its own runtime; tests
/// substitute scripted fakes.
pub trait ChatBackend: Send + Sync {
    /// Whether the active model can take image parts.
    fn supports_images(&self) -> bool;

    /// Send `messages`, invoking `on_chunk` for every response fragment
    /// in arrival order. Blocks until the stream ends or fails.
    fn stream(
        &self,
        messages: Vec<Message>,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<(), ProviderError>;
}

/// Production backend. The model id is parsed once, here; a bad provider
/// tag is kept and surfaced per request so the application can keep
/// running (and the user can fix the setting) instead of dying at start.
pub struct ProviderBackend {
    model: Result<ModelRef, String>,
    settings: AppSettings,
    registry: ModelRegistry,
}

impl ProviderBackend {
    pub fn new(settings: &AppSettings) -> Self {
        let model = ModelRef::parse(&settings.selected_model)
            .map_err(|_| settings.selected_model.clone());
        Self {
            model,
            settings: settings.clone(),
            registry: ModelRegistry::new(
                settings.providers.clone(),
                settings.multimodal.clone(),
            ),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
}

impl ChatBackend for ProviderBackend {
    fn supports_images(&self) -> bool {
        self.model
            .as_ref()
            .map(|m| self.registry.is_multimodal(m))
            .unwrap_or(false)
    }

    fn stream(
        &self,
        messages: Vec<Message>,
        on_chunk: &mut dyn FnMut(String),
    ) -> Result<(), ProviderError> {
        let model = self
            .model
            .clone()
            .map_err(ProviderError::UnsupportedProvider)?;

        // The worker thread owns its own runtime; the provider task emits
        // into a channel we drain right here, preserving chunk order.
        let rt = tokio::runtime::Runtime::new().map_err(|e| ProviderError::Backend {
            backend: "runtime",
            detail: format!("failed to start async runtime: {e}"),
        })?;
        let (tx, mut rx) = unbounded_channel::<StreamChunk>();
        let client = LlmClient::new(model, self.settings.providers.clone());
        let producer = rt.spawn(async move { client.stream(&messages, tx).await });

        while let Some(chunk) = rx.blocking_recv() {
            match chunk {
                StreamChunk::Text(text) => on_chunk(text),
                StreamChunk::Done => break,
            }
        }
        rx.close();

        match rt.block_on(producer) {
            Ok(result) => result,
            Err(join_err) => {
                debug!("provider task join failed: {join_err}");
                Err(ProviderError::Backend {
                    backend: "runtime",
                    detail: join_err.to_string(),
                })
            }
        }
    }
}
