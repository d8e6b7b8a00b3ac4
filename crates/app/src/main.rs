//! Flick: hotkey-triggered LLM assistant.
//!
//! Composition root. Loads settings, restores conversation memory, wires
//! the engine to the OS (clipboard, keystrokes, hotkeys) and parks on the
//! hotkey listener.

mod config;
mod glue;
mod hotkeys;
mod store;
mod surfaces;

use engine::{ConversationMemory, Orchestrator, ProviderBackend};
use shared::contracts::HistoryStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = config::load_settings_or_default();
    info!(
        "model {} | output {:?} | retries {}",
        settings.selected_model, settings.output_mode, settings.max_retries
    );

    let store: Option<Arc<dyn HistoryStore>> = config::history_path()
        .map(|path| Arc::new(store::JsonHistoryStore::new(path)) as Arc<dyn HistoryStore>);

    let memory = if settings.memory_enabled {
        let restored = store
            .as_ref()
            .and_then(|s| match s.load() {
                Ok(messages) => Some(messages),
                Err(err) => {
                    warn!("could not restore conversation history: {err}");
                    None
                }
            })
            .unwrap_or_default();
        if !restored.is_empty() {
            info!("restored {} messages of conversation history", restored.len());
        }
        ConversationMemory::from_messages(restored, settings.memory_max_messages)
    } else {
        ConversationMemory::new(settings.memory_max_messages)
    };

    let backend = Arc::new(ProviderBackend::new(&settings));
    log_available_models(&backend);

    let overlay = Arc::new(surfaces::ConsoleOverlay::default());
    let orchestrator = Arc::new(Orchestrator::new(
        settings.clone(),
        backend,
        Arc::new(glue::SystemCapture::new()),
        Arc::new(glue::SystemSinks::new(settings.clone(), overlay.clone())),
        overlay,
        Arc::new(surfaces::LogNotifier),
        store,
        memory,
    ));

    hotkeys::run(orchestrator, &settings.hotkeys)
}

/// Best-effort model listing at startup; probe failures already collapse
/// into the static fallback inside the registry.
fn log_available_models(backend: &ProviderBackend) {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => {
            let models = rt.block_on(backend.registry().available_models());
            info!("{} model(s) available: {}", models.len(), models.join(", "));
        }
        Err(err) => warn!("could not probe model listing: {err}"),
    }
}
