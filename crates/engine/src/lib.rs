//! The request-lifecycle engine: conversation memory plus the
//! orchestrator that turns a hotkey event into a completed, possibly
//! retried, possibly multimodal model exchange.

pub mod llm;
pub mod memory;
pub mod orchestrator;

pub use llm::{ChatBackend, ProviderBackend};
pub use memory::ConversationMemory;
pub use orchestrator::{CaptureSource, Orchestrator, SinkFactory, SinkHandle, TriggerKind};
