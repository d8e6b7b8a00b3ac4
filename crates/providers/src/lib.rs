//! LLM provider clients.
//!
//! Every backend implements the same contract: take an ordered message
//! list, stream response fragments into an unbounded channel in arrival
//! order, and translate its own transport failures into the shared
//! [`ProviderError`](shared::error::ProviderError) taxonomy.

pub mod client;
pub mod gemini;
pub mod model_ref;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod sse;

pub use client::LlmClient;
pub use model_ref::{ModelRef, ProviderKind};
pub use registry::ModelRegistry;

use shared::error::ProviderError;

/// Map a reqwest transport failure onto the shared taxonomy. Status-code
/// classification happens at the call sites where the response is known.
pub(crate) fn transport_error(backend: &'static str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Connection {
            backend,
            detail: "request timed out".to_string(),
        }
    } else if err.is_connect() {
        ProviderError::Connection {
            backend,
            detail: err.to_string(),
        }
    } else {
        ProviderError::Backend {
            backend,
            detail: err.to_string(),
        }
    }
}

/// Classify a non-success HTTP status, keeping the first part of the body
/// for diagnostics.
pub(crate) fn status_error(
    backend: &'static str,
    status: reqwest::StatusCode,
    body: &str,
) -> ProviderError {
    let detail: String = body.chars().take(800).collect();
    let detail = if detail.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", detail.trim())
    };
    match status.as_u16() {
        401 | 403 => ProviderError::Auth { backend, detail },
        _ => ProviderError::Backend { backend, detail },
    }
}
