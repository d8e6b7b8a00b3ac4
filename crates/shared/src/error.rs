//! Error taxonomy for the request lifecycle.
//!
//! Provider failures collapse into a small set of kinds so the retry loop
//! and the UI never have to understand backend-specific errors. Everything
//! here is recoverable at the attempt boundary except
//! [`ProviderError::UnsupportedProvider`], which indicates misconfiguration
//! and aborts the retry loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Backend unreachable or timed out.
    #[error("could not reach {backend}: {detail}")]
    Connection { backend: &'static str, detail: String },

    /// Credentials rejected (HTTP 401/403).
    #[error("authentication failed with {backend}: {detail}")]
    Auth { backend: &'static str, detail: String },

    /// Client not usable as configured (e.g. no API key set).
    #[error("{0}")]
    Config(String),

    /// The selected model id names a provider tag we do not know.
    #[error("unsupported provider in model id `{0}`")]
    UnsupportedProvider(String),

    /// Anything else, carrying the backend's own message.
    #[error("{backend} error: {detail}")]
    Backend { backend: &'static str, detail: String },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("clipboard access failed: {0}")]
    Clipboard(String),

    #[error("input simulation failed: {0}")]
    Input(String),

    #[error("could not extract content from {path}: {detail}")]
    Extraction { path: String, detail: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("clipboard access failed: {0}")]
    Clipboard(String),

    #[error("input simulation failed: {0}")]
    Input(String),
}

/// Why a single request attempt failed. The orchestrator converts every
/// one of these into "retry if budget remains".
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("nothing was captured")]
    CaptureEmpty,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery did not finish within the configured timeout")]
    DeliveryTimeout,

    #[error("the model produced no output")]
    EmptyResponse,
}

impl AttemptError {
    /// `UnsupportedProvider` is a configuration problem; retrying with the
    /// same settings cannot succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptError::Provider(ProviderError::UnsupportedProvider(_))
        )
    }
}
