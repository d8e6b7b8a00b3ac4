//! Contracts for the collaborators that live outside the engine: the
//! overlay window, the system notifier, the persisted history store and
//! the platform selection inspector. The engine only ever talks to these
//! traits; the binaries decide what actually backs them.

use crate::capture::Region;
use crate::chat::Message;

/// The floating output surface. The engine pushes into it and never reads
/// UI state back.
pub trait OverlaySurface: Send + Sync {
    fn reset(&self);
    fn show(&self);
    fn append(&self, chunk: &str);
    fn position_near(&self, region: Option<Region>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Best-effort system notifications. Implementations must not fail loudly.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str, severity: Severity);
}

/// Durable storage for conversation memory. The on-disk format is the
/// store's business; the engine only hands over message snapshots.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Vec<Message>>;
    fn save(&self, messages: &[Message]) -> anyhow::Result<()>;
}

/// Non-destructive selection retrieval via platform accessibility APIs.
/// Returns `None` when no selection can be read that way; the capture
/// layer then falls back to clipboard simulation.
pub trait SelectionInspector: Send + Sync {
    fn selection(&self) -> Option<(String, Option<Region>)>;
}

/// Inspector for platforms (or builds) without an accessibility binding.
pub struct NoInspector;

impl SelectionInspector for NoInspector {
    fn selection(&self) -> Option<(String, Option<Region>)> {
        None
    }
}
