//! Overlay delivery: append chunks into the floating output surface.
//!
//! The surface is reset and positioned once per request, before the
//! first chunk, and stays open after completion for manual copy or
//! dismissal. No timeout of its own; the provider call bounds it.

use crate::{DeliverySink, SessionStatus, StreamSession};
use shared::capture::Region;
use shared::contracts::OverlaySurface;
use shared::error::DeliveryError;
use std::sync::Arc;
use std::time::Duration;

pub struct OverlaySink {
    surface: Arc<dyn OverlaySurface>,
    region: Option<Region>,
    session: StreamSession,
}

impl OverlaySink {
    pub fn new(surface: Arc<dyn OverlaySurface>, region: Option<Region>) -> Self {
        Self {
            surface,
            region,
            session: StreamSession::new(),
        }
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }
}

impl DeliverySink for OverlaySink {
    fn start(&mut self) -> Result<(), DeliveryError> {
        self.surface.reset();
        self.surface.position_near(self.region);
        self.surface.show();
        self.session = StreamSession::new();
        self.session.status = SessionStatus::Streaming;
        Ok(())
    }

    fn submit(&mut self, chunk: Option<String>) {
        match chunk {
            Some(text) => {
                self.session.token_count += 1;
                self.surface.append(&text);
            }
            None => self.session.status = SessionStatus::Complete,
        }
    }

    fn await_completion(&mut self, _timeout: Duration) -> SessionStatus {
        // Everything happened synchronously in submit().
        self.session.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        text: Mutex<String>,
        resets: Mutex<u32>,
    }

    impl OverlaySurface for RecordingSurface {
        fn reset(&self) {
            *self.resets.lock() += 1;
            self.text.lock().clear();
        }
        fn show(&self) {}
        fn append(&self, chunk: &str) {
            self.text.lock().push_str(chunk);
        }
        fn position_near(&self, _region: Option<Region>) {}
    }

    #[test]
    fn appends_chunks_in_order_after_a_single_reset() {
        let surface = Arc::new(RecordingSurface::default());
        let mut sink = OverlaySink::new(surface.clone(), None);

        sink.start().unwrap();
        for chunk in ["a", "b", "c"] {
            sink.submit(Some(chunk.to_string()));
        }
        sink.submit(None);

        assert_eq!(sink.await_completion(Duration::ZERO), SessionStatus::Complete);
        assert_eq!(*surface.text.lock(), "abc");
        assert_eq!(*surface.resets.lock(), 1);
        assert_eq!(sink.session().token_count, 3);
    }

    #[test]
    fn no_sentinel_means_still_streaming() {
        let surface = Arc::new(RecordingSurface::default());
        let mut sink = OverlaySink::new(surface, None);
        sink.start().unwrap();
        sink.submit(Some("partial".to_string()));
        assert_eq!(sink.await_completion(Duration::ZERO), SessionStatus::Streaming);
    }
}
