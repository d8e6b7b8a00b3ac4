//! Headless stand-ins for the out-of-scope UI collaborators. The overlay
//! streams to stdout so popup mode works from a terminal; the notifier
//! logs.

use parking_lot::Mutex;
use shared::capture::Region;
use shared::contracts::{Notifier, OverlaySurface, Severity};
use std::io::Write;
use tracing::{error, info, warn};

#[derive(Default)]
pub struct ConsoleOverlay {
    buffer: Mutex<String>,
}

impl OverlaySurface for ConsoleOverlay {
    fn reset(&self) {
        self.buffer.lock().clear();
    }

    fn show(&self) {
        println!();
    }

    fn append(&self, chunk: &str) {
        self.buffer.lock().push_str(chunk);
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    }

    fn position_near(&self, _region: Option<Region>) {}
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("{title}: {message}"),
            Severity::Warning => warn!("{title}: {message}"),
            Severity::Error => error!("{title}: {message}"),
        }
    }
}
