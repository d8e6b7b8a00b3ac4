//! Adapters wiring the capture and delivery crates into the engine's
//! collaborator traits.

use capture::{classify_clipboard, SelectionCapturer};
use delivery::{DirectPasteOptions, DirectPasteSink, OverlaySink};
use engine::{CaptureSource, SinkFactory, SinkHandle};
use shared::capture::{CaptureResult, Region};
use shared::contracts::{NoInspector, OverlaySurface};
use shared::error::{CaptureError, DeliveryError};
use shared::settings::{AppSettings, OutputMode};
use std::sync::Arc;

pub struct SystemCapture {
    selection: SelectionCapturer,
}

impl SystemCapture {
    pub fn new() -> Self {
        // Accessibility bindings are platform glue owned by the shell;
        // until one is injected, selection capture relies on the
        // clipboard-simulation fallback.
        Self {
            selection: SelectionCapturer::new(Arc::new(NoInspector)),
        }
    }
}

impl CaptureSource for SystemCapture {
    fn selection(&self) -> Result<(String, Option<Region>), CaptureError> {
        self.selection.capture()
    }

    fn clipboard(&self) -> Result<CaptureResult, CaptureError> {
        Ok(classify_clipboard())
    }
}

pub struct SystemSinks {
    settings: AppSettings,
    overlay: Arc<dyn OverlaySurface>,
}

impl SystemSinks {
    pub fn new(settings: AppSettings, overlay: Arc<dyn OverlaySurface>) -> Self {
        Self { settings, overlay }
    }
}

impl SinkFactory for SystemSinks {
    fn make(
        &self,
        mode: OutputMode,
        region: Option<Region>,
    ) -> Result<SinkHandle, DeliveryError> {
        match mode {
            OutputMode::Popup => Ok(SinkHandle {
                sink: Box::new(OverlaySink::new(Arc::clone(&self.overlay), region)),
                cancel: None,
            }),
            OutputMode::DirectStream => {
                let sink =
                    DirectPasteSink::system(DirectPasteOptions::from(&self.settings.paste))?;
                let cancel = sink.cancel_handle();
                Ok(SinkHandle {
                    sink: Box::new(sink),
                    cancel: Some(cancel),
                })
            }
        }
    }
}
