//! The request orchestrator.
//!
//! One hotkey event walks through admission, capture, prompt assembly,
//! streaming and memory commit. Admission is single-flight: a second
//! trigger while a request is in flight is dropped, not queued. Every
//! per-attempt failure converts into "retry if budget remains"; only an
//! unsupported provider tag aborts the loop early, because no amount of
//! retrying fixes a misconfigured model id.

use crate::llm::ChatBackend;
use crate::memory::ConversationMemory;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use delivery::{CancelHandle, DeliverySink, SessionStatus};
use parking_lot::Mutex;
use shared::capture::{CaptureResult, Region};
use shared::chat::{ContentPart, Message, MessageContent, Role};
use shared::contracts::{HistoryStore, Notifier, OverlaySurface, Severity};
use shared::error::{AttemptError, CaptureError, DeliveryError};
use shared::settings::{AppSettings, OutputMode};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fixed pause between retry attempts. Deliberately not exponential: the
/// retry budget is small and the dominant failure (no selection yet) is
/// helped by a short beat, not by backing off.
const RETRY_DELAY: Duration = Duration::from_millis(300);

/// Consecutive-failure threshold after which guidance text escalates.
const ESCALATE_AFTER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Primary hotkey: capture the active text selection.
    Selection,
    /// Secondary hotkey: use current clipboard content as context.
    Clipboard,
}

/// Capture operations as the orchestrator sees them. The production
/// implementation wraps the capture crate; tests script it.
pub trait CaptureSource: Send + Sync {
    fn selection(&self) -> Result<(String, Option<Region>), CaptureError>;
    fn clipboard(&self) -> Result<CaptureResult, CaptureError>;
}

/// A freshly constructed delivery sink plus its cancel signal (direct
/// paste only).
pub struct SinkHandle {
    pub sink: Box<dyn DeliverySink>,
    pub cancel: Option<CancelHandle>,
}

/// Builds one delivery sink per attempt.
pub trait SinkFactory: Send + Sync {
    fn make(&self, mode: OutputMode, region: Option<Region>)
        -> Result<SinkHandle, DeliveryError>;
}

/// The captured input of one attempt, kept around so the user can re-run
/// the last query manually.
#[derive(Clone)]
struct CapturedInput {
    content: MessageContent,
    /// Text form used for memory commits and log previews.
    display_text: String,
    region: Option<Region>,
}

pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    settings: AppSettings,
    chat: Arc<dyn ChatBackend>,
    capture: Arc<dyn CaptureSource>,
    sinks: Arc<dyn SinkFactory>,
    overlay: Arc<dyn OverlaySurface>,
    notifier: Arc<dyn Notifier>,
    store: Option<Arc<dyn HistoryStore>>,
    memory: Mutex<ConversationMemory>,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
    last_capture: Mutex<Option<CapturedInput>>,
    active_cancel: Mutex<Option<CancelHandle>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: AppSettings,
        chat: Arc<dyn ChatBackend>,
        capture: Arc<dyn CaptureSource>,
        sinks: Arc<dyn SinkFactory>,
        overlay: Arc<dyn OverlaySurface>,
        notifier: Arc<dyn Notifier>,
        store: Option<Arc<dyn HistoryStore>>,
        memory: ConversationMemory,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                chat,
                capture,
                sinks,
                overlay,
                notifier,
                store,
                memory: Mutex::new(memory),
                in_flight: AtomicBool::new(false),
                consecutive_failures: AtomicU32::new(0),
                last_capture: Mutex::new(None),
                active_cancel: Mutex::new(None),
            }),
        }
    }

    /// Entry point for the hotkey callback. Returns immediately; the
    /// request runs on its own worker thread. `false` means a request
    /// was already in flight and this trigger was dropped.
    pub fn trigger(&self, kind: TriggerKind) -> bool {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("request already in flight, dropping {kind:?} trigger");
            return false;
        }
        info!("hotkey trigger accepted: {kind:?}");

        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("flick-request".into())
            .spawn(move || {
                inner.process_request(kind);
                inner.in_flight.store(false, Ordering::SeqCst);
            })
            .map(|_| true)
            .unwrap_or_else(|err| {
                error!("could not spawn request worker: {err}");
                self.inner.in_flight.store(false, Ordering::SeqCst);
                false
            })
    }

    /// Manually re-run the last captured query, outside the retry loop.
    pub fn retry_last(&self) -> bool {
        let Some(captured) = self.inner.last_capture.lock().clone() else {
            warn!("no previous query to retry");
            return false;
        };
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        info!("manual retry of last query");
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("flick-retry".into())
            .spawn(move || {
                if let Err(err) = inner.execute_exchange(&captured) {
                    warn!("manual retry failed: {err}");
                    inner.surface_failure(&err, captured.region, 1);
                }
                inner.in_flight.store(false, Ordering::SeqCst);
            })
            .map(|_| true)
            .unwrap_or_else(|err| {
                error!("could not spawn retry worker: {err}");
                self.inner.in_flight.store(false, Ordering::SeqCst);
                false
            })
    }

    /// Emergency cancel for the in-flight delivery, if any.
    pub fn cancel_active(&self) {
        if let Some(handle) = self.inner.active_cancel.lock().as_ref() {
            info!("cancelling active delivery");
            handle.cancel();
        }
    }

    pub fn memory_snapshot(&self) -> Vec<Message> {
        self.inner.memory.lock().snapshot()
    }

    /// Explicit user action: forget the conversation.
    pub fn clear_memory(&self) {
        self.inner.memory.lock().clear();
    }

    /// Runtime reconfiguration of the memory bound.
    pub fn set_memory_capacity(&self, capacity: usize) {
        self.inner.memory.lock().resize(capacity);
    }

    /// Block until the current request (if any) finishes. Used by tests
    /// and by orderly shutdown.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.inner.in_flight.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }
}

impl Inner {
    fn process_request(&self, kind: TriggerKind) {
        let max_attempts = if self.settings.enable_retry {
            self.settings.max_retries + 1
        } else {
            1
        };

        let mut last_error: Option<AttemptError> = None;
        for attempt in 0..max_attempts {
            if attempt > 0 {
                warn!("retry attempt {attempt}/{}", max_attempts - 1);
                thread::sleep(RETRY_DELAY);
            }
            match self.run_attempt(kind) {
                Ok(()) => {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    return;
                }
                Err(err) => {
                    warn!("attempt {} failed: {err}", attempt + 1);
                    let terminal = err.is_terminal();
                    last_error = Some(err);
                    if terminal {
                        break;
                    }
                }
            }
        }

        let err = last_error.unwrap_or(AttemptError::CaptureEmpty);
        error!("request failed after {max_attempts} attempt(s): {err}");
        let fails = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let region = self
            .last_capture
            .lock()
            .as_ref()
            .and_then(|c| c.region);
        self.surface_failure(&err, region, fails);
    }

    fn run_attempt(&self, kind: TriggerKind) -> Result<(), AttemptError> {
        let captured = self.capture_input(kind)?;
        *self.last_capture.lock() = Some(captured.clone());
        self.execute_exchange(&captured)
    }

    fn capture_input(&self, kind: TriggerKind) -> Result<CapturedInput, AttemptError> {
        match kind {
            TriggerKind::Selection => {
                let (text, region) = self.capture.selection()?;
                if text.trim().is_empty() {
                    return Err(AttemptError::CaptureEmpty);
                }
                debug!("captured selection ({} chars)", text.len());
                Ok(CapturedInput {
                    display_text: text.clone(),
                    content: MessageContent::Text(text),
                    region,
                })
            }
            TriggerKind::Clipboard => self.resolve_clipboard(self.capture.clipboard()?),
        }
    }

    /// Turn classified clipboard content into message content, honoring
    /// the active model's image capability.
    fn resolve_clipboard(&self, result: CaptureResult) -> Result<CapturedInput, AttemptError> {
        match result {
            CaptureResult::Empty => Err(AttemptError::CaptureEmpty),
            CaptureResult::Text(text) => {
                if text.trim().is_empty() {
                    return Err(AttemptError::CaptureEmpty);
                }
                Ok(CapturedInput {
                    display_text: text.clone(),
                    content: MessageContent::Text(text),
                    region: None,
                })
            }
            CaptureResult::FilePath(path) => {
                let display = path.display().to_string();
                if capture::extract::is_image_path(&path) && self.chat.supports_images() {
                    let (bytes, mime) = capture::extract::load_image(&path)?;
                    Ok(CapturedInput {
                        content: MessageContent::Parts(vec![ContentPart::Image {
                            data: BASE64.encode(bytes),
                            mime,
                        }]),
                        display_text: display,
                        region: None,
                    })
                } else {
                    let text = capture::extract::extract_text(&path)?;
                    if text.trim().is_empty() {
                        return Err(AttemptError::CaptureEmpty);
                    }
                    Ok(CapturedInput {
                        display_text: format!("{display}:\n{text}"),
                        content: MessageContent::Text(text),
                        region: None,
                    })
                }
            }
            CaptureResult::Image { data, mime } => {
                if self.chat.supports_images() {
                    Ok(CapturedInput {
                        content: MessageContent::Parts(vec![ContentPart::Image {
                            data: BASE64.encode(&data),
                            mime,
                        }]),
                        display_text: "[clipboard image]".to_string(),
                        region: None,
                    })
                } else {
                    let text = capture::extract::ocr_image_bytes(&data, &mime)?;
                    if text.trim().is_empty() {
                        return Err(AttemptError::CaptureEmpty);
                    }
                    Ok(CapturedInput {
                        display_text: text.clone(),
                        content: MessageContent::Text(text),
                        region: None,
                    })
                }
            }
        }
    }

    fn assemble(&self, captured: &CapturedInput) -> Vec<Message> {
        let mut messages = Vec::new();
        if !self.settings.system_prompt.trim().is_empty() {
            messages.push(Message::text(Role::System, self.settings.system_prompt.clone()));
        }
        if self.settings.memory_enabled {
            messages.extend(self.memory.lock().snapshot());
        }
        messages.push(Message {
            role: Role::User,
            content: captured.content.clone(),
        });
        messages
    }

    fn execute_exchange(&self, captured: &CapturedInput) -> Result<(), AttemptError> {
        let preview: String = captured.display_text.chars().take(50).collect();
        info!("streaming started for: {preview:?}");
        let started = Instant::now();

        let handle = self
            .sinks
            .make(self.settings.output_mode, captured.region)
            .map_err(|e| AttemptError::Delivery(e.to_string()))?;
        let mut sink = handle.sink;
        sink.start()
            .map_err(|e| AttemptError::Delivery(e.to_string()))?;
        *self.active_cancel.lock() = handle.cancel;

        let messages = self.assemble(captured);
        let mut response = String::new();
        let mut chunks: u64 = 0;
        let provider_result = self.chat.stream(messages, &mut |chunk| {
            chunks += 1;
            response.push_str(&chunk);
            sink.submit(Some(chunk));
        });

        // The sentinel and the completion wait run regardless of the
        // provider outcome, so the sink always gets to clean up (and
        // restore the clipboard) before this attempt is judged.
        sink.submit(None);
        let status =
            sink.await_completion(Duration::from_secs(self.settings.streaming_timeout_secs));
        *self.active_cancel.lock() = None;

        provider_result?;
        if chunks == 0 {
            return Err(AttemptError::EmptyResponse);
        }
        match status {
            SessionStatus::Complete => {
                info!(
                    "streaming complete: {chunks} chunks in {:.2}s",
                    started.elapsed().as_secs_f64()
                );
                self.commit(captured, response);
                Ok(())
            }
            SessionStatus::Timeout => Err(AttemptError::DeliveryTimeout),
            other => Err(AttemptError::Delivery(format!(
                "delivery ended with status {other:?}"
            ))),
        }
    }

    /// Append the finished turn to memory and persist the snapshot.
    fn commit(&self, captured: &CapturedInput, response: String) {
        if !self.settings.memory_enabled {
            return;
        }
        let snapshot = {
            let mut memory = self.memory.lock();
            memory.add(Role::User, MessageContent::Text(captured.display_text.clone()));
            memory.add(Role::Assistant, MessageContent::Text(response));
            memory.snapshot()
        };
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&snapshot) {
                warn!("could not persist conversation history: {err}");
            }
        }
    }

    /// Terminal failure surfacing. Overlay mode shows the message where
    /// the user is looking; direct mode stays quiet apart from logs and a
    /// best-effort notification.
    fn surface_failure(&self, err: &AttemptError, region: Option<Region>, fails: u32) {
        let mut message = format!("Could not complete the request: {err}");
        if fails >= ESCALATE_AFTER {
            message.push_str(
                "\nThis keeps happening. Check that the model server is running, or try restarting Flick.",
            );
        }
        match self.settings.output_mode {
            OutputMode::Popup => {
                self.overlay.reset();
                self.overlay.position_near(region);
                self.overlay.show();
                self.overlay.append(&message);
            }
            OutputMode::DirectStream => {
                self.notifier.notify("Flick", &message, Severity::Error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ProviderError;
    use std::sync::mpsc;

    // ── Scripted collaborators ───────────────────────────────────────

    enum ChatScript {
        Chunks(Vec<&'static str>),
        Fail(fn() -> ProviderError),
        /// Emits nothing and succeeds.
        Silent,
        /// Blocks until released, then emits one chunk.
        Block(Mutex<mpsc::Receiver<()>>),
    }

    struct FakeChat {
        script: ChatScript,
        calls: AtomicU32,
        images: bool,
    }

    impl FakeChat {
        fn chunks(chunks: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                script: ChatScript::Chunks(chunks),
                calls: AtomicU32::new(0),
                images: false,
            })
        }

        fn failing(make: fn() -> ProviderError) -> Arc<Self> {
            Arc::new(Self {
                script: ChatScript::Fail(make),
                calls: AtomicU32::new(0),
                images: false,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatBackend for FakeChat {
        fn supports_images(&self) -> bool {
            self.images
        }

        fn stream(
            &self,
            _messages: Vec<Message>,
            on_chunk: &mut dyn FnMut(String),
        ) -> Result<(), ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                ChatScript::Chunks(chunks) => {
                    for c in chunks {
                        on_chunk((*c).to_string());
                    }
                    Ok(())
                }
                ChatScript::Fail(make) => Err(make()),
                ChatScript::Silent => Ok(()),
                ChatScript::Block(rx) => {
                    let _ = rx.lock().recv();
                    on_chunk("ok".to_string());
                    Ok(())
                }
            }
        }
    }

    struct FakeCapture {
        text: Option<&'static str>,
        calls: AtomicU32,
    }

    impl FakeCapture {
        fn with(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                text: Some(text),
                calls: AtomicU32::new(0),
            })
        }

        fn empty() -> Arc<Self> {
            Arc::new(Self {
                text: None,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CaptureSource for FakeCapture {
        fn selection(&self) -> Result<(String, Option<Region>), CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((self.text.unwrap_or("").to_string(), None))
        }

        fn clipboard(&self) -> Result<CaptureResult, CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match self.text {
                Some(t) => CaptureResult::Text(t.to_string()),
                None => CaptureResult::Empty,
            })
        }
    }

    /// Records every submitted chunk; completes on the sentinel.
    struct CollectingSink {
        submitted: Arc<Mutex<Vec<Option<String>>>>,
        status: SessionStatus,
    }

    impl DeliverySink for CollectingSink {
        fn start(&mut self) -> Result<(), DeliveryError> {
            self.status = SessionStatus::Streaming;
            Ok(())
        }

        fn submit(&mut self, chunk: Option<String>) {
            if chunk.is_none() && self.status == SessionStatus::Streaming {
                self.status = SessionStatus::Complete;
            }
            self.submitted.lock().push(chunk);
        }

        fn await_completion(&mut self, _timeout: Duration) -> SessionStatus {
            self.status
        }
    }

    #[derive(Default)]
    struct FakeSinks {
        submitted: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl SinkFactory for FakeSinks {
        fn make(
            &self,
            _mode: OutputMode,
            _region: Option<Region>,
        ) -> Result<SinkHandle, DeliveryError> {
            Ok(SinkHandle {
                sink: Box::new(CollectingSink {
                    submitted: Arc::clone(&self.submitted),
                    status: SessionStatus::Idle,
                }),
                cancel: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeOverlay {
        appended: Mutex<String>,
    }

    impl OverlaySurface for FakeOverlay {
        fn reset(&self) {}
        fn show(&self) {}
        fn append(&self, chunk: &str) {
            self.appended.lock().push_str(chunk);
        }
        fn position_near(&self, _region: Option<Region>) {}
    }

    #[derive(Default)]
    struct FakeNotifier {
        notices: Mutex<Vec<String>>,
    }

    impl Notifier for FakeNotifier {
        fn notify(&self, _title: &str, message: &str, _severity: Severity) {
            self.notices.lock().push(message.to_string());
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        chat: Arc<FakeChat>,
        capture: Arc<FakeCapture>,
        sinks_record: Arc<Mutex<Vec<Option<String>>>>,
        overlay: Arc<FakeOverlay>,
        notifier: Arc<FakeNotifier>,
    }

    fn harness(settings: AppSettings, chat: Arc<FakeChat>, capture: Arc<FakeCapture>) -> Harness {
        let sinks = Arc::new(FakeSinks::default());
        let sinks_record = Arc::clone(&sinks.submitted);
        let overlay = Arc::new(FakeOverlay::default());
        let notifier = Arc::new(FakeNotifier::default());
        let memory = ConversationMemory::new(settings.memory_max_messages);
        let orchestrator = Orchestrator::new(
            settings,
            chat.clone(),
            capture.clone(),
            sinks,
            overlay.clone(),
            notifier.clone(),
            None,
            memory,
        );
        Harness {
            orchestrator,
            chat,
            capture,
            sinks_record,
            overlay,
            notifier,
        }
    }

    fn run(h: &Harness, kind: TriggerKind) {
        assert!(h.orchestrator.trigger(kind));
        assert!(h.orchestrator.wait_idle(Duration::from_secs(10)));
    }

    // ── Tests ────────────────────────────────────────────────────────

    #[test]
    fn successful_exchange_streams_in_order_and_commits_memory() {
        let h = harness(
            AppSettings::default(),
            FakeChat::chunks(vec!["a", "b", "c"]),
            FakeCapture::with("explain this"),
        );
        run(&h, TriggerKind::Selection);

        let submitted = h.sinks_record.lock().clone();
        assert_eq!(
            submitted,
            vec![
                Some("a".to_string()),
                Some("b".to_string()),
                Some("c".to_string()),
                None
            ]
        );

        let memory = h.orchestrator.memory_snapshot();
        assert_eq!(memory.len(), 2);
        assert_eq!(memory[0].role, Role::User);
        assert_eq!(memory[0].text_content(), "explain this");
        assert_eq!(memory[1].role, Role::Assistant);
        assert_eq!(memory[1].text_content(), "abc");
    }

    #[test]
    fn empty_capture_exhausts_the_retry_budget() {
        // max_retries = 2 ⇒ exactly 3 attempts: initial + 2 retries.
        let h = harness(
            AppSettings::default(),
            FakeChat::chunks(vec!["unused"]),
            FakeCapture::empty(),
        );
        run(&h, TriggerKind::Selection);

        assert_eq!(h.capture.calls(), 3);
        assert_eq!(h.chat.calls(), 0);
        let shown = h.overlay.appended.lock().clone();
        assert!(shown.contains("Could not complete the request"));
        assert!(h.orchestrator.memory_snapshot().is_empty());
    }

    #[test]
    fn retry_disabled_means_a_single_attempt() {
        let settings = AppSettings {
            enable_retry: false,
            ..AppSettings::default()
        };
        let h = harness(settings, FakeChat::chunks(vec!["x"]), FakeCapture::empty());
        run(&h, TriggerKind::Selection);
        assert_eq!(h.capture.calls(), 1);
    }

    #[test]
    fn provider_errors_are_retried_like_any_other_failure() {
        let h = harness(
            AppSettings::default(),
            FakeChat::failing(|| ProviderError::Connection {
                backend: "ollama",
                detail: "connection refused".into(),
            }),
            FakeCapture::with("some text"),
        );
        run(&h, TriggerKind::Selection);
        assert_eq!(h.chat.calls(), 3);
    }

    #[test]
    fn auth_errors_use_the_same_budget_as_transient_ones() {
        let h = harness(
            AppSettings::default(),
            FakeChat::failing(|| ProviderError::Auth {
                backend: "openai",
                detail: "401".into(),
            }),
            FakeCapture::with("some text"),
        );
        run(&h, TriggerKind::Selection);
        assert_eq!(h.chat.calls(), 3);
    }

    #[test]
    fn unsupported_provider_aborts_the_retry_loop() {
        let h = harness(
            AppSettings::default(),
            FakeChat::failing(|| {
                ProviderError::UnsupportedProvider("unsupported:foo".into())
            }),
            FakeCapture::with("some text"),
        );
        run(&h, TriggerKind::Selection);

        assert_eq!(h.chat.calls(), 1);
        let shown = h.overlay.appended.lock().clone();
        assert!(shown.contains("unsupported:foo"));
    }

    #[test]
    fn zero_chunk_streams_count_as_failures() {
        let chat = Arc::new(FakeChat {
            script: ChatScript::Silent,
            calls: AtomicU32::new(0),
            images: false,
        });
        let h = harness(AppSettings::default(), chat, FakeCapture::with("text"));
        run(&h, TriggerKind::Selection);

        assert_eq!(h.chat.calls(), 3);
        assert!(h.orchestrator.memory_snapshot().is_empty());
    }

    #[test]
    fn second_trigger_during_flight_is_dropped() {
        let (release, gate) = mpsc::channel::<()>();
        let chat = Arc::new(FakeChat {
            script: ChatScript::Block(Mutex::new(gate)),
            calls: AtomicU32::new(0),
            images: false,
        });
        let h = harness(AppSettings::default(), chat, FakeCapture::with("text"));

        assert!(h.orchestrator.trigger(TriggerKind::Selection));
        assert!(!h.orchestrator.trigger(TriggerKind::Selection));
        assert!(!h.orchestrator.trigger(TriggerKind::Clipboard));

        release.send(()).unwrap();
        assert!(h.orchestrator.wait_idle(Duration::from_secs(10)));
        assert_eq!(h.chat.calls(), 1);
    }

    #[test]
    fn direct_mode_failures_notify_instead_of_showing_the_overlay() {
        let settings = AppSettings {
            output_mode: OutputMode::DirectStream,
            ..AppSettings::default()
        };
        let h = harness(settings, FakeChat::chunks(vec!["x"]), FakeCapture::empty());
        run(&h, TriggerKind::Selection);

        assert!(h.overlay.appended.lock().is_empty());
        assert_eq!(h.notifier.notices.lock().len(), 1);
    }

    #[test]
    fn repeated_failures_escalate_the_guidance_text() {
        let h = harness(
            AppSettings::default(),
            FakeChat::chunks(vec!["x"]),
            FakeCapture::empty(),
        );
        for _ in 0..ESCALATE_AFTER {
            run(&h, TriggerKind::Selection);
        }
        let shown = h.overlay.appended.lock().clone();
        assert!(shown.contains("restarting Flick"));
    }

    #[test]
    fn memory_disabled_skips_commits_entirely() {
        let settings = AppSettings {
            memory_enabled: false,
            ..AppSettings::default()
        };
        let h = harness(
            settings,
            FakeChat::chunks(vec!["answer"]),
            FakeCapture::with("question"),
        );
        run(&h, TriggerKind::Selection);
        assert!(h.orchestrator.memory_snapshot().is_empty());
    }

    #[test]
    fn manual_retry_reruns_the_last_capture() {
        let h = harness(
            AppSettings::default(),
            FakeChat::chunks(vec!["answer"]),
            FakeCapture::with("question"),
        );
        run(&h, TriggerKind::Selection);
        assert!(h.orchestrator.retry_last());
        assert!(h.orchestrator.wait_idle(Duration::from_secs(10)));

        assert_eq!(h.chat.calls(), 2);
        // Two full turns committed.
        assert_eq!(h.orchestrator.memory_snapshot().len(), 4);
    }

    #[test]
    fn clipboard_trigger_uses_clipboard_text() {
        let h = harness(
            AppSettings::default(),
            FakeChat::chunks(vec!["ok"]),
            FakeCapture::with("clipboard context"),
        );
        run(&h, TriggerKind::Clipboard);
        let memory = h.orchestrator.memory_snapshot();
        assert_eq!(memory[0].text_content(), "clipboard context");
    }

    #[test]
    fn clearing_and_resizing_memory() {
        let h = harness(
            AppSettings::default(),
            FakeChat::chunks(vec!["r"]),
            FakeCapture::with("q"),
        );
        run(&h, TriggerKind::Selection);
        assert_eq!(h.orchestrator.memory_snapshot().len(), 2);

        h.orchestrator.set_memory_capacity(1);
        assert_eq!(h.orchestrator.memory_snapshot().len(), 1);

        h.orchestrator.clear_memory();
        assert!(h.orchestrator.memory_snapshot().is_empty());
    }
}
