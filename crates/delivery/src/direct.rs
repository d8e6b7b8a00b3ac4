//! Direct-paste delivery.
//!
//! A consumer thread drains the chunk queue, accumulates text, and
//! flushes it into the focused application as clipboard + Ctrl+V once the
//! buffer is large enough or a natural boundary goes by. A second thread
//! watches the foreground window and pauses the consumer whenever focus
//! leaves the window that was active at session start, so streamed text
//! never lands in the wrong application. The original clipboard text is
//! snapshotted before the first paste and restored on every exit path:
//! completion, failure, timeout and cancellation.

use crate::winfocus;
use crate::{DeliverySink, PasteBackend, SessionStatus, StreamSession, SystemBackend};
use parking_lot::{Condvar, Mutex};
use shared::error::DeliveryError;
use shared::settings::PasteSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often the consumer re-checks the stop flag while idle.
const QUEUE_POLL: Duration = Duration::from_millis(200);
/// Grace period between writing the clipboard and sending the paste chord.
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct DirectPasteOptions {
    pub flush_limit: usize,
    pub paste_delay: Duration,
    pub focus_poll: Duration,
}

impl Default for DirectPasteOptions {
    fn default() -> Self {
        Self {
            flush_limit: 150,
            paste_delay: Duration::from_millis(50),
            focus_poll: Duration::from_millis(250),
        }
    }
}

impl From<&PasteSettings> for DirectPasteOptions {
    fn from(s: &PasteSettings) -> Self {
        Self {
            flush_limit: s.flush_limit,
            paste_delay: Duration::from_millis(s.paste_delay_ms),
            focus_poll: Duration::from_millis(s.focus_poll_ms),
        }
    }
}

type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;
type FocusFn = Arc<dyn Fn() -> Option<isize> + Send + Sync>;

/// Pause/resume gate between the focus monitor and the consumer.
struct Gate {
    paused: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            paused: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn set_paused(&self, paused: bool) {
        *self.paused.lock() = paused;
        self.cond.notify_all();
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Block while paused, waking periodically to observe the stop flag.
    fn wait_while_paused(&self, stop: &AtomicBool) {
        let mut paused = self.paused.lock();
        while *paused && !stop.load(Ordering::SeqCst) {
            self.cond
                .wait_for(&mut paused, Duration::from_millis(100));
        }
    }
}

/// Completion latch the orchestrator blocks on with a hard timeout.
struct Done {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Done {
    fn new() -> Self {
        Self {
            flag: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn signal(&self) {
        *self.flag.lock() = true;
        self.cond.notify_all();
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flag = self.flag.lock();
        while !*flag {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.cond.wait_for(&mut flag, remaining);
        }
        true
    }
}

/// Emergency-cancel signal; halts delivery from outside the session.
#[derive(Clone)]
pub struct CancelHandle {
    stop: Arc<AtomicBool>,
    gate: Arc<Gate>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wake a consumer parked on the pause gate.
        self.gate.set_paused(false);
    }
}

pub struct DirectPasteSink {
    backend: Option<Box<dyn PasteBackend>>,
    opts: DirectPasteOptions,
    focus: FocusFn,
    on_error: ErrorCallback,
    tx: Option<mpsc::Sender<Option<String>>>,
    consumer: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    gate: Arc<Gate>,
    done: Arc<Done>,
    session: Arc<Mutex<StreamSession>>,
}

impl DirectPasteSink {
    pub fn new(backend: Box<dyn PasteBackend>, opts: DirectPasteOptions) -> Self {
        Self {
            backend: Some(backend),
            opts,
            focus: Arc::new(winfocus::foreground_window),
            on_error: Arc::new(|kind, msg| warn!("delivery error [{kind}]: {msg}")),
            tx: None,
            consumer: None,
            monitor: None,
            stop: Arc::new(AtomicBool::new(false)),
            gate: Arc::new(Gate::new()),
            done: Arc::new(Done::new()),
            session: Arc::new(Mutex::new(StreamSession::new())),
        }
    }

    /// Real clipboard + input backend.
    pub fn system(opts: DirectPasteOptions) -> Result<Self, DeliveryError> {
        Ok(Self::new(Box::new(SystemBackend::new()?), opts))
    }

    pub fn with_error_callback(mut self, cb: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(cb);
        self
    }

    /// Override foreground-window sampling (tests).
    pub fn with_focus_fn(mut self, f: impl Fn() -> Option<isize> + Send + Sync + 'static) -> Self {
        self.focus = Arc::new(f);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            stop: Arc::clone(&self.stop),
            gate: Arc::clone(&self.gate),
        }
    }

    pub fn token_count(&self) -> u64 {
        self.session.lock().token_count
    }
}

impl DeliverySink for DirectPasteSink {
    fn start(&mut self) -> Result<(), DeliveryError> {
        let mut backend = self
            .backend
            .take()
            .ok_or_else(|| DeliveryError::Input("delivery session already started".into()))?;

        let original = backend.clipboard_text();
        let target = (self.focus)();
        {
            let mut session = self.session.lock();
            *session = StreamSession::new();
            session.status = SessionStatus::Streaming;
            session.target_window = target;
        }

        let (tx, rx) = mpsc::channel::<Option<String>>();
        self.tx = Some(tx);

        let stop = Arc::clone(&self.stop);
        let gate = Arc::clone(&self.gate);
        let done = Arc::clone(&self.done);
        let session = Arc::clone(&self.session);
        let on_error = Arc::clone(&self.on_error);
        let opts = self.opts.clone();
        self.consumer = Some(thread::spawn(move || {
            run_consumer(backend, original, rx, stop, gate, session, opts, on_error);
            done.signal();
        }));

        let stop = Arc::clone(&self.stop);
        let gate = Arc::clone(&self.gate);
        let focus = Arc::clone(&self.focus);
        let poll = self.opts.focus_poll;
        self.monitor = Some(thread::spawn(move || {
            run_monitor(focus, target, stop, gate, poll);
        }));

        Ok(())
    }

    fn submit(&mut self, chunk: Option<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(chunk);
        }
    }

    fn await_completion(&mut self, timeout: Duration) -> SessionStatus {
        if !self.done.wait_timeout(timeout) {
            self.stop.store(true, Ordering::SeqCst);
            self.gate.set_paused(false);
            let mut session = self.session.lock();
            session.status = SessionStatus::Timeout;
            session.error_message = Some(format!(
                "delivery did not drain within {}s",
                timeout.as_secs()
            ));
            (self.on_error)("timeout", session.error_message.as_deref().unwrap_or(""));
            // The consumer still observes the stop flag, restores the
            // clipboard and exits; we just stop waiting for it.
            return SessionStatus::Timeout;
        }

        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.monitor.take() {
            let _ = handle.join();
        }
        self.session.lock().status
    }
}

fn is_flush_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':')
}

#[allow(clippy::too_many_arguments)]
fn run_consumer(
    mut backend: Box<dyn PasteBackend>,
    original: Option<String>,
    rx: mpsc::Receiver<Option<String>>,
    stop: Arc<AtomicBool>,
    gate: Arc<Gate>,
    session: Arc<Mutex<StreamSession>>,
    opts: DirectPasteOptions,
    on_error: ErrorCallback,
) {
    let mut buffer = String::new();
    let mut cancelled = false;

    loop {
        if stop.load(Ordering::SeqCst) {
            cancelled = true;
            break;
        }
        match rx.recv_timeout(QUEUE_POLL) {
            Ok(Some(chunk)) => {
                gate.wait_while_paused(&stop);
                if stop.load(Ordering::SeqCst) {
                    cancelled = true;
                    break;
                }
                let boundary = chunk.chars().last().map_or(false, is_flush_boundary);
                buffer.push_str(&chunk);
                session.lock().token_count += 1;
                if buffer.len() >= opts.flush_limit || boundary {
                    flush(backend.as_mut(), &mut buffer, &opts, &on_error);
                }
            }
            Ok(None) => {
                gate.wait_while_paused(&stop);
                if stop.load(Ordering::SeqCst) {
                    cancelled = true;
                } else {
                    flush(backend.as_mut(), &mut buffer, &opts, &on_error);
                }
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    cancelled = true;
                    break;
                }
                // Idle: push what we already have so output keeps flowing.
                if !buffer.is_empty() && !gate.is_paused() {
                    flush(backend.as_mut(), &mut buffer, &opts, &on_error);
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Restoration is not skippable on any exit path.
    if let Some(original) = original {
        if let Err(err) = backend.set_clipboard_text(&original) {
            warn!("failed to restore clipboard after delivery: {err}");
            on_error("clipboard_restore", &err.to_string());
        }
    }
    backend.release_modifiers();

    let mut s = session.lock();
    if s.status == SessionStatus::Streaming {
        if cancelled {
            s.status = SessionStatus::Error;
            s.error_message = Some("delivery cancelled".to_string());
        } else {
            s.status = SessionStatus::Complete;
        }
    }
}

fn flush(
    backend: &mut dyn PasteBackend,
    buffer: &mut String,
    opts: &DirectPasteOptions,
    on_error: &ErrorCallback,
) {
    if buffer.is_empty() {
        return;
    }
    if let Err(err) = backend.set_clipboard_text(buffer) {
        warn!("clipboard write failed, dropping {} buffered chars: {err}", buffer.len());
        on_error("clipboard_write", &err.to_string());
        buffer.clear();
        return;
    }
    thread::sleep(CLIPBOARD_SETTLE);
    if let Err(err) = backend.send_paste() {
        warn!("paste keystroke failed: {err}");
        on_error("paste", &err.to_string());
    }
    // Backpressure: let the target application chew before the next flush.
    thread::sleep(opts.paste_delay);
    backend.release_modifiers();
    buffer.clear();
}

fn run_monitor(
    focus: FocusFn,
    target: Option<isize>,
    stop: Arc<AtomicBool>,
    gate: Arc<Gate>,
    poll: Duration,
) {
    // Without a recorded target there is nothing to compare against.
    let Some(target) = target else { return };
    while !stop.load(Ordering::SeqCst) {
        let away = matches!(focus(), Some(w) if w != target);
        if away && !gate.is_paused() {
            debug!("focus left target window, pausing paste stream");
        }
        gate.set_paused(away);
        thread::sleep(poll);
    }
    gate.set_paused(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicIsize;

    #[derive(Clone, Default)]
    struct FakeBackend {
        clipboard: Arc<Mutex<Option<String>>>,
        pasted: Arc<Mutex<Vec<String>>>,
    }

    impl PasteBackend for FakeBackend {
        fn clipboard_text(&mut self) -> Option<String> {
            self.clipboard.lock().clone()
        }

        fn set_clipboard_text(&mut self, text: &str) -> Result<(), DeliveryError> {
            *self.clipboard.lock() = Some(text.to_string());
            Ok(())
        }

        fn send_paste(&mut self) -> Result<(), DeliveryError> {
            let current = self.clipboard.lock().clone().unwrap_or_default();
            self.pasted.lock().push(current);
            Ok(())
        }

        fn release_modifiers(&mut self) {}
    }

    fn fast_opts() -> DirectPasteOptions {
        DirectPasteOptions {
            flush_limit: 150,
            paste_delay: Duration::ZERO,
            focus_poll: Duration::from_millis(10),
        }
    }

    #[test]
    fn pastes_chunks_in_order_and_restores_clipboard() {
        let backend = FakeBackend::default();
        *backend.clipboard.lock() = Some("original clipboard".to_string());
        let pasted = Arc::clone(&backend.pasted);
        let clipboard = Arc::clone(&backend.clipboard);

        let mut sink = DirectPasteSink::new(Box::new(backend), fast_opts())
            .with_focus_fn(|| Some(7));
        sink.start().unwrap();
        for chunk in ["Hello, ", "wor", "ld", "!"] {
            sink.submit(Some(chunk.to_string()));
        }
        sink.submit(None);

        let status = sink.await_completion(Duration::from_secs(5));
        assert_eq!(status, SessionStatus::Complete);
        assert_eq!(pasted.lock().concat(), "Hello, world!");
        assert_eq!(
            clipboard.lock().as_deref(),
            Some("original clipboard")
        );
        assert_eq!(sink.token_count(), 4);
    }

    #[test]
    fn boundary_chunks_flush_early() {
        let backend = FakeBackend::default();
        let pasted = Arc::clone(&backend.pasted);

        let mut sink = DirectPasteSink::new(Box::new(backend), fast_opts())
            .with_focus_fn(|| Some(7));
        sink.start().unwrap();
        sink.submit(Some("First sentence. ".to_string()));
        sink.submit(Some("tail".to_string()));
        sink.submit(None);
        sink.await_completion(Duration::from_secs(5));

        let flushes = pasted.lock().clone();
        assert!(flushes.len() >= 2, "boundary should force an early flush");
        assert_eq!(flushes.concat(), "First sentence. tail");
    }

    #[test]
    fn cancellation_still_restores_the_clipboard() {
        let backend = FakeBackend::default();
        *backend.clipboard.lock() = Some("keep me".to_string());
        let clipboard = Arc::clone(&backend.clipboard);

        let mut sink = DirectPasteSink::new(Box::new(backend), fast_opts())
            .with_focus_fn(|| Some(7));
        sink.start().unwrap();
        sink.submit(Some("partial output".to_string()));
        sink.cancel_handle().cancel();

        let status = sink.await_completion(Duration::from_secs(5));
        assert_eq!(status, SessionStatus::Error);
        assert_eq!(clipboard.lock().as_deref(), Some("keep me"));
    }

    #[test]
    fn missing_sentinel_times_out_and_eventually_restores() {
        let backend = FakeBackend::default();
        *backend.clipboard.lock() = Some("before".to_string());
        let clipboard = Arc::clone(&backend.clipboard);
        let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let errors_in = Arc::clone(&errors);

        let mut sink = DirectPasteSink::new(Box::new(backend), fast_opts())
            .with_focus_fn(|| Some(7))
            .with_error_callback(move |kind, _| errors_in.lock().push(kind.to_string()));
        sink.start().unwrap();
        sink.submit(Some("never finished".to_string()));

        let status = sink.await_completion(Duration::from_millis(100));
        assert_eq!(status, SessionStatus::Timeout);
        assert!(errors.lock().contains(&"timeout".to_string()));

        // The consumer notices the stop flag at its next poll and cleans up.
        thread::sleep(Duration::from_millis(600));
        assert_eq!(clipboard.lock().as_deref(), Some("before"));
    }

    #[test]
    fn focus_loss_pauses_pasting_until_focus_returns() {
        let backend = FakeBackend::default();
        let pasted = Arc::clone(&backend.pasted);
        let focus = Arc::new(AtomicIsize::new(1));
        let focus_in = Arc::clone(&focus);

        let mut sink = DirectPasteSink::new(Box::new(backend), fast_opts())
            .with_focus_fn(move || Some(focus_in.load(Ordering::SeqCst)));
        sink.start().unwrap();

        // Focus moves to another window before any chunk arrives.
        focus.store(2, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));

        sink.submit(Some("held back ".to_string()));
        sink.submit(None);
        thread::sleep(Duration::from_millis(150));
        assert!(pasted.lock().is_empty(), "paused consumer must not paste");

        // Focus returns; delivery resumes and completes.
        focus.store(1, Ordering::SeqCst);
        let status = sink.await_completion(Duration::from_secs(5));
        assert_eq!(status, SessionStatus::Complete);
        assert_eq!(pasted.lock().concat(), "held back ");
    }
}
