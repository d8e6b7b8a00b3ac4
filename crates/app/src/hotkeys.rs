//! Global hotkey listening via a raw input hook.
//!
//! Combo specs come from settings as `"ctrl+alt+."`-style strings. The
//! listener tracks modifier state itself and fires the orchestrator's
//! entry points; everything heavier happens on the request worker
//! thread, so the event hook stays responsive.

use anyhow::{anyhow, Context};
use engine::{Orchestrator, TriggerKind};
use rdev::{EventType, Key};
use shared::settings::HotkeySettings;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Combo {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub key: Key,
}

pub fn parse_combo(spec: &str) -> Option<Combo> {
    let mut ctrl = false;
    let mut alt = false;
    let mut shift = false;
    let mut key = None;

    for part in spec.split('+') {
        match part.trim().to_lowercase().as_str() {
            "ctrl" | "control" => ctrl = true,
            "alt" => alt = true,
            "shift" => shift = true,
            other => key = named_key(other),
        }
    }
    key.map(|key| Combo {
        ctrl,
        alt,
        shift,
        key,
    })
}

fn named_key(name: &str) -> Option<Key> {
    let key = match name {
        "." => Key::Dot,
        "/" => Key::Slash,
        "," => Key::Comma,
        ";" => Key::SemiColon,
        "space" => Key::Space,
        "enter" | "return" => Key::Return,
        "esc" | "escape" => Key::Escape,
        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "f" => Key::KeyF,
        "g" => Key::KeyG,
        "h" => Key::KeyH,
        "i" => Key::KeyI,
        "j" => Key::KeyJ,
        "k" => Key::KeyK,
        "l" => Key::KeyL,
        "m" => Key::KeyM,
        "n" => Key::KeyN,
        "o" => Key::KeyO,
        "p" => Key::KeyP,
        "q" => Key::KeyQ,
        "r" => Key::KeyR,
        "s" => Key::KeyS,
        "t" => Key::KeyT,
        "u" => Key::KeyU,
        "v" => Key::KeyV,
        "w" => Key::KeyW,
        "x" => Key::KeyX,
        "y" => Key::KeyY,
        "z" => Key::KeyZ,
        _ => return None,
    };
    Some(key)
}

fn combo_matches(combo: &Combo, key: Key, ctrl: bool, alt: bool, shift: bool) -> bool {
    combo.key == key && combo.ctrl == ctrl && combo.alt == alt && combo.shift == shift
}

/// Run the listener on the current thread. Blocks for the lifetime of
/// the process.
pub fn run(orchestrator: Arc<Orchestrator>, hotkeys: &HotkeySettings) -> anyhow::Result<()> {
    let trigger = parse_combo(&hotkeys.trigger)
        .with_context(|| format!("unparseable hotkey `{}`", hotkeys.trigger))?;
    let clipboard = parse_combo(&hotkeys.clipboard_trigger)
        .with_context(|| format!("unparseable hotkey `{}`", hotkeys.clipboard_trigger))?;
    let cancel = parse_combo(&hotkeys.cancel)
        .with_context(|| format!("unparseable hotkey `{}`", hotkeys.cancel))?;

    info!(
        "hotkeys ready: {} (selection), {} (clipboard), {} (cancel)",
        hotkeys.trigger, hotkeys.clipboard_trigger, hotkeys.cancel
    );

    let mut ctrl = false;
    let mut alt = false;
    let mut shift = false;
    rdev::listen(move |event| match event.event_type {
        EventType::KeyPress(key) => match key {
            Key::ControlLeft | Key::ControlRight => ctrl = true,
            Key::Alt | Key::AltGr => alt = true,
            Key::ShiftLeft | Key::ShiftRight => shift = true,
            key => {
                if combo_matches(&trigger, key, ctrl, alt, shift) {
                    orchestrator.trigger(TriggerKind::Selection);
                } else if combo_matches(&clipboard, key, ctrl, alt, shift) {
                    orchestrator.trigger(TriggerKind::Clipboard);
                } else if combo_matches(&cancel, key, ctrl, alt, shift) {
                    orchestrator.cancel_active();
                }
            }
        },
        EventType::KeyRelease(key) => match key {
            Key::ControlLeft | Key::ControlRight => ctrl = false,
            Key::Alt | Key::AltGr => alt = false,
            Key::ShiftLeft | Key::ShiftRight => shift = false,
            _ => {}
        },
        _ => {}
    })
    .map_err(|err| anyhow!("hotkey listener failed: {err:?}"))
}
