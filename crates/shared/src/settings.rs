//! Application settings.
//!
//! Every field carries a serde default so that a missing or partially
//! written `settings.json` always deserializes into a working
//! configuration.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_selected_model() -> String {
    "ollama:llama3.2:latest".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_streaming_timeout() -> u64 {
    120
}

fn default_memory_max() -> usize {
    50
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Stream into the floating overlay window.
    #[default]
    Popup,
    /// Paste the stream directly into the focused application.
    DirectStream,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "ProviderSettings::default_ollama_base")]
    pub ollama_base_url: String,
    #[serde(default = "ProviderSettings::default_lmstudio_base")]
    pub lmstudio_base_url: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_base_url: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
}

impl ProviderSettings {
    fn default_ollama_base() -> String {
        "http://localhost:11434".to_string()
    }

    fn default_lmstudio_base() -> String {
        "http://localhost:1234".to_string()
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            ollama_base_url: Self::default_ollama_base(),
            lmstudio_base_url: Self::default_lmstudio_base(),
            openai_api_key: None,
            openai_base_url: None,
            gemini_api_key: None,
        }
    }
}

/// Which models may receive images. Substring matching against model
/// names is inherently fuzzy, so the rules live here as data rather than
/// in code: explicit allow/deny lists win, then name keywords are used as
/// a heuristic for local models whose capabilities cannot be queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultimodalSettings {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default = "MultimodalSettings::default_keywords")]
    pub keywords: Vec<String>,
}

impl MultimodalSettings {
    fn default_keywords() -> Vec<String> {
        ["vision", "llava", "bakllava", "moondream", "minicpm-v"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl Default for MultimodalSettings {
    fn default() -> Self {
        Self {
            allow: Vec::new(),
            deny: Vec::new(),
            keywords: Self::default_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeySettings {
    /// Primary trigger: capture the active selection.
    #[serde(default = "HotkeySettings::default_trigger")]
    pub trigger: String,
    /// Secondary trigger: use clipboard content as context.
    #[serde(default = "HotkeySettings::default_clipboard_trigger")]
    pub clipboard_trigger: String,
    /// Cancels an in-flight delivery.
    #[serde(default = "HotkeySettings::default_cancel")]
    pub cancel: String,
}

impl HotkeySettings {
    fn default_trigger() -> String {
        "ctrl+alt+.".to_string()
    }

    fn default_clipboard_trigger() -> String {
        "ctrl+alt+/".to_string()
    }

    fn default_cancel() -> String {
        "esc".to_string()
    }
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            trigger: Self::default_trigger(),
            clipboard_trigger: Self::default_clipboard_trigger(),
            cancel: Self::default_cancel(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteSettings {
    /// Flush the paste buffer once it holds this many characters.
    #[serde(default = "PasteSettings::default_flush_limit")]
    pub flush_limit: usize,
    /// Delay after each simulated paste, ms.
    #[serde(default = "PasteSettings::default_paste_delay_ms")]
    pub paste_delay_ms: u64,
    /// Foreground-window poll interval for the focus monitor, ms.
    #[serde(default = "PasteSettings::default_focus_poll_ms")]
    pub focus_poll_ms: u64,
}

impl PasteSettings {
    fn default_flush_limit() -> usize {
        150
    }

    fn default_paste_delay_ms() -> u64 {
        50
    }

    fn default_focus_poll_ms() -> u64 {
        250
    }
}

impl Default for PasteSettings {
    fn default() -> Self {
        Self {
            flush_limit: Self::default_flush_limit(),
            paste_delay_ms: Self::default_paste_delay_ms(),
            focus_poll_ms: Self::default_focus_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// `"<provider>:<model-name>"`, e.g. `"ollama:llama3.2:latest"`.
    #[serde(default = "default_selected_model")]
    pub selected_model: String,
    #[serde(default)]
    pub output_mode: OutputMode,
    #[serde(default = "default_true")]
    pub enable_retry: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_streaming_timeout")]
    pub streaming_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub memory_enabled: bool,
    #[serde(default = "default_memory_max")]
    pub memory_max_messages: usize,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub providers: ProviderSettings,
    #[serde(default)]
    pub multimodal: MultimodalSettings,
    #[serde(default)]
    pub hotkeys: HotkeySettings,
    #[serde(default)]
    pub paste: PasteSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        // Deserializing an empty object applies every field default.
        serde_json::from_str("{}").expect("defaults are total")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let s: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.selected_model, "ollama:llama3.2:latest");
        assert_eq!(s.output_mode, OutputMode::Popup);
        assert!(s.enable_retry);
        assert_eq!(s.max_retries, 2);
        assert_eq!(s.streaming_timeout_secs, 120);
        assert!(s.memory_enabled);
        assert_eq!(s.memory_max_messages, 50);
        assert_eq!(s.paste.flush_limit, 150);
        assert_eq!(s.hotkeys.trigger, "ctrl+alt+.");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let s: AppSettings = serde_json::from_str(
            r#"{"selected_model":"openai:gpt-4o","output_mode":"direct_stream","max_retries":5}"#,
        )
        .unwrap();
        assert_eq!(s.selected_model, "openai:gpt-4o");
        assert_eq!(s.output_mode, OutputMode::DirectStream);
        assert_eq!(s.max_retries, 5);
        assert_eq!(s.memory_max_messages, 50);
    }

    #[test]
    fn settings_round_trip() {
        let mut s = AppSettings::default();
        s.providers.gemini_api_key = Some("k".into());
        s.multimodal.deny.push("llava:7b-broken".into());
        let json = serde_json::to_string_pretty(&s).unwrap();
        let back: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.providers.gemini_api_key.as_deref(), Some("k"));
        assert_eq!(back.multimodal.deny, vec!["llava:7b-broken".to_string()]);
    }
}
