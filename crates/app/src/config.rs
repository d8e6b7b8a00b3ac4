//! Settings persistence: one JSON file in the platform config dir.

use shared::settings::AppSettings;
use std::path::PathBuf;
use tracing::{info, warn};

pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "flick", "flick")
        .map(|dirs| dirs.config_dir().join("settings.json"))
}

pub fn history_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "flick", "flick")
        .map(|dirs| dirs.data_dir().join("history.json"))
}

/// Load settings, falling back to defaults on a missing or unreadable
/// file. A fresh default file is written on first run so users have
/// something to edit.
pub fn load_settings_or_default() -> AppSettings {
    let Some(path) = config_path() else {
        warn!("no config directory available, using default settings");
        return AppSettings::default();
    };

    if let Ok(contents) = std::fs::read_to_string(&path) {
        match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => return settings,
            Err(err) => {
                warn!("could not parse {}: {err}; using defaults", path.display());
                return AppSettings::default();
            }
        }
    }

    let settings = AppSettings::default();
    save_settings(&settings);
    info!("wrote default settings to {}", path.display());
    settings
}

pub fn save_settings(settings: &AppSettings) {
    let Some(path) = config_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(settings) {
        Ok(json) => {
            if let Err(err) = std::fs::write(&path, json) {
                warn!("could not save settings: {err}");
            }
        }
        Err(err) => warn!("could not serialize settings: {err}"),
    }
}
