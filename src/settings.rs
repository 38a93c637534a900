use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Optional overrides read from disk. Every field falls back to the CLI/env
/// value or the built-in default when absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistentSettings {
    pub api_url: Option<String>,
    pub runs_path: Option<String>,
    pub refresh_interval_ms: Option<u64>,
    pub status_interval_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nottofu").join("dashboard.json"))
}

pub fn load_settings(path: &Path) -> PersistentSettings {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring invalid settings file {:?}: {}", path, e);
                PersistentSettings::default()
            }
        },
        Err(e) => {
            debug!("No settings loaded from {:?}: {}", path, e);
            PersistentSettings::default()
        }
    }
}
