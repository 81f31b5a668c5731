use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "notes.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub debounce_ms: u64,
    pub per_page: u32,
    pub notification_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000/api".into(),
            debounce_ms: 1000,
            per_page: 12,
            notification_capacity: 64,
        }
    }
}

impl ClientSettings {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Defaults, then `notes.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(DEFAULT_SETTINGS_FILE) {
        match parse_settings_file(&raw) {
            Ok(file_cfg) => apply_file_overrides(&mut settings, &file_cfg),
            Err(err) => warn!("config: ignoring {DEFAULT_SETTINGS_FILE}: {err}"),
        }
    }
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());

    settings
}

/// Like [`load_settings`] but with an explicit file that must exist.
pub fn load_settings_file(path: &Path) -> anyhow::Result<ClientSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let file_cfg = parse_settings_file(&raw)
        .with_context(|| format!("settings file '{}' is not a flat string table", path.display()))?;

    let mut settings = ClientSettings::default();
    apply_file_overrides(&mut settings, &file_cfg);
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn parse_settings_file(raw: &str) -> Result<HashMap<String, String>, toml::de::Error> {
    toml::from_str(raw)
}

pub(crate) fn apply_file_overrides(settings: &mut ClientSettings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = normalize_api_base_url(v);
    }
    if let Some(v) = file_cfg.get("debounce_ms").and_then(|v| v.parse().ok()) {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.get("per_page").and_then(|v| v.parse().ok()) {
        settings.per_page = v;
    }
}

pub(crate) fn apply_env_overrides(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("NOTES_API_URL") {
        settings.api_base_url = normalize_api_base_url(&v);
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = normalize_api_base_url(&v);
    }

    if let Some(v) = lookup("APP__DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
        settings.debounce_ms = v;
    }

    if let Some(v) = lookup("APP__PER_PAGE").and_then(|v| v.parse::<u32>().ok()) {
        if v > 0 {
            settings.per_page = v;
        }
    }
}

pub fn normalize_api_base_url(raw: &str) -> String {
    let raw = raw.trim();

    if raw.is_empty() {
        return ClientSettings::default().api_base_url;
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    with_scheme.trim_end_matches('/').to_string()
}
