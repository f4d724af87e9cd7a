use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use clap::ValueEnum;
use client_core::{DEFAULT_API_BASE_URL, DEFAULT_COMMIT_PATH};
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "artchain.toml";
const DEFAULT_DATABASE_URL: &str = "sqlite://./data/artchain.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    #[default]
    Placeholder,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub database_url: String,
    pub commit_mode: CommitMode,
    pub commit_path: String,
    pub commit_delay_ms: u64,
    pub success_display_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            database_url: DEFAULT_DATABASE_URL.into(),
            commit_mode: CommitMode::Placeholder,
            commit_path: DEFAULT_COMMIT_PATH.into(),
            commit_delay_ms: 2000,
            success_display_delay_ms: 2000,
        }
    }
}

impl Settings {
    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    pub fn success_display_delay(&self) -> Duration {
        Duration::from_millis(self.success_display_delay_ms)
    }
}

/// Every key is optional in the file; missing ones keep their defaults.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    database_url: Option<String>,
    commit_mode: Option<CommitMode>,
    commit_path: Option<String>,
    commit_delay_ms: Option<u64>,
    success_display_delay_ms: Option<u64>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file if present, then the environment.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = v;
        }
        if let Some(v) = file_cfg.database_url {
            settings.database_url = v;
        }
        if let Some(v) = file_cfg.commit_mode {
            settings.commit_mode = v;
        }
        if let Some(v) = file_cfg.commit_path {
            settings.commit_path = v;
        }
        if let Some(v) = file_cfg.commit_delay_ms {
            settings.commit_delay_ms = v;
        }
        if let Some(v) = file_cfg.success_display_delay_ms {
            settings.success_display_delay_ms = v;
        }
    }

    // Later names take precedence.
    for key in ["ARTCHAIN_API_BASE_URL", "VITE_API_BASE_URL", "APP__API_BASE_URL"] {
        if let Some(v) = env(key).filter(|v| !v.trim().is_empty()) {
            settings.api_base_url = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    if let Some(v) = env("APP__COMMIT_MODE") {
        settings.commit_mode = CommitMode::from_str(&v, true)
            .map_err(|e| anyhow::anyhow!("invalid APP__COMMIT_MODE '{v}': {e}"))?;
    }
    if let Some(v) = env("APP__COMMIT_PATH") {
        settings.commit_path = v;
    }
    if let Some(v) = env("APP__COMMIT_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.commit_delay_ms = parsed;
        }
    }
    if let Some(v) = env("APP__SUCCESS_DISPLAY_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.success_display_delay_ms = parsed;
        }
    }

    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    format!("sqlite://{path}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
