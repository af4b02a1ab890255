use std::{fs, path::Path, time::Duration};

use feed_core::{ClientConfig, DEFAULT_AUTHOR_NAME};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "feed.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_url: String,
    pub store_anon_key: String,
    pub moderation_url: Option<String>,
    pub moderation_timeout_ms: u64,
    pub store_timeout_ms: u64,
    pub author_name: String,
    pub moderation_model_label: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: "http://127.0.0.1:54321".into(),
            store_anon_key: String::new(),
            moderation_url: Some("http://127.0.0.1:8000".into()),
            moderation_timeout_ms: 5_000,
            store_timeout_ms: 10_000,
            author_name: DEFAULT_AUTHOR_NAME.into(),
            moderation_model_label: "PhoBERT-Toxic".into(),
        }
    }
}

impl Settings {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            store_url: self.store_url.clone(),
            store_api_key: self.store_anon_key.clone(),
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            moderation_url: self.moderation_url.clone(),
            moderation_timeout: Duration::from_millis(self.moderation_timeout_ms),
            author_name: self.author_name.clone(),
        }
    }

    fn set(&mut self, key: &str, value: String) {
        match key {
            "store_url" => self.store_url = value,
            "store_anon_key" => self.store_anon_key = value,
            "moderation_url" => self.moderation_url = moderation_url(value),
            "moderation_timeout_ms" => {
                if let Some(ms) = parse_millis(key, &value) {
                    self.moderation_timeout_ms = ms;
                }
            }
            "store_timeout_ms" => {
                if let Some(ms) = parse_millis(key, &value) {
                    self.store_timeout_ms = ms;
                }
            }
            "author_name" => {
                if !value.trim().is_empty() {
                    self.author_name = value;
                }
            }
            "moderation_model_label" => self.moderation_model_label = value,
            other => warn!(key = other, "ignoring unknown setting"),
        }
    }
}

/// Environment names per setting, lowest precedence first.
const ENV_KEYS: &[(&str, &[&str])] = &[
    (
        "store_url",
        &["NEXT_PUBLIC_SUPABASE_URL", "FEED_STORE_URL", "APP__STORE_URL"],
    ),
    (
        "store_anon_key",
        &[
            "NEXT_PUBLIC_SUPABASE_ANON_KEY",
            "FEED_STORE_ANON_KEY",
            "APP__STORE_ANON_KEY",
        ],
    ),
    ("moderation_url", &["FEED_MODERATION_URL", "APP__MODERATION_URL"]),
    (
        "moderation_timeout_ms",
        &["FEED_MODERATION_TIMEOUT_MS", "APP__MODERATION_TIMEOUT_MS"],
    ),
    (
        "store_timeout_ms",
        &["FEED_STORE_TIMEOUT_MS", "APP__STORE_TIMEOUT_MS"],
    ),
    ("author_name", &["FEED_AUTHOR_NAME", "APP__AUTHOR_NAME"]),
    (
        "moderation_model_label",
        &["FEED_MODERATION_MODEL_LABEL", "APP__MODERATION_MODEL_LABEL"],
    ),
];

pub fn load_settings(path: &Path) -> Settings {
    let raw = fs::read_to_string(path).ok();
    load_settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<toml::Table>(raw) {
            Ok(table) => {
                for (key, value) in table {
                    match value_as_string(&value) {
                        Some(value) => settings.set(&key, value),
                        None => warn!(key = %key, "ignoring non-scalar setting"),
                    }
                }
            }
            Err(err) => warn!(error = %err, "ignoring unreadable config file"),
        }
    }

    for (key, names) in ENV_KEYS {
        for name in *names {
            if let Some(value) = env(name) {
                settings.set(key, value);
            }
        }
    }

    settings
}

fn value_as_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Empty, `off` or `none` disables the gate, which then fails open.
fn moderation_url(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("off")
        || trimmed.eq_ignore_ascii_case("none")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_millis(key: &str, value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(ms),
        _ => {
            warn!(key, value, "ignoring invalid timeout");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
