use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub trusted_origin: String,
    pub navigate_webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".into(),
            trusted_origin: "https://usernamenotavailable12.github.io".into(),
            navigate_webhook_url: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    let path = std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
    if let Ok(raw) = fs::read_to_string(Path::new(&path)) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(err) => warn!(%path, error = %err, "ignoring unreadable relay config file"),
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.bind_addr = v.clone();
    }
    if let Some(v) = file_cfg.get("trusted_origin") {
        settings.trusted_origin = v.clone();
    }
    if let Some(v) = file_cfg.get("navigate_webhook_url") {
        settings.navigate_webhook_url = non_empty(v);
    }
}

/// Short names first, then the `RELAY__` namespaced form, which wins.
fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("RELAY_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("RELAY__BIND_ADDR") {
        settings.bind_addr = v;
    }

    if let Some(v) = var("RELAY__TRUSTED_ORIGIN") {
        settings.trusted_origin = v;
    }

    if let Some(v) = var("NAVIGATE_WEBHOOK_URL") {
        settings.navigate_webhook_url = non_empty(&v);
    }
    if let Some(v) = var("RELAY__NAVIGATE_WEBHOOK_URL") {
        settings.navigate_webhook_url = non_empty(&v);
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
