use std::{collections::HashMap, fs, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use carousel_core::gesture::{GestureConfig, DEFAULT_SLIDE_THRESHOLD_PX, DEFAULT_TAP_THRESHOLD_PX};
use shared::domain::{DeckSettings, DEFAULT_AUTOPLAY_INTERVAL_MS, DEFAULT_SLIDE_WIDTH_VW};
use slide_source::{BackendKind, RetryPolicy};
use storage::CachePolicy;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "carousel.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: BackendKind,
    pub static_document_url: String,
    pub hygraph_endpoint: String,
    pub hygraph_settings_id: String,
    pub link_base_url: String,
    pub takeshape_endpoint: String,
    pub takeshape_token: Option<String>,
    pub image_base_url: String,
    pub autoplay_interval_ms: u64,
    pub slide_width_vw: f64,
    pub viewport_width_px: f64,
    pub tap_threshold_px: f64,
    pub slide_threshold_px: f64,
    pub fetch_timeout_ms: u64,
    pub retry_attempts: usize,
    pub retry_backoff_ms: u64,
    pub cache_database_url: String,
    pub cache_policy: CachePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: BackendKind::StaticJson,
            static_document_url: "https://usernamenotavailable12.github.io/Slider/slidesData.json"
                .into(),
            hygraph_endpoint:
                "https://eu-west-2.cdn.hygraph.com/content/cm81rsh8f01ni07uowrtk7da5/master".into(),
            hygraph_settings_id: "cm8mrleg9rsya07mem4ovwjcc".into(),
            link_base_url: "https://www.ambassadoribet.com/".into(),
            takeshape_endpoint:
                "https://api.takeshape.io/project/f2b70d9b-56f9-4d2d-be98-874fcbc02a46/production/graphql"
                    .into(),
            takeshape_token: None,
            image_base_url: "https://www.ambassadoribet.com/_internal/ts-images/".into(),
            autoplay_interval_ms: DEFAULT_AUTOPLAY_INTERVAL_MS,
            slide_width_vw: DEFAULT_SLIDE_WIDTH_VW,
            viewport_width_px: 1280.0,
            tap_threshold_px: DEFAULT_TAP_THRESHOLD_PX,
            slide_threshold_px: DEFAULT_SLIDE_THRESHOLD_PX,
            fetch_timeout_ms: 10_000,
            retry_attempts: 3,
            retry_backoff_ms: 250,
            cache_database_url: "sqlite://./data/carousel-cache.db".into(),
            cache_policy: CachePolicy::HardReload,
        }
    }
}

impl Settings {
    pub fn deck_settings(&self) -> DeckSettings {
        DeckSettings {
            slide_width_vw: self.slide_width_vw,
            autoplay_interval_ms: self.autoplay_interval_ms,
        }
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            tap_threshold_px: self.tap_threshold_px,
            slide_threshold_px: self.slide_threshold_px,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

/// Defaults, then the TOML file at `path` (if any), then `CAROUSEL__*` env.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, explicit) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg = parse_file(&raw)
                .with_context(|| format!("failed to parse config '{}'", path.display()))?;
            apply(&mut settings, |key| file_cfg.get(key).cloned());
        }
        Err(err) if explicit => {
            return Err(err).with_context(|| format!("failed to read config '{}'", path.display()))
        }
        Err(_) => {}
    }

    apply(&mut settings, |key| {
        std::env::var(format!("CAROUSEL__{}", key.to_ascii_uppercase())).ok()
    });
    Ok(settings)
}

/// Flattens top-level TOML values to strings so numbers may be written bare.
fn parse_file(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let table = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    Ok(table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

fn apply(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("source") {
        set_parsed(&mut settings.source, "source", &v);
    }
    if let Some(v) = var("static_document_url") {
        settings.static_document_url = v;
    }
    if let Some(v) = var("hygraph_endpoint") {
        settings.hygraph_endpoint = v;
    }
    if let Some(v) = var("hygraph_settings_id") {
        settings.hygraph_settings_id = v;
    }
    if let Some(v) = var("link_base_url") {
        settings.link_base_url = v;
    }
    if let Some(v) = var("takeshape_endpoint") {
        settings.takeshape_endpoint = v;
    }
    if let Some(v) = var("takeshape_token") {
        let v = v.trim();
        settings.takeshape_token = (!v.is_empty()).then(|| v.to_string());
    }
    if let Some(v) = var("image_base_url") {
        settings.image_base_url = v;
    }
    if let Some(v) = var("autoplay_interval_ms") {
        set_parsed(&mut settings.autoplay_interval_ms, "autoplay_interval_ms", &v);
    }
    if let Some(v) = var("slide_width_vw") {
        set_positive(&mut settings.slide_width_vw, "slide_width_vw", &v);
    }
    if let Some(v) = var("viewport_width_px") {
        set_positive(&mut settings.viewport_width_px, "viewport_width_px", &v);
    }
    if let Some(v) = var("tap_threshold_px") {
        set_parsed(&mut settings.tap_threshold_px, "tap_threshold_px", &v);
    }
    if let Some(v) = var("slide_threshold_px") {
        set_parsed(&mut settings.slide_threshold_px, "slide_threshold_px", &v);
    }
    if let Some(v) = var("fetch_timeout_ms") {
        set_parsed(&mut settings.fetch_timeout_ms, "fetch_timeout_ms", &v);
    }
    if let Some(v) = var("retry_attempts") {
        set_parsed(&mut settings.retry_attempts, "retry_attempts", &v);
    }
    if let Some(v) = var("retry_backoff_ms") {
        set_parsed(&mut settings.retry_backoff_ms, "retry_backoff_ms", &v);
    }
    if let Some(v) = var("cache_database_url") {
        settings.cache_database_url = v;
    }
    if let Some(v) = var("cache_policy") {
        match CachePolicy::parse(&v) {
            Some(policy) => settings.cache_policy = policy,
            None => warn!(value = %v, "ignoring unknown cache_policy"),
        }
    }
}

fn set_parsed<T: FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = raw, "ignoring invalid setting"),
    }
}

/// Widths feed offsets and hit-testing; zero or negative values are ignored.
fn set_positive(slot: &mut f64, key: &str, raw: &str) {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => *slot = value,
        _ => warn!(key, value = raw, "ignoring invalid setting"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
