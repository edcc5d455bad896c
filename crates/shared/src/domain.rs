use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: &str = "home";
pub const DEFAULT_SLIDE_WIDTH_VW: f64 = 100.0;
pub const DEFAULT_AUTOPLAY_INTERVAL_MS: u64 = 5_000;

/// One slide as every backend is normalized into.
///
/// An empty `pages` set means the slide is not scoped to any page and shows
/// everywhere; the static JSON document carries no page list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub navigate_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_link: Option<String>,
    #[serde(default)]
    pub pages: BTreeSet<String>,
    #[serde(default)]
    pub sort_order: i64,
}

impl SlideRecord {
    pub fn shows_on(&self, page: &str) -> bool {
        self.pages.is_empty() || self.pages.contains(page)
    }
}

/// Settings a backend may ship alongside its slides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_slide_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_width_vw: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeckSettings {
    pub slide_width_vw: f64,
    pub autoplay_interval_ms: u64,
}

impl Default for DeckSettings {
    fn default() -> Self {
        Self {
            slide_width_vw: DEFAULT_SLIDE_WIDTH_VW,
            autoplay_interval_ms: DEFAULT_AUTOPLAY_INTERVAL_MS,
        }
    }
}

impl DeckSettings {
    /// Remote values win over local ones; zero or negative remote values are
    /// treated as absent.
    pub fn merged_with(self, remote: Option<RemoteSettings>) -> Self {
        let Some(remote) = remote else {
            return self;
        };
        Self {
            slide_width_vw: remote
                .slide_width_vw
                .filter(|width| *width > 0.0)
                .unwrap_or(self.slide_width_vw),
            autoplay_interval_ms: remote
                .auto_slide_interval_ms
                .filter(|interval| *interval > 0)
                .unwrap_or(self.autoplay_interval_ms),
        }
    }
}
