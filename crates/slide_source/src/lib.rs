use std::{fmt, str::FromStr, time::Duration};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::domain::{RemoteSettings, SlideRecord, DEFAULT_PAGE};
use thiserror::Error;
use url::Url;

mod hygraph;
mod loader;
mod static_json;
mod takeshape;

pub use hygraph::{HygraphConfig, HygraphSource};
pub use loader::{DeckContent, LoaderOptions, RetryPolicy, SlideLoader};
pub use static_json::{StaticJsonConfig, StaticJsonSource};
pub use takeshape::{TakeShapeConfig, TakeShapeSource};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("slide fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("malformed payload from {backend}: {message}")]
    MalformedPayload {
        backend: BackendKind,
        message: String,
    },
    #[error("slide fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("unknown slide backend '{0}'")]
    UnknownBackend(String),
}

impl SourceError {
    pub fn malformed(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            backend,
            message: message.into(),
        }
    }

    /// Transport problems may go away on their own; a payload of the wrong
    /// shape will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    StaticJson,
    Hygraph,
    TakeShape,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StaticJson => "static",
            Self::Hygraph => "hygraph",
            Self::TakeShape => "takeshape",
        }
    }

    /// Locale used when the page URL carries no `lang` parameter.
    pub fn default_locale(self) -> &'static str {
        match self {
            Self::StaticJson | Self::Hygraph => "en",
            Self::TakeShape => "ka",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = SourceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "static" | "static_json" | "json" => Ok(Self::StaticJson),
            "hygraph" => Ok(Self::Hygraph),
            "takeshape" => Ok(Self::TakeShape),
            other => Err(SourceError::UnknownBackend(other.to_string())),
        }
    }
}

/// Locale and page the carousel is embedded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub locale: String,
    pub page: String,
}

impl PageQuery {
    pub fn new(locale: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            page: page.into(),
        }
    }

    /// Reads `lang` and `page` from the embedding page's query string. Missing
    /// or empty values fall back to `default_locale` and `home`.
    pub fn from_url(url: &Url, default_locale: &str) -> Self {
        let mut locale = None;
        let mut page = None;
        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "lang" if locale.is_none() => locale = Some(value.to_string()),
                "page" if page.is_none() => page = Some(value.to_string()),
                _ => {}
            }
        }
        Self {
            locale: locale.unwrap_or_else(|| default_locale.to_string()),
            page: page.unwrap_or_else(|| DEFAULT_PAGE.to_string()),
        }
    }
}

/// Everything a backend returns for one locale, before page filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePayload {
    pub slides: Vec<SlideRecord>,
    pub settings: Option<RemoteSettings>,
}

#[async_trait]
pub trait SlideSource: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// True when `fetch_all` only returns the slides for `query.page`.
    fn filters_by_page(&self) -> bool {
        false
    }

    async fn fetch_all(&self, query: &PageQuery) -> Result<SourcePayload, SourceError>;
}

/// Keeps the slides shown on `page`, ordered by `sort_order`. The sort is
/// stable so equal orders keep their source order.
pub fn filter_and_sort(slides: Vec<SlideRecord>, page: &str) -> Vec<SlideRecord> {
    let mut visible: Vec<SlideRecord> = slides
        .into_iter()
        .filter(|slide| slide.shows_on(page))
        .collect();
    visible.sort_by_key(|slide| slide.sort_order);
    visible
}

/// Resolves a CMS link against `base`. Absolute links are kept; relative ones
/// are joined with exactly one `/` whether or not `base` ends in one.
pub fn join_link(base: &str, href: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

pub(crate) fn parse_payload<T: DeserializeOwned>(
    backend: BackendKind,
    body: &[u8],
) -> Result<T, SourceError> {
    serde_json::from_slice(body).map_err(|error| SourceError::malformed(backend, error.to_string()))
}

/// Backends send `""` where they mean "no value".
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    pub(crate) fn into_data(self, backend: BackendKind) -> Result<T, SourceError> {
        match self.data {
            Some(data) => Ok(data),
            None if self.errors.is_empty() => Err(SourceError::malformed(backend, "no data from CMS")),
            None => {
                let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
                Err(SourceError::malformed(backend, messages.join("; ")))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
