use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use shared::domain::{RemoteSettings, SlideRecord};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::SessionStore;

pub const SLIDES_CACHE_KEY: &str = "image-carousel-slides-cache";
/// Written on the first widget mount of a session.
pub const MOUNT_MARKER_KEY: &str = "image-carousel-mounted";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cached slide list under '{key}' is corrupt: {source}")]
    Corrupt {
        key: &'static str,
        #[source]
        source: JsonError,
    },
    #[error("session store failure: {0}")]
    Store(#[from] anyhow::Error),
}

/// How the page was reached, as reported by the navigation-timing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationType {
    #[default]
    Navigate,
    Reload,
    BackForward,
    Prerender,
}

impl NavigationType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "navigate" => Some(Self::Navigate),
            "reload" => Some(Self::Reload),
            "back_forward" | "back-forward" => Some(Self::BackForward),
            "prerender" => Some(Self::Prerender),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Drop the cached list when the page was hard-reloaded.
    #[default]
    HardReload,
    /// Drop the cached list on the first mount of a session only.
    FirstMountPerSession,
    /// Never read or write the cache.
    Disabled,
}

impl CachePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hard_reload" | "hard-reload" | "reload" => Some(Self::HardReload),
            "first_mount" | "first-mount" | "first_mount_per_session" => {
                Some(Self::FirstMountPerSession)
            }
            "disabled" | "off" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// What a session remembers about the last fetch: the slide list exactly as
/// the backend returned it, plus any settings it shipped alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDeck {
    pub slides: Vec<SlideRecord>,
    #[serde(default)]
    pub settings: Option<RemoteSettings>,
    /// Locale the list was fetched for.
    #[serde(default)]
    pub locale: Option<String>,
    /// Set when the backend already narrowed `slides` to this page.
    #[serde(default)]
    pub page: Option<String>,
}

impl CachedDeck {
    /// A list covering every locale and page.
    pub fn unscoped(slides: Vec<SlideRecord>, settings: Option<RemoteSettings>) -> Self {
        Self {
            slides,
            settings,
            locale: None,
            page: None,
        }
    }

    /// Whether this entry can answer a mount for `locale` and `page`.
    pub fn covers(&self, locale: &str, page: &str) -> bool {
        let matches = |scope: &Option<String>, wanted: &str| {
            scope.as_deref().map_or(true, |scoped| scoped == wanted)
        };
        matches(&self.locale, locale) && matches(&self.page, page)
    }
}

pub struct SlideCache<S> {
    store: S,
}

impl<S: SessionStore> SlideCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store_ref(&self) -> &S {
        &self.store
    }

    pub async fn load(&self) -> Result<Option<CachedDeck>, CacheError> {
        let Some(raw) = self.store.get(SLIDES_CACHE_KEY).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: SLIDES_CACHE_KEY,
                source,
            })
    }

    /// Like [`Self::load`] but a corrupt entry counts as a miss and is removed.
    pub async fn load_or_evict(&self) -> Result<Option<CachedDeck>, CacheError> {
        match self.load().await {
            Err(CacheError::Corrupt { key, source }) => {
                warn!(%key, error = %source, "discarding corrupt slide cache entry");
                self.clear().await?;
                Ok(None)
            }
            other => other,
        }
    }

    pub async fn store(&self, deck: &CachedDeck) -> Result<(), CacheError> {
        let raw = serde_json::to_string(deck).map_err(|error| CacheError::Store(error.into()))?;
        self.store.set(SLIDES_CACHE_KEY, &raw).await?;
        debug!(
            count = deck.slides.len(),
            page = deck.page.as_deref().unwrap_or("*"),
            "stored slide list in session cache"
        );
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.remove(SLIDES_CACHE_KEY).await?;
        Ok(())
    }

    /// Applies the invalidation policy for a widget mount. Returns whether the
    /// cached list was dropped.
    pub async fn prepare_for_mount(
        &self,
        policy: CachePolicy,
        navigation: NavigationType,
    ) -> Result<bool, CacheError> {
        match policy {
            CachePolicy::Disabled => Ok(false),
            CachePolicy::HardReload => {
                if navigation == NavigationType::Reload {
                    info!("hard reload detected, clearing slide cache");
                    self.clear().await?;
                    return Ok(true);
                }
                Ok(false)
            }
            CachePolicy::FirstMountPerSession => {
                if self.store.get(MOUNT_MARKER_KEY).await?.is_some() {
                    return Ok(false);
                }
                info!("first mount in session, clearing slide cache");
                self.clear().await?;
                self.store.set(MOUNT_MARKER_KEY, "1").await?;
                Ok(true)
            }
        }
    }
}
