use std::{sync::Arc, time::Duration};

use shared::domain::{RemoteSettings, SlideRecord};
use storage::{CachePolicy, CachedDeck, NavigationType, SessionStore, SlideCache};
use tracing::{debug, error, info, warn};

use crate::{filter_and_sort, PageQuery, SlideSource, SourceError, SourcePayload};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RETRY_ATTEMPTS: usize = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff: DEFAULT_RETRY_BACKOFF,
            max_backoff: MAX_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the `attempt`-th failure (1-based), doubling each time.
    pub fn backoff_after(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cache_policy: CachePolicy,
    pub navigation: NavigationType,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            retry: RetryPolicy::default(),
            cache_policy: CachePolicy::default(),
            navigation: NavigationType::default(),
        }
    }
}

/// What the widget mounts with: a deck's worth of slides, or a visible
/// empty state with the reason it could not be filled.
#[derive(Debug, Clone, PartialEq)]
pub enum DeckContent {
    Ready {
        slides: Vec<SlideRecord>,
        settings: Option<RemoteSettings>,
        from_cache: bool,
    },
    Unavailable {
        reason: String,
    },
}

impl DeckContent {
    pub fn slides(&self) -> &[SlideRecord] {
        match self {
            Self::Ready { slides, .. } => slides,
            Self::Unavailable { .. } => &[],
        }
    }

    pub fn settings(&self) -> Option<RemoteSettings> {
        match self {
            Self::Ready { settings, .. } => *settings,
            Self::Unavailable { .. } => None,
        }
    }
}

pub struct SlideLoader<S> {
    source: Arc<dyn SlideSource>,
    cache: Option<SlideCache<S>>,
    options: LoaderOptions,
}

impl<S: SessionStore> SlideLoader<S> {
    pub fn new(
        source: Arc<dyn SlideSource>,
        cache: Option<SlideCache<S>>,
        options: LoaderOptions,
    ) -> Self {
        let cache = cache.filter(|_| options.cache_policy != CachePolicy::Disabled);
        Self {
            source,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> Option<&SlideCache<S>> {
        self.cache.as_ref()
    }

    /// Loads the deck for a page, turning every failure into
    /// [`DeckContent::Unavailable`] after logging it.
    pub async fn load(&self, query: &PageQuery) -> DeckContent {
        match self.try_load(query).await {
            Ok(content) => content,
            Err(err) => {
                error!(
                    backend = %self.source.backend(),
                    locale = %query.locale,
                    page = %query.page,
                    error = %err,
                    "slide load failed; mounting empty carousel"
                );
                DeckContent::Unavailable {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub async fn try_load(&self, query: &PageQuery) -> Result<DeckContent, SourceError> {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache
                .prepare_for_mount(self.options.cache_policy, self.options.navigation)
                .await
            {
                warn!(error = %err, "slide cache invalidation failed");
            }

            match cache.load_or_evict().await {
                Ok(Some(cached)) if cached.covers(&query.locale, &query.page) => {
                    info!(
                        count = cached.slides.len(),
                        locale = %query.locale,
                        page = %query.page,
                        "serving slides from session cache"
                    );
                    return Ok(DeckContent::Ready {
                        slides: filter_and_sort(cached.slides, &query.page),
                        settings: cached.settings,
                        from_cache: true,
                    });
                }
                Ok(Some(cached)) => debug!(
                    cached_locale = cached.locale.as_deref().unwrap_or("*"),
                    cached_page = cached.page.as_deref().unwrap_or("*"),
                    "cached slides belong to another locale or page; refetching"
                ),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "slide cache read failed; fetching"),
            }
        }

        let payload = self.fetch_with_retry(query).await?;

        if let Some(cache) = &self.cache {
            let entry = CachedDeck {
                slides: payload.slides.clone(),
                settings: payload.settings,
                locale: Some(query.locale.clone()),
                page: self
                    .source
                    .filters_by_page()
                    .then(|| query.page.clone()),
            };
            if let Err(err) = cache.store(&entry).await {
                warn!(error = %err, "failed to cache slide list");
            }
        }

        Ok(DeckContent::Ready {
            slides: filter_and_sort(payload.slides, &query.page),
            settings: payload.settings,
            from_cache: false,
        })
    }

    async fn fetch_with_retry(&self, query: &PageQuery) -> Result<SourcePayload, SourceError> {
        let max_attempts = self.options.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = tokio::time::timeout(self.options.timeout, self.source.fetch_all(query))
                .await
                .unwrap_or_else(|_| Err(SourceError::Timeout(self.options.timeout)));

            match result {
                Ok(payload) => return Ok(payload),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.options.retry.backoff_after(attempt);
                    warn!(
                        backend = %self.source.backend(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "slide fetch failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/loader_tests.rs"]
mod tests;
