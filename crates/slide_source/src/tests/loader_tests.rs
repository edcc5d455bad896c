use super::*;
use std::{
    collections::{BTreeSet, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use shared::domain::DeckSettings;
use storage::{CachedDeck, MemorySessionStore, SLIDES_CACHE_KEY};
use tokio::sync::Mutex;

use crate::{BackendKind, HygraphConfig, HygraphSource};

enum Scripted {
    Slides(Vec<SlideRecord>),
    Timeout,
    Malformed,
    Hang,
}

struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlideSource for ScriptedSource {
    fn backend(&self) -> BackendKind {
        BackendKind::StaticJson
    }

    async fn fetch_all(&self, _query: &PageQuery) -> Result<SourcePayload, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().await.pop_front();
        match next {
            Some(Scripted::Slides(slides)) => Ok(SourcePayload {
                slides,
                settings: Some(RemoteSettings {
                    auto_slide_interval_ms: Some(3_000),
                    slide_width_vw: None,
                }),
            }),
            Some(Scripted::Timeout) => Err(SourceError::Timeout(Duration::from_millis(5))),
            Some(Scripted::Malformed) => Err(SourceError::malformed(BackendKind::StaticJson, "bad")),
            Some(Scripted::Hang) | None => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(SourceError::Timeout(Duration::from_secs(3_600)))
            }
        }
    }
}

fn slide(target: &str, page: &str, sort_order: i64) -> SlideRecord {
    SlideRecord {
        image_url: format!("https://cdn.test/{target}.png"),
        mobile_image_url: None,
        caption: None,
        navigate_target: target.to_string(),
        optional_link: None,
        pages: [page.to_string()].into_iter().collect::<BTreeSet<_>>(),
        sort_order,
    }
}

fn deck() -> Vec<SlideRecord> {
    vec![
        slide("sport", "sport", 0),
        slide("casino", "home", 2),
        slide("live", "home", 1),
    ]
}

fn loader(
    source: Arc<ScriptedSource>,
    store: Option<MemorySessionStore>,
    options: LoaderOptions,
) -> SlideLoader<MemorySessionStore> {
    SlideLoader::new(source, store.map(SlideCache::new), options)
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let retry = RetryPolicy {
        max_attempts: 10,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(500),
    };
    assert_eq!(retry.backoff_after(1), Duration::from_millis(100));
    assert_eq!(retry.backoff_after(2), Duration::from_millis(200));
    assert_eq!(retry.backoff_after(3), Duration::from_millis(400));
    assert_eq!(retry.backoff_after(4), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn fetch_filters_sorts_and_fills_cache() {
    let source = ScriptedSource::new(vec![Scripted::Slides(deck())]);
    let store = MemorySessionStore::new();
    let loader = loader(source.clone(), Some(store.clone()), LoaderOptions::default());

    let content = loader.load(&PageQuery::new("en", "home")).await;
    let targets: Vec<&str> = content
        .slides()
        .iter()
        .map(|s| s.navigate_target.as_str())
        .collect();
    assert_eq!(targets, vec!["live", "casino"]);
    assert_eq!(
        content.settings().and_then(|s| s.auto_slide_interval_ms),
        Some(3_000)
    );

    let cached = SlideCache::new(store).load().await.expect("cache").expect("hit");
    assert_eq!(cached.slides.len(), 3, "cache holds the unfiltered list");
    assert_eq!(cached.locale.as_deref(), Some("en"));
    assert_eq!(cached.page, None);
}

#[tokio::test(start_paused = true)]
async fn cache_hit_skips_the_network() {
    let source = ScriptedSource::new(vec![]);
    let store = MemorySessionStore::new();
    SlideCache::new(store.clone())
        .store(&CachedDeck::unscoped(deck(), None))
        .await
        .expect("seed");
    let loader = loader(source.clone(), Some(store), LoaderOptions::default());

    let content = loader.load(&PageQuery::new("en", "sport")).await;
    assert_eq!(source.calls(), 0);
    match content {
        DeckContent::Ready {
            slides, from_cache, ..
        } => {
            assert!(from_cache);
            assert_eq!(slides.len(), 1);
            assert_eq!(slides[0].navigate_target, "sport");
        }
        other => panic!("expected cached deck, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn corrupt_cache_falls_back_to_fetch() {
    let source = ScriptedSource::new(vec![Scripted::Slides(deck())]);
    let store = MemorySessionStore::new();
    store.set(SLIDES_CACHE_KEY, "garbage").await.expect("seed");
    let loader = loader(source.clone(), Some(store), LoaderOptions::default());

    let content = loader.load(&PageQuery::new("en", "home")).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(content.slides().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn reload_invalidates_cache_before_loading() {
    let source = ScriptedSource::new(vec![Scripted::Slides(vec![slide("fresh", "home", 0)])]);
    let store = MemorySessionStore::new();
    SlideCache::new(store.clone())
        .store(&CachedDeck::unscoped(deck(), None))
        .await
        .expect("seed");
    let options = LoaderOptions {
        navigation: NavigationType::Reload,
        ..LoaderOptions::default()
    };
    let loader = loader(source.clone(), Some(store), options);

    let content = loader.load(&PageQuery::new("en", "home")).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(content.slides()[0].navigate_target, "fresh");
}

#[tokio::test(start_paused = true)]
async fn disabled_policy_never_touches_cache() {
    let source = ScriptedSource::new(vec![Scripted::Slides(deck())]);
    let store = MemorySessionStore::new();
    let options = LoaderOptions {
        cache_policy: CachePolicy::Disabled,
        ..LoaderOptions::default()
    };
    let loader = loader(source, Some(store.clone()), options);
    assert!(loader.cache().is_none());

    loader.load(&PageQuery::new("en", "home")).await;
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let source = ScriptedSource::new(vec![
        Scripted::Timeout,
        Scripted::Timeout,
        Scripted::Slides(deck()),
    ]);
    let loader = loader(source.clone(), None, LoaderOptions::default());

    let content = loader.load(&PageQuery::new("en", "home")).await;
    assert_eq!(source.calls(), 3);
    assert_eq!(content.slides().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded_then_empty_state() {
    let source = ScriptedSource::new(vec![
        Scripted::Timeout,
        Scripted::Timeout,
        Scripted::Timeout,
        Scripted::Slides(deck()),
    ]);
    let loader = loader(source.clone(), None, LoaderOptions::default());

    let content = loader.load(&PageQuery::new("en", "home")).await;
    assert_eq!(source.calls(), 3);
    assert!(matches!(content, DeckContent::Unavailable { .. }));
    assert!(content.slides().is_empty());
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_is_not_retried() {
    let source = ScriptedSource::new(vec![Scripted::Malformed, Scripted::Slides(deck())]);
    let loader = loader(source.clone(), None, LoaderOptions::default());

    let error = loader
        .try_load(&PageQuery::new("en", "home"))
        .await
        .expect_err("malformed");
    assert!(matches!(error, SourceError::MalformedPayload { .. }));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_backend_times_out() {
    let source = ScriptedSource::new(vec![Scripted::Hang]);
    let options = LoaderOptions {
        timeout: Duration::from_secs(2),
        retry: RetryPolicy::no_retry(),
        ..LoaderOptions::default()
    };
    let loader = loader(source, None, options);

    let error = loader
        .try_load(&PageQuery::new("en", "home"))
        .await
        .expect_err("timeout");
    assert!(matches!(error, SourceError::Timeout(d) if d == Duration::from_secs(2)));
}

#[tokio::test(start_paused = true)]
async fn cache_hit_keeps_backend_settings() {
    let source = ScriptedSource::new(vec![Scripted::Slides(deck())]);
    let store = MemorySessionStore::new();
    let query = PageQuery::new("en", "home");

    let first = loader(source.clone(), Some(store.clone()), LoaderOptions::default())
        .load(&query)
        .await;
    let second = loader(source.clone(), Some(store), LoaderOptions::default())
        .load(&query)
        .await;

    assert_eq!(source.calls(), 1);
    assert!(matches!(second, DeckContent::Ready { from_cache: true, .. }));
    assert_eq!(second.settings(), first.settings());
    assert_eq!(
        DeckSettings::default().merged_with(second.settings()),
        DeckSettings::default().merged_with(first.settings())
    );
}

#[tokio::test(start_paused = true)]
async fn other_locale_is_refetched() {
    let source = ScriptedSource::new(vec![
        Scripted::Slides(deck()),
        Scripted::Slides(vec![slide("ka-live", "home", 0)]),
    ]);
    let store = MemorySessionStore::new();

    loader(source.clone(), Some(store.clone()), LoaderOptions::default())
        .load(&PageQuery::new("en", "home"))
        .await;
    let content = loader(source.clone(), Some(store), LoaderOptions::default())
        .load(&PageQuery::new("ka", "home"))
        .await;

    assert_eq!(source.calls(), 2);
    assert_eq!(content.slides()[0].navigate_target, "ka-live");
}

#[derive(Clone, Default)]
struct CmsState {
    requests: Arc<AtomicUsize>,
}

/// Answers like Hygraph does: only slides tagged with `variables.page`.
async fn hygraph_by_page(State(state): State<CmsState>, Json(body): Json<Value>) -> Json<Value> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let page = body["variables"]["page"].as_str().unwrap_or_default().to_string();
    let all = [("home-hero", "home"), ("casino-hero", "casino"), ("casino-side", "casino")];
    let slides: Vec<Value> = all
        .iter()
        .enumerate()
        .filter(|(_, (_, tag))| *tag == page)
        .map(|(position, (target, tag))| {
            json!({
                "image": { "url": format!("https://cdn.test/{target}.png") },
                "navigateVar": target,
                "optionalHref": "promotions/summer",
                "pages": [tag.to_uppercase()],
                "sortOrder": position
            })
        })
        .collect();
    Json(json!({
        "data": {
            "settings": [{ "autoSlideInterval": 7000, "slideWidth": 90 }],
            "slides": slides
        }
    }))
}

async fn hygraph_loader(
    store: MemorySessionStore,
) -> (SlideLoader<MemorySessionStore>, CmsState) {
    let state = CmsState::default();
    let app = Router::new()
        .route("/graphql", post(hygraph_by_page))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let source = HygraphSource::new(
        Client::new(),
        HygraphConfig {
            endpoint: format!("http://{addr}/graphql"),
            settings_id: "settings".into(),
            link_base_url: "https://www.ambassadoribet.com".into(),
        },
    );
    let loader = SlideLoader::new(
        Arc::new(source),
        Some(SlideCache::new(store)),
        LoaderOptions::default(),
    );
    (loader, state)
}

fn targets(content: &DeckContent) -> Vec<String> {
    content
        .slides()
        .iter()
        .map(|slide| slide.navigate_target.clone())
        .collect()
}

#[tokio::test]
async fn hygraph_pages_do_not_share_a_filtered_cache() {
    let store = MemorySessionStore::new();
    let (loader, cms) = hygraph_loader(store).await;

    let home = loader.load(&PageQuery::new("en", "home")).await;
    assert_eq!(targets(&home), vec!["home-hero"]);

    let casino = loader.load(&PageQuery::new("en", "casino")).await;
    assert_eq!(targets(&casino), vec!["casino-hero", "casino-side"]);
    assert!(matches!(casino, DeckContent::Ready { from_cache: false, .. }));
    assert_eq!(cms.requests.load(Ordering::SeqCst), 2);

    let again = loader.load(&PageQuery::new("en", "casino")).await;
    assert_eq!(targets(&again), vec!["casino-hero", "casino-side"]);
    assert!(matches!(again, DeckContent::Ready { from_cache: true, .. }));
    assert_eq!(cms.requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn hygraph_cache_hit_mounts_with_cms_settings() {
    let store = MemorySessionStore::new();
    let (loader, _cms) = hygraph_loader(store).await;
    let query = PageQuery::new("en", "home");

    let first = loader.load(&query).await;
    let cached = loader.load(&query).await;

    assert!(matches!(cached, DeckContent::Ready { from_cache: true, .. }));
    let expected = DeckSettings {
        slide_width_vw: 90.0,
        autoplay_interval_ms: 7_000,
    };
    assert_eq!(DeckSettings::default().merged_with(first.settings()), expected);
    assert_eq!(DeckSettings::default().merged_with(cached.settings()), expected);
    assert_eq!(
        cached.slides()[0].optional_link.as_deref(),
        Some("https://www.ambassadoribet.com/promotions/summer")
    );
}
