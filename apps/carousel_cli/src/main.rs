use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use carousel_core::{Carousel, CarouselInput, HeadlessRenderer};
use clap::{Parser, Subcommand};
use reqwest::Client;
use shared::protocol::FrameMessage;
use slide_source::{
    BackendKind, DeckContent, HygraphConfig, HygraphSource, LoaderOptions, PageQuery,
    SlideLoader, SlideSource, StaticJsonConfig, StaticJsonSource, TakeShapeConfig,
    TakeShapeSource,
};
use storage::{NavigationType, SlideCache, SqliteSessionStore};
use tokio::{sync::mpsc, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "carousel", about = "Load and drive the slide carousel headlessly")]
struct Cli {
    /// TOML config file; `carousel.toml` is read when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Session whose cache entries are read and written.
    #[arg(long, default_value = "default")]
    session: String,
    /// How the page was reached; `reload` invalidates the cache under the hard-reload policy.
    #[arg(long, default_value = "navigate", value_parser = parse_navigation)]
    navigation: NavigationType,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the filtered, ordered deck for a page URL as JSON.
    Slides {
        #[arg(long)]
        url: Url,
    },
    /// Mount a headless carousel and let autoplay advance it.
    Play {
        #[arg(long)]
        url: Url,
        #[arg(long, default_value_t = 3)]
        ticks: usize,
        /// Click the slide showing after the last tick.
        #[arg(long)]
        click: bool,
    },
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove the cached slide list for the session.
    Clear,
}

fn parse_navigation(raw: &str) -> Result<NavigationType, String> {
    NavigationType::parse(raw).ok_or_else(|| format!("unknown navigation type '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let store = SqliteSessionStore::new(&settings.cache_database_url, cli.session.as_str())
        .await
        .with_context(|| format!("failed to open cache '{}'", settings.cache_database_url))?;

    match cli.command {
        Command::Slides { url } => {
            let loader = build_loader(&settings, store, cli.navigation)?;
            let query = PageQuery::from_url(&url, settings.source.default_locale());
            let content = loader.try_load(&query).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "locale": query.locale,
                    "page": query.page,
                    "settings": content.settings(),
                    "slides": content.slides(),
                }))?
            );
        }
        Command::Play { url, ticks, click } => {
            let loader = build_loader(&settings, store, cli.navigation)?;
            let query = PageQuery::from_url(&url, settings.source.default_locale());
            let content = loader.load(&query).await;
            play(&settings, &content, ticks, click).await;
        }
        Command::Cache {
            action: CacheAction::Clear,
        } => {
            SlideCache::new(store).clear().await?;
            println!("cleared slide cache for session '{}'", cli.session);
        }
    }

    Ok(())
}

fn build_loader(
    settings: &Settings,
    store: SqliteSessionStore,
    navigation: NavigationType,
) -> Result<SlideLoader<SqliteSessionStore>> {
    let options = LoaderOptions {
        timeout: settings.fetch_timeout(),
        retry: settings.retry_policy(),
        cache_policy: settings.cache_policy,
        navigation,
    };
    Ok(SlideLoader::new(
        build_source(settings, Client::new())?,
        Some(SlideCache::new(store)),
        options,
    ))
}

fn build_source(settings: &Settings, http: Client) -> Result<Arc<dyn SlideSource>> {
    let source: Arc<dyn SlideSource> = match settings.source {
        BackendKind::StaticJson => Arc::new(StaticJsonSource::new(
            http,
            StaticJsonConfig {
                document_url: settings.static_document_url.clone(),
            },
        )),
        BackendKind::Hygraph => Arc::new(HygraphSource::new(
            http,
            HygraphConfig {
                endpoint: settings.hygraph_endpoint.clone(),
                settings_id: settings.hygraph_settings_id.clone(),
                link_base_url: settings.link_base_url.clone(),
            },
        )),
        BackendKind::TakeShape => {
            let token = settings
                .takeshape_token
                .clone()
                .context("takeshape source needs takeshape_token (or CAROUSEL__TAKESHAPE_TOKEN)")?;
            Arc::new(TakeShapeSource::new(
                http,
                TakeShapeConfig {
                    endpoint: settings.takeshape_endpoint.clone(),
                    token,
                    image_base_url: settings.image_base_url.clone(),
                },
            ))
        }
    };
    Ok(source)
}

async fn play(settings: &Settings, content: &DeckContent, ticks: usize, click: bool) {
    let (frames, mut parent) = mpsc::unbounded_channel::<FrameMessage>();
    let mut carousel = Carousel::mount(
        content,
        settings.deck_settings(),
        settings.gesture_config(),
        settings.viewport_width_px,
        HeadlessRenderer::new(settings.viewport_width_px),
        frames,
        Instant::now(),
    );

    if let Some(reason) = carousel.renderer().unavailable_reason() {
        warn!(%reason, "nothing to play");
        return;
    }

    for tick in 1..=ticks {
        let Some(deadline) = carousel.deck().autoplay_deadline() else {
            warn!("autoplay is not armed; stopping");
            break;
        };
        tokio::time::sleep_until(deadline).await;
        carousel.on_autoplay(Instant::now());

        let state = carousel.deck().state();
        info!(
            tick,
            index = state.current_index,
            offset_vw = state.translate_offset_vw,
            transform = ?carousel.renderer().last_transform(),
            "autoplay advanced"
        );
    }

    if click {
        let index = carousel.deck().current_index();
        carousel.handle(CarouselInput::SlideClicked(index), Instant::now());
    }
    drop(carousel);

    while let Some(message) = parent.recv().await {
        info!(kind = message.kind(), payload = message.payload(), "frame message");
    }
}
