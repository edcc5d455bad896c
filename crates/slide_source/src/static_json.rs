use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::domain::SlideRecord;
use tracing::debug;

use crate::{non_empty, parse_payload, BackendKind, PageQuery, SlideSource, SourceError, SourcePayload};

const FALLBACK_LOCALE: &str = "en";

#[derive(Debug, Clone)]
pub struct StaticJsonConfig {
    pub document_url: String,
}

/// Reads a JSON document of the form `{ "<locale>": [slide, ..] }`.
pub struct StaticJsonSource {
    http: Client,
    config: StaticJsonConfig,
}

#[derive(Debug, Deserialize)]
struct StaticSlide {
    image: String,
    #[serde(rename = "navigateVar", default)]
    navigate_var: Option<String>,
    #[serde(rename = "optionalHref", default)]
    optional_href: Option<String>,
}

impl StaticJsonSource {
    pub fn new(http: Client, config: StaticJsonConfig) -> Self {
        Self { http, config }
    }

    fn normalize(
        mut document: HashMap<String, Vec<StaticSlide>>,
        locale: &str,
    ) -> Result<Vec<SlideRecord>, SourceError> {
        let slides = match document.remove(locale) {
            Some(slides) => slides,
            None => document.remove(FALLBACK_LOCALE).ok_or_else(|| {
                SourceError::malformed(
                    BackendKind::StaticJson,
                    format!("no slides for locale '{locale}' or fallback '{FALLBACK_LOCALE}'"),
                )
            })?,
        };

        Ok(slides
            .into_iter()
            .enumerate()
            .map(|(position, slide)| SlideRecord {
                image_url: slide.image,
                mobile_image_url: None,
                caption: None,
                navigate_target: slide.navigate_var.unwrap_or_default(),
                optional_link: non_empty(slide.optional_href),
                pages: BTreeSet::new(),
                sort_order: position as i64,
            })
            .collect())
    }
}

#[async_trait]
impl SlideSource for StaticJsonSource {
    fn backend(&self) -> BackendKind {
        BackendKind::StaticJson
    }

    async fn fetch_all(&self, query: &PageQuery) -> Result<SourcePayload, SourceError> {
        let body = self
            .http
            .get(&self.config.document_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let document: HashMap<String, Vec<StaticSlide>> =
            parse_payload(BackendKind::StaticJson, &body)?;
        let slides = Self::normalize(document, &query.locale)?;
        debug!(locale = %query.locale, count = slides.len(), "loaded static slide document");
        Ok(SourcePayload {
            slides,
            settings: None,
        })
    }
}
