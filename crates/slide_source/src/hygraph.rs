use async_trait::async_trait;
use reqwest::{header::CACHE_CONTROL, Client};
use serde::{Deserialize, Serialize};
use shared::domain::{RemoteSettings, SlideRecord};
use tracing::debug;

use crate::{
    join_link, non_empty, parse_payload, BackendKind, GraphQlResponse, PageQuery, SlideSource,
    SourceError, SourcePayload,
};

const SLIDES_QUERY: &str = r#"
query ($language: Languages!, $page: Pages!, $settingsId: ID!) {
  settings(where: { id: $settingsId }) {
    autoSlideInterval
    slideWidth
  }
  slides(
    where: { language: $language, pages_contains_some: [$page] }
    orderBy: sortOrder_ASC
    first: 50
  ) {
    image { url }
    caption
    navigateVar
    optionalHref
    pages
    sortOrder
  }
}
"#;

#[derive(Debug, Clone)]
pub struct HygraphConfig {
    pub endpoint: String,
    pub settings_id: String,
    /// Prefixed to each slide's relative `optionalHref`.
    pub link_base_url: String,
}

pub struct HygraphSource {
    http: Client,
    config: HygraphConfig,
}

#[derive(Debug, Serialize)]
struct SlidesRequest<'a> {
    query: &'static str,
    variables: SlidesVariables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SlidesVariables<'a> {
    language: &'a str,
    page: String,
    settings_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct HygraphData {
    #[serde(default)]
    settings: Vec<HygraphSettings>,
    slides: Option<Vec<HygraphSlide>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HygraphSettings {
    auto_slide_interval: Option<u64>,
    slide_width: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HygraphSlide {
    image: Option<HygraphImage>,
    caption: Option<String>,
    navigate_var: Option<String>,
    optional_href: Option<String>,
    #[serde(default)]
    pages: Vec<String>,
    sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HygraphImage {
    url: String,
}

impl HygraphSource {
    pub fn new(http: Client, config: HygraphConfig) -> Self {
        Self { http, config }
    }

    fn normalize(&self, data: HygraphData) -> Result<SourcePayload, SourceError> {
        let settings = data.settings.into_iter().next().map(|s| RemoteSettings {
            auto_slide_interval_ms: s.auto_slide_interval,
            slide_width_vw: s.slide_width,
        });

        let slides = data
            .slides
            .ok_or_else(|| SourceError::malformed(BackendKind::Hygraph, "response has no slides"))?
            .into_iter()
            .enumerate()
            .map(|(position, slide)| {
                let image = slide.image.ok_or_else(|| {
                    SourceError::malformed(
                        BackendKind::Hygraph,
                        format!("slide {position} has no image"),
                    )
                })?;
                Ok(SlideRecord {
                    image_url: image.url,
                    mobile_image_url: None,
                    caption: non_empty(slide.caption),
                    navigate_target: slide.navigate_var.unwrap_or_default(),
                    optional_link: non_empty(slide.optional_href)
                        .map(|href| join_link(&self.config.link_base_url, &href)),
                    pages: slide
                        .pages
                        .into_iter()
                        .map(|page| page.to_ascii_lowercase())
                        .collect(),
                    sort_order: slide.sort_order.unwrap_or(position as i64),
                })
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        Ok(SourcePayload { slides, settings })
    }
}

#[async_trait]
impl SlideSource for HygraphSource {
    fn backend(&self) -> BackendKind {
        BackendKind::Hygraph
    }

    fn filters_by_page(&self) -> bool {
        true
    }

    async fn fetch_all(&self, query: &PageQuery) -> Result<SourcePayload, SourceError> {
        let request = SlidesRequest {
            query: SLIDES_QUERY,
            variables: SlidesVariables {
                language: &query.locale,
                page: query.page.to_ascii_lowercase(),
                settings_id: &self.config.settings_id,
            },
        };
        let body = self
            .http
            .post(&self.config.endpoint)
            .header(CACHE_CONTROL, "max-age=180, public")
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let response: GraphQlResponse<HygraphData> = parse_payload(BackendKind::Hygraph, &body)?;
        let payload = self.normalize(response.into_data(BackendKind::Hygraph)?)?;
        debug!(
            locale = %query.locale,
            page = %query.page,
            count = payload.slides.len(),
            "loaded hygraph slides"
        );
        Ok(payload)
    }
}
