use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::domain::SlideRecord;
use tracing::debug;

use crate::{
    non_empty, parse_payload, BackendKind, GraphQlResponse, PageQuery, SlideSource, SourceError,
    SourcePayload,
};

const TOKEN_HEADER: &str = "X-TakeShape-Token";

const SLIDES_QUERY: &str = r#"
query GetSlides($locale: String!) {
  getSlideList(locale: $locale) {
    items {
      caption
      pages
      sortOrder
      NavigateVar
      OptionalHref
      image { path }
      imageMobile { path }
    }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct TakeShapeConfig {
    pub endpoint: String,
    pub token: String,
    /// Asset paths are relative to this prefix.
    pub image_base_url: String,
}

/// Returns every slide for the locale; page filtering happens locally.
pub struct TakeShapeSource {
    http: Client,
    config: TakeShapeConfig,
}

#[derive(Debug, Serialize)]
struct SlidesRequest<'a> {
    query: &'static str,
    variables: SlidesVariables<'a>,
}

#[derive(Debug, Serialize)]
struct SlidesVariables<'a> {
    locale: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeShapeData {
    get_slide_list: Option<SlideList>,
}

#[derive(Debug, Deserialize)]
struct SlideList {
    items: Option<Vec<TakeShapeSlide>>,
}

#[derive(Debug, Deserialize)]
struct TakeShapeSlide {
    caption: Option<String>,
    #[serde(default)]
    pages: Option<Vec<String>>,
    #[serde(rename = "sortOrder")]
    sort_order: Option<i64>,
    #[serde(rename = "NavigateVar")]
    navigate_var: Option<String>,
    #[serde(rename = "OptionalHref")]
    optional_href: Option<String>,
    image: Option<AssetPath>,
    #[serde(rename = "imageMobile")]
    image_mobile: Option<AssetPath>,
}

#[derive(Debug, Deserialize)]
struct AssetPath {
    path: String,
}

/// Asset paths may contain raw spaces; nothing else is escaped.
pub(crate) fn escape_spaces(path: &str) -> String {
    path.replace(' ', "%20")
}

impl TakeShapeSource {
    pub fn new(http: Client, config: TakeShapeConfig) -> Self {
        Self { http, config }
    }

    fn asset_url(&self, asset: &AssetPath) -> String {
        format!("{}{}", self.config.image_base_url, escape_spaces(&asset.path))
    }

    fn normalize(&self, data: TakeShapeData) -> Result<Vec<SlideRecord>, SourceError> {
        let list = data.get_slide_list.ok_or_else(|| {
            SourceError::malformed(BackendKind::TakeShape, "response has no getSlideList")
        })?;

        list.items
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(position, slide)| {
                let image = slide.image.as_ref().ok_or_else(|| {
                    SourceError::malformed(
                        BackendKind::TakeShape,
                        format!("slide {position} has no image"),
                    )
                })?;
                Ok(SlideRecord {
                    image_url: self.asset_url(image),
                    mobile_image_url: slide.image_mobile.as_ref().map(|a| self.asset_url(a)),
                    caption: non_empty(slide.caption),
                    navigate_target: slide.navigate_var.unwrap_or_default(),
                    optional_link: non_empty(slide.optional_href),
                    pages: slide.pages.unwrap_or_default().into_iter().collect(),
                    sort_order: slide.sort_order.unwrap_or(position as i64),
                })
            })
            .collect()
    }
}

#[async_trait]
impl SlideSource for TakeShapeSource {
    fn backend(&self) -> BackendKind {
        BackendKind::TakeShape
    }

    async fn fetch_all(&self, query: &PageQuery) -> Result<SourcePayload, SourceError> {
        let request = SlidesRequest {
            query: SLIDES_QUERY,
            variables: SlidesVariables {
                locale: &query.locale,
            },
        };
        let body = self
            .http
            .post(&self.config.endpoint)
            .header(TOKEN_HEADER, &self.config.token)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let response: GraphQlResponse<TakeShapeData> = parse_payload(BackendKind::TakeShape, &body)?;
        let slides = self.normalize(response.into_data(BackendKind::TakeShape)?)?;
        debug!(locale = %query.locale, count = slides.len(), "loaded takeshape slides");
        Ok(SourcePayload {
            slides,
            settings: None,
        })
    }
}
