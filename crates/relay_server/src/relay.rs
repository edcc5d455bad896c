use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use shared::protocol::{InboundMessage, NavigateRequest};
use tracing::{debug, info, warn};
use url::Url;

pub const NAVIGATE_MESSAGE_TYPE: &str = "TMA_NAVIGATE";

/// The host's navigation capability.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, target: &str) -> Result<()>;
}

/// Forwards navigation requests to the host application over HTTP.
pub struct WebhookNavigator {
    http: Client,
    url: String,
}

impl WebhookNavigator {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Navigator for WebhookNavigator {
    async fn navigate(&self, target: &str) -> Result<()> {
        self.http
            .post(&self.url)
            .json(&NavigateRequest {
                target: target.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to reach navigate webhook {}", self.url))?
            .error_for_status()
            .context("navigate webhook rejected request")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayOutcome {
    Forwarded,
    UntrustedOrigin,
    IgnoredType,
    MissingPayload,
    NavigatorUnavailable,
}

pub struct Relay {
    trusted_origin: String,
    navigator: Option<Arc<dyn Navigator>>,
}

impl Relay {
    pub fn new(trusted_origin: &str, navigator: Option<Arc<dyn Navigator>>) -> Result<Self> {
        Ok(Self {
            trusted_origin: normalize_origin(trusted_origin)
                .with_context(|| format!("invalid trusted origin '{trusted_origin}'"))?,
            navigator,
        })
    }

    pub fn trusted_origin(&self) -> &str {
        &self.trusted_origin
    }

    pub fn is_trusted(&self, origin: Option<&str>) -> bool {
        origin
            .and_then(|origin| normalize_origin(origin).ok())
            .is_some_and(|origin| origin == self.trusted_origin)
    }

    /// Forwards a navigate message from the trusted origin. Everything else is
    /// dropped with a reason; only a failing navigator is an error.
    pub async fn relay(&self, origin: Option<&str>, message: &InboundMessage) -> Result<RelayOutcome> {
        if !self.is_trusted(origin) {
            debug!(origin = origin.unwrap_or("<none>"), "dropping message from untrusted origin");
            return Ok(RelayOutcome::UntrustedOrigin);
        }
        if message.kind != NAVIGATE_MESSAGE_TYPE {
            debug!(kind = %message.kind, "ignoring non-navigate message");
            return Ok(RelayOutcome::IgnoredType);
        }
        let Some(target) = message.payload.as_deref() else {
            warn!("navigate message has no payload");
            return Ok(RelayOutcome::MissingPayload);
        };
        let Some(navigator) = &self.navigator else {
            warn!(%target, "navigate capability is not available in the host");
            return Ok(RelayOutcome::NavigatorUnavailable);
        };

        navigator.navigate(target).await?;
        info!(%target, "relayed navigate message");
        Ok(RelayOutcome::Forwarded)
    }
}

/// `scheme://host[:port]` with default ports dropped, as browsers report it.
fn normalize_origin(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())?;
    let origin = url.origin();
    anyhow::ensure!(origin.is_tuple(), "origin '{raw}' is opaque");
    Ok(origin.ascii_serialization())
}

#[cfg(test)]
#[path = "tests/relay_tests.rs"]
mod tests;
