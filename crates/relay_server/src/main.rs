use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::InboundMessage,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod relay;

use config::load_settings;
use relay::{Navigator, Relay, RelayOutcome, WebhookNavigator};

#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
}

#[derive(Debug, Serialize)]
struct RelayResponse {
    outcome: RelayOutcome,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let navigator = settings.navigate_webhook_url.as_ref().map(|url| {
        Arc::new(WebhookNavigator::new(reqwest::Client::new(), url.clone())) as Arc<dyn Navigator>
    });
    if navigator.is_none() {
        info!("no navigate webhook configured; navigate messages will be dropped");
    }
    let relay = Relay::new(&settings.trusted_origin, navigator)?;
    info!(trusted_origin = relay.trusted_origin(), "relay configured");

    let app = build_router(AppState {
        relay: Arc::new(relay),
    });

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/messages", post(http_relay_message))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_relay_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(message): Json<InboundMessage>,
) -> Result<(StatusCode, Json<RelayResponse>), (StatusCode, Json<ApiError>)> {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());

    let outcome = state.relay.relay(origin, &message).await.map_err(|e| {
        error!(error = %e, "failed to forward navigate message");
        (
            StatusCode::BAD_GATEWAY,
            Json(ApiError::new(ErrorCode::Upstream, format!("{e:#}"))),
        )
    })?;

    let status = match outcome {
        RelayOutcome::Forwarded => StatusCode::ACCEPTED,
        RelayOutcome::IgnoredType => StatusCode::OK,
        RelayOutcome::UntrustedOrigin => {
            return Err((
                StatusCode::FORBIDDEN,
                Json(ApiError::new(ErrorCode::Forbidden, "origin is not trusted")),
            ))
        }
        RelayOutcome::MissingPayload => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiError::new(
                    ErrorCode::Validation,
                    "navigate message requires a payload",
                )),
            ))
        }
        RelayOutcome::NavigatorUnavailable => {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError::new(
                    ErrorCode::Unavailable,
                    "navigate capability is not available",
                )),
            ))
        }
    };
    Ok((status, Json(RelayResponse { outcome })))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
