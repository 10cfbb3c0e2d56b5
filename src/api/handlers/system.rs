//! System endpoints: banner, health check, demo token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::TokenResponse;
use crate::app_state::AppState;
use crate::bus::BusState;
use crate::error::{ErrorResponse, GatewayError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    bus: BusState,
    sessions: usize,
    timestamp: String,
    version: String,
}

/// `GET /` — Plain-text banner.
pub async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    [
        "mcp-todo-demo server is running.".to_string(),
        "REST endpoints: POST /tasks, PUT /tasks/:id, GET /tasks, GET /health, GET /token.".to_string(),
        format!("WebSocket endpoint: ws(s)://<host>{}.", state.ws_path),
    ]
    .join("\n")
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service status, bus connectivity, live session count and version.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            bus: state.gateway.bus().state(),
            sessions: state.gateway.sessions().len(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /token` — Mint a demo token.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if signing fails.
#[utoipa::path(
    get,
    path = "/token",
    tag = "System",
    summary = "Issue a demo token",
    description = "Returns a short-lived bearer token for subject `demo-user` with scope `basic`.",
    responses(
        (status = 200, description = "Signed token", body = TokenResponse),
        (status = 500, description = "Signing failed", body = ErrorResponse),
    )
)]
pub async fn token_handler(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    let token = state.auth.issue_demo()?;
    Ok(Json(TokenResponse { token }))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/token", get(token_handler))
}
