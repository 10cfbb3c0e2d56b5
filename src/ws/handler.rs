//! Axum WebSocket upgrade handler.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use super::messages::RpcResponse;
use crate::app_state::AppState;
use crate::error::GatewayError;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Bearer credential.
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /mcp/ws` — Upgrade HTTP connection to WebSocket.
///
/// The credential comes from `?token=` or, failing that, an
/// `Authorization: Bearer` header. Unauthenticated clients receive one
/// `401` envelope and are then closed.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let token = params.token.or_else(|| bearer_token(&headers));
    let auth = state.auth.authenticate(token.as_deref());

    ws.on_upgrade(move |socket| async move {
        match auth {
            Ok(identity) => run_connection(socket, identity, state.gateway, state.dispatcher).await,
            Err(err) => reject(socket, &err).await,
        }
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
}

async fn reject(mut socket: WebSocket, err: &GatewayError) {
    tracing::warn!("rejecting unauthenticated websocket");
    if let Ok(text) = serde_json::to_string(&RpcResponse::failure(None, err)) {
        let _ = socket.send(Message::text(text)).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}
