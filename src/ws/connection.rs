//! WebSocket connection loop.
//!
//! Owns the socket for one authenticated client: registers the session,
//! feeds inbound frames to the [`RpcDispatcher`] in arrival order, and
//! forwards everything queued on the session's connection handle
//! (responses and notifications) to the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;

use super::messages::RpcResponse;
use crate::auth::Identity;
use crate::gateway::{ConnectionHandle, Gateway, RpcDispatcher};

/// Server name announced in the greeting envelope.
pub const SERVER_NAME: &str = "mcp-todo-demo";

/// Methods announced in the greeting envelope.
pub const CAPABILITIES: [&str; 3] = ["callTool", "subscribe", "unsubscribe"];

/// Runs the read/write loop for a single WebSocket connection.
///
/// The session is removed, and its channels released, when the client
/// closes the socket or a write fails.
pub async fn run_connection(
    socket: WebSocket,
    identity: Identity,
    gateway: Arc<Gateway>,
    dispatcher: RpcDispatcher,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connection, mut outbound) = ConnectionHandle::channel();
    let session = gateway.open_session(connection, identity);

    let hello = RpcResponse::success(
        None,
        json!({
            "hello": SERVER_NAME,
            "sessionId": session.id(),
            "capabilities": CAPABILITIES,
        }),
    );
    if let Err(e) = session.connection().send(&hello) {
        tracing::debug!(session_id = %session.id(), error = %e, "greeting not queued");
    }

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher.handle_text(&session, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session.id(), error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Response or notification queued for this client
            Some(text) = outbound.recv() => {
                if ws_tx.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
        }
    }

    gateway.close_session(session.id()).await;
    tracing::debug!(session_id = %session.id(), "ws connection closed");
}
