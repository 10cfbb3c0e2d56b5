//! Request routing for WebSocket sessions.
//!
//! [`RpcDispatcher`] decodes one inbound frame, routes it to the
//! `callTool` / `subscribe` / `unsubscribe` handlers and writes exactly one
//! response envelope back to the originating session.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Value, json};

use super::tools::{Tool, suggest_assignee};
use super::{Gateway, Session};
use crate::domain::TaskStore;
use crate::error::GatewayError;
use crate::ws::messages::{RpcRequest, RpcResponse, decode_request};

/// Routes decoded requests to their handlers.
#[derive(Debug, Clone)]
pub struct RpcDispatcher {
    gateway: Arc<Gateway>,
    tasks: Arc<TaskStore>,
}

impl RpcDispatcher {
    /// Creates a dispatcher over the gateway and the task collection.
    #[must_use]
    pub fn new(gateway: Arc<Gateway>, tasks: Arc<TaskStore>) -> Self {
        Self { gateway, tasks }
    }

    /// Handles one inbound text frame and writes the response to `session`.
    pub async fn handle_text(&self, session: &Session, text: &str) {
        let response = match decode_request(text) {
            Ok(request) => self.dispatch(session, request).await,
            Err(err) => {
                tracing::debug!(session_id = %session.id(), error = %err, "undecodable frame");
                RpcResponse::failure(None, &err)
            }
        };
        if let Err(e) = session.connection().send(&response) {
            tracing::debug!(session_id = %session.id(), error = %e, "response write failed");
        }
    }

    /// Runs one request and builds its response.
    ///
    /// A panic inside a handler is caught here and reported as `-32000`.
    pub async fn dispatch(&self, session: &Session, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        let outcome = guarded(self.route(session, &request)).await;
        if let Err(err) = &outcome {
            tracing::debug!(
                session_id = %session.id(),
                method = %request.method,
                code = err.rpc_code(),
                error = %err,
                "request failed"
            );
        }
        RpcResponse::from_result(id, outcome)
    }

    async fn route(&self, session: &Session, request: &RpcRequest) -> Result<Value, GatewayError> {
        match request.method.as_str() {
            "callTool" => self.call_tool(request).await,
            "subscribe" => self.subscribe(session, request).await,
            "unsubscribe" => Ok(self.unsubscribe(session, request).await),
            other => Err(GatewayError::MethodNotFound(other.to_string())),
        }
    }

    async fn call_tool(&self, request: &RpcRequest) -> Result<Value, GatewayError> {
        let name = request.str_param("tool").unwrap_or_default();
        let tool = Tool::from_name(name).ok_or_else(|| GatewayError::ToolNotFound(name.to_string()))?;
        match tool {
            Tool::SuggestAssignee => {
                let title = request
                    .params
                    .as_ref()
                    .and_then(|p| p.pointer("/args/title"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(json!({ "suggested": suggest_assignee(title) }))
            }
            Tool::ListTasks => Ok(json!({ "tasks": self.tasks.snapshot().await })),
        }
    }

    async fn subscribe(&self, session: &Session, request: &RpcRequest) -> Result<Value, GatewayError> {
        let channel = request
            .str_param("channel")
            .ok_or(GatewayError::MissingParameter("channel"))?;
        self.gateway.subscribe(session, channel).await?;
        Ok(json!({ "subscribed": channel }))
    }

    async fn unsubscribe(&self, session: &Session, request: &RpcRequest) -> Value {
        let channel = request.str_param("channel");
        if let Some(channel) = channel {
            self.gateway.unsubscribe(session, channel).await;
        }
        json!({ "unsubscribed": channel })
    }
}

/// Awaits `fut`, turning a panic into [`GatewayError::Internal`].
async fn guarded<F>(fut: F) -> Result<Value, GatewayError>
where
    F: Future<Output = Result<Value, GatewayError>>,
{
    AssertUnwindSafe(fut).catch_unwind().await.unwrap_or_else(|_| {
        tracing::error!("request handler panicked");
        Err(GatewayError::Internal("handler panicked".to_string()))
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::auth::Identity;
    use crate::bus::{BusClient, MemoryBusClient};
    use crate::domain::Task;
    use crate::gateway::ConnectionHandle;

    struct Harness {
        dispatcher: RpcDispatcher,
        gateway: Arc<Gateway>,
        client: Arc<MemoryBusClient>,
        session: Arc<Session>,
        rx: UnboundedReceiver<String>,
    }

    fn harness() -> Harness {
        let client = Arc::new(MemoryBusClient::new());
        let bus_client: Arc<dyn BusClient> = Arc::clone(&client) as Arc<dyn BusClient>;
        let gateway = Arc::new(Gateway::new(Some(bus_client), Duration::from_secs(1)));
        let tasks = Arc::new(TaskStore::new());
        let dispatcher = RpcDispatcher::new(Arc::clone(&gateway), tasks);
        let (conn, rx) = ConnectionHandle::channel();
        let session = gateway.open_session(
            conn,
            Identity {
                subject: "demo-user".into(),
                scopes: vec![],
            },
        );
        Harness {
            dispatcher,
            gateway,
            client,
            session,
            rx,
        }
    }

    async fn roundtrip(h: &mut Harness, text: &str) -> Value {
        h.dispatcher.handle_text(&h.session, text).await;
        let Some(reply) = h.rx.recv().await else {
            panic!("expected a response");
        };
        let Ok(value) = serde_json::from_str::<Value>(&reply) else {
            panic!("response is json");
        };
        value
    }

    #[tokio::test]
    async fn suggest_assignee_tool() {
        let mut h = harness();
        let reply = roundtrip(
            &mut h,
            r#"{"jsonrpc":"2.0","id":2,"method":"callTool","params":{"tool":"suggestAssignee","args":{"title":"Fix login bug"}}}"#,
        )
        .await;
        assert_eq!(reply["id"], 2);
        assert_eq!(reply["result"]["suggested"], "alice");
        assert!(reply.get("error").is_none());
    }

    #[tokio::test]
    async fn list_tasks_tool_returns_snapshot() {
        let mut h = harness();
        h.dispatcher
            .tasks
            .insert(Task::new("Write docs".into(), None))
            .await;
        let reply = roundtrip(
            &mut h,
            r#"{"id":"t","method":"callTool","params":{"tool":"listTasks"}}"#,
        )
        .await;
        assert_eq!(reply["id"], "t");
        assert_eq!(reply["result"]["tasks"][0]["title"], "Write docs");
    }

    #[tokio::test]
    async fn unknown_tool_is_404() {
        let mut h = harness();
        let reply = roundtrip(
            &mut h,
            r#"{"id":1,"method":"callTool","params":{"tool":"doesNotExist"}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], 404);
        assert!(reply.get("result").is_none());
    }

    #[tokio::test]
    async fn subscribe_without_channel_is_400() {
        let mut h = harness();
        let reply = roundtrip(&mut h, r#"{"id":1,"method":"subscribe","params":{}}"#).await;
        assert_eq!(reply["error"]["code"], 400);
        let reply = roundtrip(&mut h, r#"{"id":2,"method":"subscribe"}"#).await;
        assert_eq!(reply["error"]["code"], 400);
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe() {
        let mut h = harness();
        let reply = roundtrip(
            &mut h,
            r#"{"id":1,"method":"subscribe","params":{"channel":"tasks"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["subscribed"], "tasks");
        assert!(h.session.holds("tasks"));

        let reply = roundtrip(
            &mut h,
            r#"{"id":2,"method":"unsubscribe","params":{"channel":"tasks"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["unsubscribed"], "tasks");
        assert!(!h.session.holds("tasks"));
        assert_eq!(h.client.subscribe_calls(), 1);
        assert_eq!(h.client.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_channel_still_succeeds() {
        let mut h = harness();
        let reply = roundtrip(
            &mut h,
            r#"{"id":1,"method":"unsubscribe","params":{"channel":"never"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["unsubscribed"], "never");
        assert_eq!(h.client.unsubscribe_calls(), 0);

        let reply = roundtrip(&mut h, r#"{"id":2,"method":"unsubscribe"}"#).await;
        assert_eq!(reply["result"]["unsubscribed"], Value::Null);
    }

    #[tokio::test]
    async fn upstream_failure_is_500_and_rolled_back() {
        let mut h = harness();
        h.client.fail_subscribe(true);
        let reply = roundtrip(
            &mut h,
            r#"{"id":1,"method":"subscribe","params":{"channel":"tasks"}}"#,
        )
        .await;
        assert_eq!(reply["error"]["code"], 500);
        assert_eq!(reply["error"]["message"], "failed to subscribe to channel");
        assert!(!h.session.holds("tasks"));
        assert_eq!(h.gateway.subscriptions().refcount("tasks").await, 0);
    }

    #[tokio::test]
    async fn unknown_method_is_32601() {
        let mut h = harness();
        let reply = roundtrip(&mut h, r#"{"id":9,"method":"explode"}"#).await;
        assert_eq!(reply["error"]["code"], -32601);
        assert_eq!(reply["id"], 9);
    }

    #[tokio::test]
    async fn float_and_u64_ids_are_echoed() {
        let mut h = harness();
        let reply = roundtrip(
            &mut h,
            r#"{"id":1.5,"method":"callTool","params":{"tool":"suggestAssignee","args":{"title":"Fix login bug"}}}"#,
        )
        .await;
        assert_eq!(reply["id"], 1.5);
        assert_eq!(reply["result"]["suggested"], "alice");

        let reply = roundtrip(
            &mut h,
            r#"{"id":18446744073709551615,"method":"callTool","params":{"tool":"listTasks"}}"#,
        )
        .await;
        assert_eq!(reply["id"], u64::MAX);
        assert!(reply["result"]["tasks"].is_array());
    }

    #[tokio::test]
    async fn non_request_json_is_method_not_found() {
        let mut h = harness();
        for text in ["[1,2]", "5"] {
            let reply = roundtrip(&mut h, text).await;
            assert_eq!(reply["error"]["code"], -32601);
            assert_eq!(reply["id"], Value::Null);
        }
        let reply = roundtrip(&mut h, r#"{"id":4,"method":5}"#).await;
        assert_eq!(reply["error"]["code"], -32601);
        assert_eq!(reply["id"], 4);
    }

    #[tokio::test]
    async fn malformed_json_is_32700_with_null_id() {
        let mut h = harness();
        let reply = roundtrip(&mut h, "{not json").await;
        assert_eq!(reply["error"]["code"], -32700);
        assert_eq!(reply["id"], Value::Null);
        assert!(h.rx.try_recv().is_err());

        let reply = roundtrip(
            &mut h,
            r#"{"id":1,"method":"callTool","params":{"tool":"suggestAssignee","args":{"title":"Write docs"}}}"#,
        )
        .await;
        assert_eq!(reply["result"]["suggested"], "unassigned");
    }

    #[tokio::test]
    async fn panicking_handler_becomes_server_error() {
        let outcome = guarded(async {
            let fail = true;
            if fail {
                panic!("boom");
            }
            Ok::<Value, GatewayError>(Value::Null)
        })
        .await;
        let Err(err) = outcome else {
            panic!("panic should surface as an error");
        };
        assert_eq!(err.rpc_code(), -32000);
    }
}
