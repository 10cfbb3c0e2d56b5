//! WebSocket envelopes: requests, responses, notifications.
//!
//! The protocol is JSON-RPC 2.0 shaped. Clients send [`RpcRequest`]s; the
//! server answers each with exactly one [`RpcResponse`] and pushes
//! [`Notification`]s for subscribed channels.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

/// Protocol version tag carried on every outbound envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Client-chosen request correlation ID, echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric ID (integer or float, any magnitude JSON allows).
    Number(serde_json::Number),
    /// String ID.
    String(String),
}

/// Inbound request envelope.
#[derive(Debug, Clone, Default)]
pub struct RpcRequest {
    /// Protocol tag; accepted but not enforced.
    pub jsonrpc: Option<String>,
    /// Correlation ID echoed in the response.
    pub id: Option<RequestId>,
    /// Method name. Missing or non-string is treated as an unknown method.
    pub method: String,
    /// Method parameters.
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Reads whatever request fields `value` carries.
    ///
    /// Anything that is not an object yields an empty request, which
    /// routes to "method not found". An `id` that is neither a number nor
    /// a string is dropped.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        let id = fields
            .remove("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
        let text = |v: Option<Value>| match v {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Self {
            jsonrpc: text(fields.remove("jsonrpc")),
            id,
            method: text(fields.remove("method")).unwrap_or_default(),
            params: fields.remove("params"),
        }
    }

    /// Returns the string parameter `name`, treating empty strings as absent.
    #[must_use]
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params
            .as_ref()
            .and_then(|p| p.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Error object inside a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl From<&GatewayError> for RpcErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            code: err.rpc_code(),
            message: err.rpc_message(),
        }
    }
}

/// Outbound response envelope. Carries either `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echo of the request ID; `null` when there was none.
    pub id: Option<RequestId>,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response from a [`GatewayError`].
    #[must_use]
    pub fn failure(id: Option<RequestId>, err: &GatewayError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcErrorBody::from(err)),
        }
    }

    /// Builds a success or error response from a handler outcome.
    #[must_use]
    pub fn from_result(id: Option<RequestId>, outcome: Result<Value, GatewayError>) -> Self {
        match outcome {
            Ok(result) => Self::success(id, result),
            Err(err) => Self::failure(id, &err),
        }
    }
}

/// Parameters of a [`Notification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationParams {
    /// Channel the payload was published on.
    pub channel: String,
    /// Published payload.
    pub payload: Value,
}

/// Server-pushed notification for a subscribed channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Always `"notification"`.
    pub method: String,
    /// Channel and payload.
    pub params: NotificationParams,
}

impl Notification {
    /// Builds a notification for `channel`.
    #[must_use]
    pub fn new(channel: &str, payload: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: "notification".to_string(),
            params: NotificationParams {
                channel: channel.to_string(),
                payload,
            },
        }
    }
}

/// Decodes one inbound text frame.
///
/// Any JSON value decodes; see [`RpcRequest::from_value`].
///
/// # Errors
///
/// Returns [`GatewayError::ParseError`] for text that is not JSON.
pub fn decode_request(text: &str) -> Result<RpcRequest, GatewayError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| GatewayError::ParseError(e.to_string()))?;
    Ok(RpcRequest::from_value(value))
}
