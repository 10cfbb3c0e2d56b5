//! Gateway error types with HTTP status and RPC code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to an HTTP status code (REST endpoints) and to a numeric RPC error
//! code (WebSocket envelopes).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::bus::BusError;

/// Structured JSON error response body.
///
/// All REST error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 400,
///     "message": "title required"
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum.
///
/// # RPC Error Codes
///
/// | Code     | Meaning                                  |
/// |----------|------------------------------------------|
/// | `-32700` | message is not valid JSON                |
/// | `-32601` | unknown method                           |
/// | `400`    | missing parameter                        |
/// | `401`    | unauthorized                             |
/// | `404`    | unknown tool                             |
/// | `500`    | upstream subscribe failure               |
/// | `-32000` | unhandled server error                   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing, invalid or expired credential.
    #[error("unauthorized")]
    Unauthorized,

    /// Inbound message could not be decoded as JSON.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The requested RPC method does not exist.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// A required parameter was absent.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// `callTool` named a tool that does not exist.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The upstream subscription for a channel could not be established.
    #[error("failed to subscribe to channel {channel}: {source}")]
    SubscribeFailed {
        /// Channel the session asked for.
        channel: String,
        /// Underlying bus failure.
        #[source]
        source: BusError,
    },

    /// No task matches the given ID (including IDs that do not parse).
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// REST payload failed validation.
    #[error("{0}")]
    Validation(String),

    /// Error propagated from the notification bus.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the RPC error code carried in error envelopes.
    #[must_use]
    pub const fn rpc_code(&self) -> i32 {
        match self {
            Self::ParseError(_) => -32700,
            Self::MethodNotFound(_) => -32601,
            Self::MissingParameter(_) | Self::Validation(_) => 400,
            Self::Unauthorized => 401,
            Self::ToolNotFound(_) | Self::TaskNotFound(_) => 404,
            Self::SubscribeFailed { .. } => 500,
            Self::Bus(_) | Self::Internal(_) => -32000,
        }
    }

    /// Returns the client-facing message for error envelopes.
    ///
    /// Server-side detail is omitted for `-32000`.
    #[must_use]
    pub fn rpc_message(&self) -> String {
        match self {
            Self::ParseError(_) => "Parse error".to_string(),
            Self::MethodNotFound(_) => "Method not found".to_string(),
            Self::MissingParameter(name) => format!("{name} required"),
            Self::Unauthorized => "unauthorized".to_string(),
            Self::ToolNotFound(_) => "tool not found".to_string(),
            Self::TaskNotFound(_) => "not found".to_string(),
            Self::SubscribeFailed { .. } => "failed to subscribe to channel".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Bus(_) | Self::Internal(_) => "Server error".to_string(),
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ParseError(_)
            | Self::MissingParameter(_)
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MethodNotFound(_) | Self::ToolNotFound(_) | Self::TaskNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::SubscribeFailed { .. } | Self::Bus(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: i32::from(status.as_u16()),
                message: self.rpc_message(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn rpc_codes_match_protocol_table() {
        assert_eq!(GatewayError::ParseError(String::new()).rpc_code(), -32700);
        assert_eq!(GatewayError::MethodNotFound("x".into()).rpc_code(), -32601);
        assert_eq!(GatewayError::MissingParameter("channel").rpc_code(), 400);
        assert_eq!(GatewayError::Unauthorized.rpc_code(), 401);
        assert_eq!(GatewayError::ToolNotFound("x".into()).rpc_code(), 404);
        assert_eq!(GatewayError::Internal("boom".into()).rpc_code(), -32000);
        let failed = GatewayError::SubscribeFailed {
            channel: "tasks".into(),
            source: BusError::Unavailable,
        };
        assert_eq!(failed.rpc_code(), 500);
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = GatewayError::Internal("secret stack trace".into());
        assert_eq!(err.rpc_message(), "Server error");
    }

    #[test]
    fn missing_parameter_names_the_parameter() {
        let err = GatewayError::MissingParameter("channel");
        assert_eq!(err.rpc_message(), "channel required");
    }

    #[test]
    fn task_not_found_maps_to_404() {
        let err = GatewayError::TaskNotFound("abc".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
