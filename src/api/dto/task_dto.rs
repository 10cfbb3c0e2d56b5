//! Task DTOs for the REST endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /tasks`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    /// Task title. Required and non-empty.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional assignee tag.
    #[serde(default)]
    pub assignee: Option<String>,
}

/// Response body for `GET /token`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Signed bearer token for the WebSocket handshake.
    pub token: String,
}
