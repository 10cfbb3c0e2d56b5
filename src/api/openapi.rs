//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{CreateTaskRequest, TokenResponse};
use super::handlers::{system, tasks};
use crate::domain::{Task, TaskPatch};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "todo-gateway", description = "Task REST API feeding the WebSocket gateway"),
    paths(
        tasks::create_task,
        tasks::update_task,
        tasks::list_tasks,
        system::health_handler,
        system::token_handler,
    ),
    components(schemas(
        Task,
        TaskPatch,
        CreateTaskRequest,
        TokenResponse,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Tasks", description = "Task collection"),
        (name = "System", description = "Health and credentials"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_task_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/tasks"));
        assert!(doc.paths.paths.contains_key("/tasks/{id}"));
        assert!(doc.paths.paths.contains_key("/token"));
    }
}
