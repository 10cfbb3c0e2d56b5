//! Task handlers: create, update, list.
//!
//! Every mutation is published on the `tasks` channel by the
//! [`crate::service::TaskService`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};

use crate::api::dto::CreateTaskRequest;
use crate::app_state::AppState;
use crate::domain::{Task, TaskId, TaskPatch};
use crate::error::{ErrorResponse, GatewayError};

/// `POST /tasks` — Create a task.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] if the title is missing.
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    summary = "Create a task",
    description = "Creates an open task and publishes a `created` event on the `tasks` channel.",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Title missing", body = ErrorResponse),
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let task = state.task_service.create(req.title, req.assignee).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /tasks/:id` — Update a task.
///
/// # Errors
///
/// Returns [`GatewayError::TaskNotFound`] if `id` is not a task ID or no
/// task has it.
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    summary = "Update a task",
    description = "Applies a partial update and publishes an `updated` event on the `tasks` channel.",
    params(
        ("id" = String, Path, description = "Task UUID"),
    ),
    request_body = TaskPatch,
    responses(
        (status = 200, description = "Updated task", body = Task),
        (status = 404, description = "Task not found", body = ErrorResponse),
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let id: TaskId = id.parse().map_err(|_| GatewayError::TaskNotFound(id.clone()))?;
    let task = state.task_service.update(id, patch).await?;
    Ok(Json(task))
}

/// `GET /tasks` — List tasks.
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    summary = "List tasks",
    description = "Returns every task in creation order.",
    responses(
        (status = 200, description = "All tasks", body = Vec<Task>),
    )
)]
pub async fn list_tasks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.task_service.list().await)
}

/// Task routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", put(update_task))
}
