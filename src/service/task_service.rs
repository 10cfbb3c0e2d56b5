//! Task service: mutates the task collection and publishes task events.

use std::sync::Arc;

use crate::domain::{TASKS_CHANNEL, Task, TaskEvent, TaskId, TaskPatch, TaskStore};
use crate::error::GatewayError;
use crate::gateway::Gateway;

/// Orchestration layer for task operations.
///
/// Every mutation follows the pattern: validate → update the store →
/// publish a [`TaskEvent`] on [`TASKS_CHANNEL`] → return the task.
#[derive(Debug, Clone)]
pub struct TaskService {
    store: Arc<TaskStore>,
    gateway: Arc<Gateway>,
}

impl TaskService {
    /// Creates a new `TaskService`.
    #[must_use]
    pub fn new(store: Arc<TaskStore>, gateway: Arc<Gateway>) -> Self {
        Self { store, gateway }
    }

    /// Creates a task and publishes a `created` event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] if `title` is empty.
    pub async fn create(
        &self,
        title: Option<String>,
        assignee: Option<String>,
    ) -> Result<Task, GatewayError> {
        let title = title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::Validation("title required".to_string()))?;
        let task = self.store.insert(Task::new(title, assignee)).await;
        tracing::info!(task_id = %task.id, "task created");
        self.emit(TaskEvent::Created { task: task.clone() }).await;
        Ok(task)
    }

    /// Applies a partial update and publishes an `updated` event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TaskNotFound`] if the task does not exist.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task, GatewayError> {
        let task = self.store.update(id, patch).await?;
        tracing::info!(task_id = %task.id, "task updated");
        self.emit(TaskEvent::Updated { task: task.clone() }).await;
        Ok(task)
    }

    /// Returns every task in creation order.
    pub async fn list(&self) -> Vec<Task> {
        self.store.snapshot().await
    }

    async fn emit(&self, event: TaskEvent) {
        if let Err(e) = self.gateway.publish(TASKS_CHANNEL, &event).await {
            tracing::error!(error = %e, "failed to publish task event");
        }
    }
}
