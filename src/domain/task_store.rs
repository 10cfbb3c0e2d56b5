//! In-memory task collection.
//!
//! [`TaskStore`] is the event source's backing store. Tasks are kept in
//! creation order behind a single [`tokio::sync::RwLock`]; the collection
//! is small and every mutation is a short critical section.

use tokio::sync::RwLock;

use super::{Task, TaskId, TaskPatch};
use crate::error::GatewayError;

/// Central store for all tasks.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<Vec<Task>>,
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task and returns a copy of it.
    pub async fn insert(&self, task: Task) -> Task {
        let mut tasks = self.tasks.write().await;
        tasks.push(task.clone());
        task
    }

    /// Applies `patch` to the task with the given ID and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TaskNotFound`] if no task has that ID.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task, GatewayError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| GatewayError::TaskNotFound(id.to_string()))?;
        task.apply(patch);
        Ok(task.clone())
    }

    /// Returns a snapshot of every task in creation order.
    pub async fn snapshot(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_returns_stored_task() {
        let store = TaskStore::new();
        let task = store.insert(Task::new("Write docs".into(), None)).await;
        assert_eq!(store.snapshot().await, vec![task]);
    }

    #[tokio::test]
    async fn snapshot_keeps_creation_order() {
        let store = TaskStore::new();
        let a = store.insert(Task::new("a".into(), None)).await;
        let b = store.insert(Task::new("b".into(), None)).await;
        let ids: Vec<TaskId> = store.snapshot().await.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn update_unknown_task_fails() {
        let store = TaskStore::new();
        let result = store.update(TaskId::new(), TaskPatch::default()).await;
        assert!(matches!(result, Err(GatewayError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn update_applies_patch() {
        let store = TaskStore::new();
        let task = store.insert(Task::new("a".into(), None)).await;
        let patch = TaskPatch {
            done: Some(true),
            ..TaskPatch::default()
        };
        let Ok(updated) = store.update(task.id, patch).await else {
            panic!("update should succeed");
        };
        assert!(updated.done);
        assert_eq!(store.snapshot().await, vec![updated]);
    }
}
