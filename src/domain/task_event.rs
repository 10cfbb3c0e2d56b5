//! Events emitted when the task collection changes.
//!
//! Every mutation publishes a [`TaskEvent`] on [`TASKS_CHANNEL`]; the
//! gateway forwards it to subscribed sessions as an opaque payload.

use serde::Serialize;

use super::Task;

/// Channel on which task events are published.
pub const TASKS_CHANNEL: &str = "tasks";

/// Domain event emitted after every task mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was created.
    Created {
        /// Snapshot of the new task.
        task: Task,
    },
    /// A task was updated.
    Updated {
        /// Snapshot of the task after the update.
        task: Task,
    },
}
