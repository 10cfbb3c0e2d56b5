//! Task entity carried as notification payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// A to-do item.
///
/// The gateway core never inspects these fields; tasks travel through the
/// bus as opaque JSON inside [`super::TaskEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier (immutable after creation).
    pub id: TaskId,
    /// Free-text title.
    pub title: String,
    /// Completion flag.
    pub done: bool,
    /// Optional assignee tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new open task.
    #[must_use]
    pub fn new(title: String, assignee: Option<String>) -> Self {
        Self {
            id: TaskId::new(),
            title,
            done: false,
            assignee,
            updated_at: Utc::now(),
        }
    }

    /// Applies a partial update and bumps `updated_at`.
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(done) = patch.done {
            self.done = done;
        }
        if let Some(assignee) = patch.assignee {
            self.assignee = Some(assignee);
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update for a [`Task`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct TaskPatch {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
    /// New completion flag.
    #[serde(default)]
    pub done: Option<bool>,
    /// New assignee.
    #[serde(default)]
    pub assignee: Option<String>,
}
