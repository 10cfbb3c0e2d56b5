//! Domain layer: the task collection that feeds the gateway.
//!
//! Tasks are produced by the REST endpoints and consumed by the gateway
//! only as opaque event payloads published on the `tasks` channel.

pub mod task;
pub mod task_event;
pub mod task_id;
pub mod task_store;

pub use task::{Task, TaskPatch};
pub use task_event::{TASKS_CHANNEL, TaskEvent};
pub use task_id::TaskId;
pub use task_store::TaskStore;
