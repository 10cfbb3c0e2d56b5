//! Service layer: business logic orchestration.
//!
//! [`TaskService`] owns task mutations and emits task events through the
//! [`crate::gateway::Gateway`].

pub mod task_service;

pub use task_service::TaskService;
