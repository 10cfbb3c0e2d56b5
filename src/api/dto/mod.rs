//! Data Transfer Objects for REST request/response serialization.

pub mod task_dto;

pub use task_dto::*;
