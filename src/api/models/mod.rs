//! API request and response data models.
//!
//! These models define the public API contract and are distinct from the
//! database models, allowing independent evolution of API and storage
//! representations. All models are annotated with `utoipa` for automatic
//! API docs.

pub mod summaries;
pub mod users;
