//! PostgreSQL implementations of the store traits.
//!
//! Each repository wraps the shared connection pool, provides
//! strongly-typed CRUD operations, and returns domain models from
//! [`crate::db::models`]. Queries use the runtime-checked sqlx API so the
//! crate compiles without a live database.

pub mod summaries;
pub mod users;

pub use summaries::PgSummaries;
pub use users::PgUsers;
