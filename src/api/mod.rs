//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Summaries** (`/api/v1/summaries/*`): the billable resource, gated by
//!   the usage limit
//! - **Usage** (`/api/v1/usage`): the current user's quota standing
//! - **Users** (`/api/v1/users/me`): profile with plan tier
//! - **Billing webhooks** (`/webhooks/billing`): signed provider events
//!
//! All client-facing endpoints are documented with OpenAPI annotations
//! using `utoipa`; docs are served at `/docs` when the server is running.

pub mod handlers;
pub mod models;
