//! Store traits: the persistence seam.
//!
//! Both the HTTP handlers and the entitlement components (usage gate, plan
//! synchronizer) depend on these traits rather than on a concrete database,
//! so a test can swap in an in-memory fake without touching the logic under
//! test. The PostgreSQL implementations live in [`crate::db::handlers`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::errors::Result;
use crate::db::models::summaries::{SummaryCreateDBRequest, SummaryDBResponse, SummaryFilter, SummaryUpdateDBRequest};
use crate::db::models::users::{PlanChangeDBRequest, UserCreateDBRequest, UserDBResponse};
use crate::types::{SummaryId, UserId};

/// Access to user records and their billing linkage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a new user
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Get a user by ID
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Get a user by email address
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    /// Get a user by the billing provider's customer ID
    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Option<UserDBResponse>>;

    /// Apply a plan change with set semantics: every billing column is
    /// written from `change`, so applying the same change twice is a no-op
    /// beyond the first application.
    async fn apply_plan(&self, id: UserId, change: &PlanChangeDBRequest) -> Result<UserDBResponse>;
}

/// Access to summary records (the usage ledger).
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Create a new summary
    async fn create(&self, request: &SummaryCreateDBRequest) -> Result<SummaryDBResponse>;

    /// Get a summary by ID
    async fn get_by_id(&self, id: SummaryId) -> Result<Option<SummaryDBResponse>>;

    /// List a user's summaries, newest first
    async fn list_for_user(&self, user_id: UserId, filter: &SummaryFilter) -> Result<Vec<SummaryDBResponse>>;

    /// Update a summary (rename, archive, unarchive)
    async fn update(&self, id: SummaryId, request: &SummaryUpdateDBRequest) -> Result<SummaryDBResponse>;

    /// Delete a summary. Returns false if it didn't exist.
    async fn delete(&self, id: SummaryId) -> Result<bool>;

    /// Count a user's non-archived summaries created at or after `since`
    /// (all of them when `since` is `None`). This is the usage counter:
    /// read-only, and always hits the store - usage counts are never cached
    /// across requests.
    async fn count_active_since(&self, user_id: UserId, since: Option<DateTime<Utc>>) -> Result<i64>;
}
