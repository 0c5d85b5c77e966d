//! Database models for users.

use crate::entitlements::PlanTier;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub auth_source: String,
    pub plan: PlanTier,
}

/// Database request for applying a plan change.
///
/// Set semantics: every field here is written verbatim, including the
/// `None`s (which clear the corresponding column). This is what makes the
/// plan synchronizer idempotent under webhook replays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanChangeDBRequest {
    pub plan: PlanTier,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub billing_period_end: Option<DateTime<Utc>>,
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub auth_source: String,
    pub plan: PlanTier,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub billing_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
