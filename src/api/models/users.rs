//! API request/response models for users.

use crate::db::models::users::UserDBResponse;
use crate::entitlements::PlanTier;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User profile as exposed through the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub plan: PlanTier,
    /// End of the current billing period, when subscribed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_period_end: Option<DateTime<Utc>>,
    /// Whether this user is linked to a billing-provider customer record.
    ///
    /// The provider customer ID itself is never exposed through the API.
    pub has_billing_customer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            display_name: db.display_name,
            plan: db.plan,
            billing_period_end: db.billing_period_end,
            has_billing_customer: db.billing_customer_id.is_some(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// The authenticated caller, as resolved by the auth extractor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub plan: PlanTier,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            display_name: db.display_name,
            plan: db.plan,
        }
    }
}
