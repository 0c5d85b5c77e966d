//! Plan tiers and the entitlements they grant.
//!
//! Every user belongs to a [`PlanTier`]; each tier maps to an
//! [`Entitlement`] - how many summaries the user may hold, counted over a
//! [`UsagePeriod`]. The mapping lives in [`EntitlementPolicy`], which is
//! loaded from configuration at startup and immutable afterwards: changing
//! a limit is a deployment, not a data mutation.
//!
//! Tier changes are driven by the billing provider (see
//! [`sync::PlanSynchronizer`]); enforcement happens in [`gate::UsageGate`].
//! Billing price IDs that don't map to a known tier resolve to `FREE` - the
//! documented fallback, so an unrecognized price can never wedge a user.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod gate;
pub mod sync;

pub use gate::UsageGate;
pub use sync::{PlanSynchronizer, PriceMap, SubscriptionState, SyncOutcome};

/// Billing category a user belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "plan_tier", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTier {
    /// Unauthenticated guest identities
    Anonymous,
    Free,
    Pro,
    Enterprise,
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanTier::Anonymous => write!(f, "ANONYMOUS"),
            PlanTier::Free => write!(f, "FREE"),
            PlanTier::Pro => write!(f, "PRO"),
            PlanTier::Enterprise => write!(f, "ENTERPRISE"),
        }
    }
}

/// Window over which usage counts toward the limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UsagePeriod {
    /// All non-archived summaries, ever
    Lifetime,
    /// Non-archived summaries created since the first instant of the
    /// current calendar month, in UTC
    Monthly,
}

/// The `{limit, period}` pair a plan tier grants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Entitlement {
    pub limit: i64,
    pub period: UsagePeriod,
}

/// Per-tier entitlement table.
///
/// Deserialized as part of the application config; the defaults below are
/// the shipped tiers. Total over [`PlanTier`] by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EntitlementPolicy {
    pub anonymous: Entitlement,
    pub free: Entitlement,
    pub pro: Entitlement,
    pub enterprise: Entitlement,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            anonymous: Entitlement {
                limit: 1,
                period: UsagePeriod::Lifetime,
            },
            free: Entitlement {
                limit: 3,
                period: UsagePeriod::Lifetime,
            },
            pro: Entitlement {
                limit: 25,
                period: UsagePeriod::Monthly,
            },
            // Effectively unlimited
            enterprise: Entitlement {
                limit: i64::MAX,
                period: UsagePeriod::Monthly,
            },
        }
    }
}

impl EntitlementPolicy {
    /// Look up the entitlement for a plan tier. Total: every tier has a row.
    pub fn limit_for(&self, tier: PlanTier) -> Entitlement {
        match tier {
            PlanTier::Anonymous => self.anonymous,
            PlanTier::Free => self.free,
            PlanTier::Pro => self.pro,
            PlanTier::Enterprise => self.enterprise,
        }
    }
}

/// Result of a usage check. Computed fresh per check, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct UsageLimit {
    pub allowed: bool,
    pub limit: i64,
    pub current: i64,
    pub remaining: i64,
    /// Human-readable denial reason; absent when allowed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
