//! The plan synchronizer: reconciles billing-provider subscription state
//! into the local user record.
//!
//! Writes use set semantics throughout (see
//! [`PlanChangeDBRequest`](crate::db::models::users::PlanChangeDBRequest)),
//! so replayed webhook deliveries are safe without any event-ID
//! deduplication bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::db::models::users::{PlanChangeDBRequest, UserDBResponse};
use crate::db::store::UserStore;
use crate::entitlements::PlanTier;
use crate::errors::Result;
use crate::types::UserId;

/// Billing price IDs recognized as paid tiers.
///
/// Anything not listed here maps to `FREE` - an unrecognized price must
/// never wedge a user, it just strips their paid entitlement until the
/// mapping is corrected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceMap {
    pub pro: Option<String>,
    pub enterprise: Option<String>,
}

impl PriceMap {
    pub fn plan_for(&self, price_id: Option<&str>) -> PlanTier {
        match price_id {
            Some(price) if self.pro.as_deref() == Some(price) => PlanTier::Pro,
            Some(price) if self.enterprise.as_deref() == Some(price) => PlanTier::Enterprise,
            Some(price) => {
                warn!(price_id = %price, "unmapped billing price, defaulting to FREE");
                PlanTier::Free
            }
            None => {
                warn!("subscription carries no price, defaulting to FREE");
                PlanTier::Free
            }
        }
    }
}

/// Provider-reported subscription state, already reduced to the fields the
/// synchronizer acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub customer_id: String,
    pub subscription_id: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    /// Email the provider has on file for the customer; used as the
    /// resolution fallback before the local customer-ID backfill happens
    pub customer_email: Option<String>,
}

/// What happened to a routed subscription event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The local user record now reflects the provider state
    Applied { user_id: UserId, plan: PlanTier },
    /// No local user matched by customer ID or email; the event was logged
    /// and dropped (the provider redelivers on its own if this was a race
    /// with account creation)
    Unresolved,
}

pub struct PlanSynchronizer {
    users: Arc<dyn UserStore>,
    prices: PriceMap,
}

impl PlanSynchronizer {
    pub fn new(users: Arc<dyn UserStore>, prices: PriceMap) -> Self {
        Self { users, prices }
    }

    /// Apply a created/updated subscription: derive the tier from the price
    /// and write customer ID, subscription ID and period end together.
    ///
    /// Idempotent: applying the same state twice leaves the user record
    /// identical to applying it once.
    #[instrument(skip(self, sub), fields(subscription_id = %sub.subscription_id), err)]
    pub async fn apply_subscription(&self, sub: &SubscriptionState) -> Result<SyncOutcome> {
        let Some(user) = self.resolve_subscriber(&sub.customer_id, sub.customer_email.as_deref()).await? else {
            return Ok(SyncOutcome::Unresolved);
        };

        let plan = self.prices.plan_for(sub.price_id.as_deref());
        let change = PlanChangeDBRequest {
            plan,
            billing_customer_id: Some(sub.customer_id.clone()),
            billing_subscription_id: Some(sub.subscription_id.clone()),
            billing_period_end: sub.current_period_end,
        };
        self.users.apply_plan(user.id, &change).await?;

        info!(user_id = %user.id, %plan, "synchronized subscription into user record");
        Ok(SyncOutcome::Applied { user_id: user.id, plan })
    }

    /// Apply a cancellation: tier back to FREE, subscription ID and period
    /// end cleared. The customer ID is retained - the user remains a known
    /// customer at the provider.
    #[instrument(skip(self), err)]
    pub async fn clear_subscription(&self, customer_id: &str, customer_email: Option<&str>) -> Result<SyncOutcome> {
        let Some(user) = self.resolve_subscriber(customer_id, customer_email).await? else {
            return Ok(SyncOutcome::Unresolved);
        };

        let change = PlanChangeDBRequest {
            plan: PlanTier::Free,
            billing_customer_id: Some(customer_id.to_string()),
            billing_subscription_id: None,
            billing_period_end: None,
        };
        self.users.apply_plan(user.id, &change).await?;

        info!(user_id = %user.id, "subscription cancelled, user back on FREE");
        Ok(SyncOutcome::Applied {
            user_id: user.id,
            plan: PlanTier::Free,
        })
    }

    /// Resolve the local user a billing event refers to: by provider
    /// customer ID first, then by the provider-reported email (the webhook
    /// can arrive before the local customer-ID backfill). Events carrying
    /// neither a known customer nor a known email are logged at WARN so
    /// provisioning mismatches stay visible, and dropped.
    async fn resolve_subscriber(&self, customer_id: &str, customer_email: Option<&str>) -> Result<Option<UserDBResponse>> {
        if let Some(user) = self.users.get_by_customer_id(customer_id).await? {
            return Ok(Some(user));
        }

        if let Some(email) = customer_email {
            if let Some(user) = self.users.get_by_email(email).await? {
                info!(user_id = %user.id, "resolved subscriber by email fallback");
                return Ok(Some(user));
            }
        }

        warn!(
            %customer_id,
            has_email = customer_email.is_some(),
            "billing event references no local user, dropping"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryStore, test_prices};
    use chrono::TimeZone;

    fn synchronizer(store: &Arc<MemoryStore>) -> PlanSynchronizer {
        PlanSynchronizer::new(store.clone(), test_prices())
    }

    fn pro_subscription(customer_id: &str) -> SubscriptionState {
        SubscriptionState {
            customer_id: customer_id.to_string(),
            subscription_id: "sub_123".to_string(),
            price_id: Some("price_pro_monthly".to_string()),
            current_period_end: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            customer_email: None,
        }
    }

    #[test]
    fn test_price_map_fallbacks() {
        let prices = test_prices();
        assert_eq!(prices.plan_for(Some("price_pro_monthly")), PlanTier::Pro);
        assert_eq!(prices.plan_for(Some("price_enterprise_monthly")), PlanTier::Enterprise);
        assert_eq!(prices.plan_for(Some("price_from_the_future")), PlanTier::Free);
        assert_eq!(prices.plan_for(None), PlanTier::Free);
    }

    #[test_log::test(tokio::test)]
    async fn test_apply_links_customer_and_sets_plan() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing("pro@example.com", PlanTier::Free, Some("cus_42"), None, None)
            .await;

        let outcome = synchronizer(&store).apply_subscription(&pro_subscription("cus_42")).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                user_id: user.id,
                plan: PlanTier::Pro
            }
        );

        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.plan, PlanTier::Pro);
        assert_eq!(stored.billing_customer_id.as_deref(), Some("cus_42"));
        assert_eq!(stored.billing_subscription_id.as_deref(), Some("sub_123"));
        assert!(stored.billing_period_end.is_some());
    }

    #[test_log::test(tokio::test)]
    async fn test_apply_is_idempotent() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing("pro@example.com", PlanTier::Free, Some("cus_42"), None, None)
            .await;

        let sub = pro_subscription("cus_42");
        let sync = synchronizer(&store);

        sync.apply_subscription(&sub).await.unwrap();
        let after_once = store.user(user.id).await.unwrap();

        sync.apply_subscription(&sub).await.unwrap();
        let after_twice = store.user(user.id).await.unwrap();

        assert_eq!(after_once, after_twice);
    }

    #[test_log::test(tokio::test)]
    async fn test_email_fallback_backfills_customer_id() {
        let store = MemoryStore::new();
        // User exists but has never been linked to a billing customer
        let user = store.insert_user("new@example.com", PlanTier::Free).await;

        let mut sub = pro_subscription("cus_new");
        sub.customer_email = Some("new@example.com".to_string());

        let outcome = synchronizer(&store).apply_subscription(&sub).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Applied { plan: PlanTier::Pro, .. }));

        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.billing_customer_id.as_deref(), Some("cus_new"));
        assert_eq!(stored.plan, PlanTier::Pro);
    }

    #[test_log::test(tokio::test)]
    async fn test_unresolved_subscriber_is_dropped_not_an_error() {
        let store = MemoryStore::new();

        let mut sub = pro_subscription("cus_unknown");
        sub.customer_email = Some("nobody@example.com".to_string());

        let outcome = synchronizer(&store).apply_subscription(&sub).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unresolved);
    }

    #[test_log::test(tokio::test)]
    async fn test_unmapped_price_downgrades_to_free_instead_of_failing() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing("pro@example.com", PlanTier::Pro, Some("cus_42"), Some("sub_123"), None)
            .await;

        let mut sub = pro_subscription("cus_42");
        sub.price_id = Some("price_unknown".to_string());

        let outcome = synchronizer(&store).apply_subscription(&sub).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Applied { plan: PlanTier::Free, .. }));
        assert_eq!(store.user(user.id).await.unwrap().plan, PlanTier::Free);
    }

    #[test_log::test(tokio::test)]
    async fn test_clear_resets_plan_and_keeps_customer_id() {
        let store = MemoryStore::new();
        let period_end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let user = store
            .insert_user_with_billing(
                "pro@example.com",
                PlanTier::Pro,
                Some("cus_42"),
                Some("sub_123"),
                Some(period_end),
            )
            .await;

        let outcome = synchronizer(&store).clear_subscription("cus_42", None).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                user_id: user.id,
                plan: PlanTier::Free
            }
        );

        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.plan, PlanTier::Free);
        assert_eq!(stored.billing_customer_id.as_deref(), Some("cus_42"));
        assert_eq!(stored.billing_subscription_id, None);
        assert_eq!(stored.billing_period_end, None);
    }
}
