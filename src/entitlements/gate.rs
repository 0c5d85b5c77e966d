//! The usage gate: decides whether a user may produce another summary.
//!
//! [`UsageGate::check`] is a decision, not an enforcement action - it never
//! blocks the subsequent write itself. Callers performing the billable
//! write call [`UsageGate::enforce`] immediately before it; the
//! check-then-act window between the two is an accepted trade-off (a user
//! may overshoot by at most the number of concurrently in-flight requests).
//! Keeping check and commit as separate phases means a transactional guard
//! can later wrap the pair without changing this contract.
//!
//! Every check reads plan tier and usage fresh from the store; nothing is
//! cached across requests.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tracing::instrument;

use crate::db::models::users::UserDBResponse;
use crate::db::store::{SummaryStore, UserStore};
use crate::entitlements::{EntitlementPolicy, UsageLimit, UsagePeriod};
use crate::errors::{Error, Result};
use crate::types::{UserId, abbrev_uuid};

/// First instant of the calendar month containing `now`, in UTC.
///
/// UTC is the fixed reference timezone for monthly windows; a record
/// created at 23:59 UTC on the last day of a month never counts toward the
/// next month, regardless of the user's locale.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first instant of a calendar month is unambiguous in UTC")
}

pub struct UsageGate {
    users: Arc<dyn UserStore>,
    summaries: Arc<dyn SummaryStore>,
    policy: EntitlementPolicy,
}

impl UsageGate {
    pub fn new(users: Arc<dyn UserStore>, summaries: Arc<dyn SummaryStore>, policy: EntitlementPolicy) -> Self {
        Self { users, summaries, policy }
    }

    /// Check the user's usage against their entitlement.
    ///
    /// A missing user yields a denied result (`reason = "User not found"`),
    /// not an error; persistence failures propagate as errors and are never
    /// treated as "allowed".
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn check(&self, user_id: UserId) -> Result<UsageLimit> {
        let Some(user) = self.users.get_by_id(user_id).await? else {
            return Ok(UsageLimit {
                allowed: false,
                limit: 0,
                current: 0,
                remaining: 0,
                reason: Some("User not found".to_string()),
            });
        };

        self.evaluate(&user).await
    }

    /// Check and signal: like [`check`](Self::check), but a denial becomes a
    /// distinguishable error the caller can surface directly. Callers that
    /// create a summary invoke this immediately before the write.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn enforce(&self, user_id: UserId) -> Result<UsageLimit> {
        let Some(user) = self.users.get_by_id(user_id).await? else {
            return Err(Error::NotFound {
                resource: "User".to_string(),
                id: user_id.to_string(),
            });
        };

        let usage = self.evaluate(&user).await?;
        if usage.allowed {
            Ok(usage)
        } else {
            Err(Error::QuotaExceeded {
                current: usage.current,
                limit: usage.limit,
            })
        }
    }

    async fn evaluate(&self, user: &UserDBResponse) -> Result<UsageLimit> {
        let entitlement = self.policy.limit_for(user.plan);

        let since = match entitlement.period {
            UsagePeriod::Monthly => Some(month_start(Utc::now())),
            UsagePeriod::Lifetime => None,
        };

        let current = self.summaries.count_active_since(user.id, since).await?;

        let allowed = current < entitlement.limit;
        let reason = if allowed {
            None
        } else {
            Some(match entitlement.period {
                UsagePeriod::Monthly => "Monthly limit reached".to_string(),
                UsagePeriod::Lifetime => "Lifetime limit reached".to_string(),
            })
        };

        Ok(UsageLimit {
            allowed,
            limit: entitlement.limit,
            current,
            remaining: (entitlement.limit - current).max(0),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::PlanTier;
    use crate::test_utils::MemoryStore;
    use chrono::Duration;

    fn gate(store: &Arc<MemoryStore>) -> UsageGate {
        UsageGate::new(store.clone(), store.clone(), EntitlementPolicy::default())
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 14, 30, 5).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

        // Already at the boundary: unchanged
        let boundary = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(month_start(boundary), boundary);
    }

    #[test_log::test(tokio::test)]
    async fn test_allowed_under_limit() {
        let store = MemoryStore::new();
        let user = store.insert_user("free@example.com", PlanTier::Free).await;
        store.insert_summary(user.id, Utc::now(), false).await;

        let usage = gate(&store).check(user.id).await.unwrap();
        assert!(usage.allowed);
        assert_eq!(usage.limit, 3);
        assert_eq!(usage.current, 1);
        assert_eq!(usage.remaining, 2);
        assert_eq!(usage.reason, None);
    }

    #[test_log::test(tokio::test)]
    async fn test_denied_at_lifetime_limit() {
        let store = MemoryStore::new();
        let user = store.insert_user("free@example.com", PlanTier::Free).await;
        for _ in 0..3 {
            store.insert_summary(user.id, Utc::now(), false).await;
        }

        let usage = gate(&store).check(user.id).await.unwrap();
        assert_eq!(
            usage,
            UsageLimit {
                allowed: false,
                limit: 3,
                current: 3,
                remaining: 0,
                reason: Some("Lifetime limit reached".to_string()),
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_archived_records_never_count() {
        let store = MemoryStore::new();
        let user = store.insert_user("free@example.com", PlanTier::Free).await;
        for _ in 0..5 {
            store.insert_summary(user.id, Utc::now(), true).await;
        }
        store.insert_summary(user.id, Utc::now(), false).await;
        store.insert_summary(user.id, Utc::now(), false).await;

        let usage = gate(&store).check(user.id).await.unwrap();
        assert!(usage.allowed);
        assert_eq!(usage.current, 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_monthly_window_excludes_previous_months() {
        let store = MemoryStore::new();
        let user = store.insert_user("pro@example.com", PlanTier::Pro).await;

        // 50 summaries from well before this month's start
        let last_month = month_start(Utc::now()) - Duration::days(10);
        for _ in 0..50 {
            store.insert_summary(user.id, last_month, false).await;
        }
        // 10 from this month
        for _ in 0..10 {
            store.insert_summary(user.id, Utc::now(), false).await;
        }

        let usage = gate(&store).check(user.id).await.unwrap();
        assert!(usage.allowed);
        assert_eq!(usage.limit, 25);
        assert_eq!(usage.current, 10);
        assert_eq!(usage.remaining, 15);
    }

    #[test_log::test(tokio::test)]
    async fn test_denied_at_monthly_limit_names_the_period() {
        let store = MemoryStore::new();
        let user = store.insert_user("pro@example.com", PlanTier::Pro).await;
        for _ in 0..25 {
            store.insert_summary(user.id, Utc::now(), false).await;
        }

        let usage = gate(&store).check(user.id).await.unwrap();
        assert!(!usage.allowed);
        assert_eq!(usage.reason.as_deref(), Some("Monthly limit reached"));
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_user_is_a_denied_check_not_an_error() {
        let store = MemoryStore::new();

        let usage = gate(&store).check(uuid::Uuid::new_v4()).await.unwrap();
        assert_eq!(
            usage,
            UsageLimit {
                allowed: false,
                limit: 0,
                current: 0,
                remaining: 0,
                reason: Some("User not found".to_string()),
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_enforce_signals_quota_exceeded_with_counts() {
        let store = MemoryStore::new();
        let user = store.insert_user("free@example.com", PlanTier::Free).await;
        for _ in 0..3 {
            store.insert_summary(user.id, Utc::now(), false).await;
        }

        let err = gate(&store).enforce(user.id).await.unwrap_err();
        match err {
            Error::QuotaExceeded { current, limit } => {
                assert_eq!(current, 3);
                assert_eq!(limit, 3);
            }
            other => panic!("Expected QuotaExceeded, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_enforce_passes_through_when_allowed() {
        let store = MemoryStore::new();
        let user = store.insert_user("free@example.com", PlanTier::Free).await;

        let usage = gate(&store).enforce(user.id).await.unwrap();
        assert!(usage.allowed);
        assert_eq!(usage.remaining, 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_anonymous_tier_gets_single_lifetime_summary() {
        let store = MemoryStore::new();
        let user = store.insert_user("guest-1@anon.recap.app", PlanTier::Anonymous).await;

        let usage = gate(&store).check(user.id).await.unwrap();
        assert!(usage.allowed);
        assert_eq!(usage.limit, 1);

        store.insert_summary(user.id, Utc::now(), false).await;
        let usage = gate(&store).check(user.id).await.unwrap();
        assert!(!usage.allowed);
        assert_eq!(usage.reason.as_deref(), Some("Lifetime limit reached"));
    }

    #[test_log::test(tokio::test)]
    async fn test_enterprise_is_effectively_unlimited() {
        let store = MemoryStore::new();
        let user = store.insert_user("ent@example.com", PlanTier::Enterprise).await;
        for _ in 0..100 {
            store.insert_summary(user.id, Utc::now(), false).await;
        }

        let usage = gate(&store).check(user.id).await.unwrap();
        assert!(usage.allowed);
        assert_eq!(usage.current, 100);
    }
}
