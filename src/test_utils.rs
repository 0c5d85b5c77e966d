//! Test support: in-memory store fakes and app-state builders.
//!
//! The in-memory implementations mirror the PostgreSQL stores' observable
//! behavior (uniqueness of email and billing IDs, set-semantics plan
//! writes) so the entitlement logic and the HTTP layer can be exercised
//! without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::billing::events::SubscriptionObject;
use crate::billing::provider::{BillingApi, BillingApiError};

use crate::config::{BillingConfig, Config};
use crate::db::errors::{DbError, Result};
use crate::db::models::summaries::{SummaryCreateDBRequest, SummaryDBResponse, SummaryFilter, SummaryUpdateDBRequest};
use crate::db::models::users::{PlanChangeDBRequest, UserCreateDBRequest, UserDBResponse};
use crate::db::store::{SummaryStore, UserStore};
use crate::entitlements::{PlanTier, PriceMap};
use crate::types::{SummaryId, UserId};
use crate::{AppState, build_router};

/// Webhook secret used by `test_config`. Deterministic so tests can sign
/// payloads without threading the secret around.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

/// Price map used by `test_config`
pub fn test_prices() -> PriceMap {
    PriceMap {
        pro: Some("price_pro_monthly".to_string()),
        enterprise: Some("price_enterprise_monthly".to_string()),
    }
}

/// Config with billing enabled and defaults everywhere else
pub fn test_config() -> Config {
    Config {
        billing: Some(BillingConfig {
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            api_url: None,
            api_key: None,
            api_timeout: Duration::from_secs(10),
            prices: test_prices(),
        }),
        ..Config::default()
    }
}

/// App state backed by the in-memory store
pub fn test_state(store: &Arc<MemoryStore>) -> AppState {
    AppState::builder()
        .config(test_config())
        .users(store.clone() as Arc<dyn UserStore>)
        .summaries(store.clone() as Arc<dyn SummaryStore>)
        .build()
}

/// Test server over the full router, backed by the in-memory store
pub fn test_server(store: &Arc<MemoryStore>) -> axum_test::TestServer {
    axum_test::TestServer::new(build_router(test_state(store))).expect("Failed to create test server")
}

/// Like [`test_server`], with a canned provider API for checkout resolution
pub fn test_server_with_billing(store: &Arc<MemoryStore>, api: StaticBillingApi) -> axum_test::TestServer {
    let state = AppState::builder()
        .config(test_config())
        .users(store.clone() as Arc<dyn UserStore>)
        .summaries(store.clone() as Arc<dyn SummaryStore>)
        .billing(Arc::new(api) as Arc<dyn BillingApi>)
        .build();
    axum_test::TestServer::new(build_router(state)).expect("Failed to create test server")
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, UserDBResponse>,
    summaries: HashMap<SummaryId, SummaryDBResponse>,
}

/// In-memory implementation of both store traits.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a user directly (bypassing the store trait), for test setup
    pub async fn insert_user(&self, email: &str, plan: PlanTier) -> UserDBResponse {
        self.insert_user_with_billing(email, plan, None, None, None).await
    }

    pub async fn insert_user_with_billing(
        &self,
        email: &str,
        plan: PlanTier,
        billing_customer_id: Option<&str>,
        billing_subscription_id: Option<&str>,
        billing_period_end: Option<DateTime<Utc>>,
    ) -> UserDBResponse {
        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: None,
            auth_source: "proxy-header".to_string(),
            plan,
            billing_customer_id: billing_customer_id.map(str::to_string),
            billing_subscription_id: billing_subscription_id.map(str::to_string),
            billing_period_end,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().users.insert(user.id, user.clone());
        user
    }

    /// Insert a summary with a chosen creation time, for test setup
    pub async fn insert_summary(&self, user_id: UserId, created_at: DateTime<Utc>, archived: bool) -> SummaryDBResponse {
        let summary = SummaryDBResponse {
            id: Uuid::new_v4(),
            user_id,
            title: "Test summary".to_string(),
            video_url: "https://videos.example.com/watch?v=test".to_string(),
            content: None,
            archived,
            created_at,
            updated_at: created_at,
        };
        self.inner.lock().unwrap().summaries.insert(summary.id, summary.clone());
        summary
    }

    /// Snapshot of a stored user, for assertions
    pub async fn user(&self, id: UserId) -> Option<UserDBResponse> {
        self.inner.lock().unwrap().users.get(&id).cloned()
    }

    /// Snapshot of a user's summaries, for assertions
    pub async fn summaries_for(&self, user_id: UserId) -> Vec<SummaryDBResponse> {
        self.inner
            .lock()
            .unwrap()
            .summaries
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    fn unique_violation(constraint: &str) -> DbError {
        DbError::UniqueViolation {
            constraint: Some(constraint.to_string()),
            table: Some("users".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.values().any(|u| u.email == request.email) {
            return Err(Self::unique_violation("users_email_key"));
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: request.email.clone(),
            display_name: request.display_name.clone(),
            auth_source: request.auth_source.clone(),
            plan: request.plan,
            billing_customer_id: None,
            billing_subscription_id: None,
            billing_period_end: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.inner.lock().unwrap().users.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Option<UserDBResponse>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.billing_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn apply_plan(&self, id: UserId, change: &PlanChangeDBRequest) -> Result<UserDBResponse> {
        let mut inner = self.inner.lock().unwrap();

        // Mirror the unique indexes on billing_customer_id / billing_subscription_id
        if let Some(customer_id) = &change.billing_customer_id {
            if inner
                .users
                .values()
                .any(|u| u.id != id && u.billing_customer_id.as_deref() == Some(customer_id))
            {
                return Err(Self::unique_violation("users_billing_customer_id_key"));
            }
        }
        if let Some(subscription_id) = &change.billing_subscription_id {
            if inner
                .users
                .values()
                .any(|u| u.id != id && u.billing_subscription_id.as_deref() == Some(subscription_id))
            {
                return Err(Self::unique_violation("users_billing_subscription_id_key"));
            }
        }

        let user = inner.users.get_mut(&id).ok_or(DbError::NotFound)?;
        user.plan = change.plan;
        user.billing_customer_id = change.billing_customer_id.clone();
        user.billing_subscription_id = change.billing_subscription_id.clone();
        user.billing_period_end = change.billing_period_end;
        Ok(user.clone())
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn create(&self, request: &SummaryCreateDBRequest) -> Result<SummaryDBResponse> {
        let now = Utc::now();
        let summary = SummaryDBResponse {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            title: request.title.clone(),
            video_url: request.video_url.clone(),
            content: request.content.clone(),
            archived: false,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().summaries.insert(summary.id, summary.clone());
        Ok(summary)
    }

    async fn get_by_id(&self, id: SummaryId) -> Result<Option<SummaryDBResponse>> {
        Ok(self.inner.lock().unwrap().summaries.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId, filter: &SummaryFilter) -> Result<Vec<SummaryDBResponse>> {
        let inner = self.inner.lock().unwrap();
        let mut summaries: Vec<_> = inner
            .summaries
            .values()
            .filter(|s| s.user_id == user_id && (!s.archived || filter.include_archived))
            .cloned()
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(summaries
            .into_iter()
            .skip(filter.skip.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, id: SummaryId, request: &SummaryUpdateDBRequest) -> Result<SummaryDBResponse> {
        let mut inner = self.inner.lock().unwrap();
        let summary = inner.summaries.get_mut(&id).ok_or(DbError::NotFound)?;

        if let Some(title) = &request.title {
            summary.title = title.clone();
        }
        if let Some(archived) = request.archived {
            summary.archived = archived;
        }
        summary.updated_at = Utc::now();
        Ok(summary.clone())
    }

    async fn delete(&self, id: SummaryId) -> Result<bool> {
        Ok(self.inner.lock().unwrap().summaries.remove(&id).is_some())
    }

    async fn count_active_since(&self, user_id: UserId, since: Option<DateTime<Utc>>) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .summaries
            .values()
            .filter(|s| s.user_id == user_id && !s.archived)
            .filter(|s| since.is_none_or(|cutoff| s.created_at >= cutoff))
            .count();
        Ok(count as i64)
    }
}

/// Canned billing provider API: serves subscriptions from a fixed map.
#[derive(Default)]
pub struct StaticBillingApi {
    subscriptions: HashMap<String, SubscriptionObject>,
}

impl StaticBillingApi {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_subscription(id: &str, subscription: SubscriptionObject) -> Self {
        let mut subscriptions = HashMap::new();
        subscriptions.insert(id.to_string(), subscription);
        Self { subscriptions }
    }
}

#[async_trait]
impl BillingApi for StaticBillingApi {
    async fn retrieve_subscription(&self, subscription_id: &str) -> std::result::Result<SubscriptionObject, BillingApiError> {
        self.subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| BillingApiError::Api {
                status: 404,
                message: format!("No such subscription: {subscription_id}"),
            })
    }
}

/// Sanity check that the deterministic test secret is well-formed
#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::signing;

    #[test]
    fn test_webhook_secret_decodes() {
        assert!(signing::decode_secret(TEST_WEBHOOK_SECRET).is_some());
    }
}
