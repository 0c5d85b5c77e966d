//! PostgreSQL repository for users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    models::users::{PlanChangeDBRequest, UserCreateDBRequest, UserDBResponse},
    store::UserStore,
};
use crate::entitlements::PlanTier;
use crate::types::{UserId, abbrev_uuid};

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
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

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            auth_source: user.auth_source,
            plan: user.plan,
            billing_customer_id: user.billing_customer_id,
            billing_subscription_id: user.billing_subscription_id,
            billing_period_end: user.billing_period_end,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgUsers {
    pool: PgPool,
}

impl PgUsers {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUsers {
    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        // Always generate a new ID for users
        let user_id = Uuid::new_v4();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, display_name, auth_source, plan)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(&request.auth_source)
        .bind(request.plan)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserDBResponse::from(user))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    #[instrument(skip(self, email), err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    #[instrument(skip(self), err)]
    async fn get_by_customer_id(&self, customer_id: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE billing_customer_id = $1")
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    #[instrument(skip(self, change), fields(user_id = %abbrev_uuid(&id), plan = %change.plan), err)]
    async fn apply_plan(&self, id: UserId, change: &PlanChangeDBRequest) -> Result<UserDBResponse> {
        // Every billing column is written, None clearing it: set semantics,
        // not an increment. A single UPDATE keeps the write atomic.
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                plan = $2,
                billing_customer_id = $3,
                billing_subscription_id = $4,
                billing_period_end = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(change.plan)
        .bind(&change.billing_customer_id)
        .bind(&change.billing_subscription_id)
        .bind(change.billing_period_end)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(UserDBResponse::from(user))
    }
}
