//! PostgreSQL repository for summaries, including the usage-counting query.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    models::summaries::{SummaryCreateDBRequest, SummaryDBResponse, SummaryFilter, SummaryUpdateDBRequest},
    store::SummaryStore,
};
use crate::types::{SummaryId, UserId, abbrev_uuid};

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Summary {
    pub id: SummaryId,
    pub user_id: UserId,
    pub title: String,
    pub video_url: String,
    pub content: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Summary> for SummaryDBResponse {
    fn from(summary: Summary) -> Self {
        Self {
            id: summary.id,
            user_id: summary.user_id,
            title: summary.title,
            video_url: summary.video_url,
            content: summary.content,
            archived: summary.archived,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgSummaries {
    pool: PgPool,
}

impl PgSummaries {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryStore for PgSummaries {
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&self, request: &SummaryCreateDBRequest) -> Result<SummaryDBResponse> {
        let summary_id = Uuid::new_v4();

        let summary = sqlx::query_as::<_, Summary>(
            r#"
            INSERT INTO summaries (id, user_id, title, video_url, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(summary_id)
        .bind(request.user_id)
        .bind(&request.title)
        .bind(&request.video_url)
        .bind(&request.content)
        .fetch_one(&self.pool)
        .await?;

        Ok(SummaryDBResponse::from(summary))
    }

    #[instrument(skip(self), fields(summary_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: SummaryId) -> Result<Option<SummaryDBResponse>> {
        let summary = sqlx::query_as::<_, Summary>("SELECT * FROM summaries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(summary.map(SummaryDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&user_id), limit = filter.limit), err)]
    async fn list_for_user(&self, user_id: UserId, filter: &SummaryFilter) -> Result<Vec<SummaryDBResponse>> {
        let summaries = sqlx::query_as::<_, Summary>(
            r#"
            SELECT * FROM summaries
            WHERE user_id = $1 AND (NOT archived OR $2)
            ORDER BY created_at DESC, id DESC
            OFFSET $3
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(filter.include_archived)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries.into_iter().map(SummaryDBResponse::from).collect())
    }

    #[instrument(skip(self, request), fields(summary_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: SummaryId, request: &SummaryUpdateDBRequest) -> Result<SummaryDBResponse> {
        let summary = sqlx::query_as::<_, Summary>(
            r#"
            UPDATE summaries SET
                title = COALESCE($2, title),
                archived = COALESCE($3, archived),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(request.archived)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(SummaryDBResponse::from(summary))
    }

    #[instrument(skip(self), fields(summary_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: SummaryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM summaries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn count_active_since(&self, user_id: UserId, since: Option<DateTime<Utc>>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM summaries
            WHERE user_id = $1
              AND NOT archived
              AND ($2::timestamptz IS NULL OR created_at >= $2)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
