//! API request/response models for summaries.

use crate::db::models::summaries::{SummaryDBResponse, SummaryFilter};
use crate::types::SummaryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Request body for creating a summary
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummaryCreate {
    pub title: String,
    /// Source video the summary was produced from
    pub video_url: String,
    /// Summary text; may arrive later when the pipeline runs asynchronously
    pub content: Option<String>,
}

/// Request body for updating a summary
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummaryUpdate {
    pub title: Option<String>,
    /// Archiving excludes the summary from quota counting without deleting it
    pub archived: Option<bool>,
}

/// Query parameters for listing summaries
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ListSummariesQuery {
    /// Include archived summaries in the listing
    pub include_archived: bool,
    /// Number of results to skip
    pub skip: i64,
    /// Maximum number of results to return
    pub limit: i64,
}

impl Default for ListSummariesQuery {
    fn default() -> Self {
        Self {
            include_archived: false,
            skip: 0,
            limit: 50,
        }
    }
}

impl From<&ListSummariesQuery> for SummaryFilter {
    fn from(query: &ListSummariesQuery) -> Self {
        Self {
            include_archived: query.include_archived,
            skip: query.skip,
            limit: query.limit,
        }
    }
}

/// Summary as exposed through the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SummaryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: SummaryId,
    pub title: String,
    pub video_url: String,
    pub content: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SummaryDBResponse> for SummaryResponse {
    fn from(db: SummaryDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            video_url: db.video_url,
            content: db.content,
            archived: db.archived,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
