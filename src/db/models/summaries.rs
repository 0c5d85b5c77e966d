//! Database models for summaries.

use crate::types::{SummaryId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new summary
#[derive(Debug, Clone)]
pub struct SummaryCreateDBRequest {
    pub user_id: UserId,
    pub title: String,
    pub video_url: String,
    pub content: Option<String>,
}

/// Database request for updating a summary
#[derive(Debug, Clone, Default)]
pub struct SummaryUpdateDBRequest {
    pub title: Option<String>,
    pub archived: Option<bool>,
}

/// Filter for listing summaries
#[derive(Debug, Clone)]
pub struct SummaryFilter {
    pub include_archived: bool,
    pub skip: i64,
    pub limit: i64,
}

impl Default for SummaryFilter {
    fn default() -> Self {
        Self {
            include_archived: false,
            skip: 0,
            limit: 50,
        }
    }
}

/// Database response for a summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryDBResponse {
    pub id: SummaryId,
    pub user_id: UserId,
    pub title: String,
    pub video_url: String,
    pub content: Option<String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
