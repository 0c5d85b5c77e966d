//! HTTP handlers for summary endpoints.
//!
//! Creation is the billable write: it calls the usage gate's `enforce`
//! immediately before inserting. Two concurrent creations can both pass the
//! gate and overshoot the limit by the number of in-flight requests; that
//! window is an accepted trade-off of the check-then-act contract.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        summaries::{ListSummariesQuery, SummaryCreate, SummaryResponse, SummaryUpdate},
        users::CurrentUser,
    },
    db::models::summaries::{SummaryCreateDBRequest, SummaryDBResponse, SummaryFilter, SummaryUpdateDBRequest},
    entitlements::UsageGate,
    errors::{Error, Result},
    types::SummaryId,
};

/// Fetch a summary and enforce ownership. Returns 404 for other users'
/// summaries to avoid leaking their existence.
async fn get_owned_summary(state: &AppState, user: &CurrentUser, id: SummaryId) -> Result<SummaryDBResponse> {
    let not_found = || Error::NotFound {
        resource: "Summary".to_string(),
        id: id.to_string(),
    };

    let summary = state.summaries.get_by_id(id).await?.ok_or_else(not_found)?;
    if summary.user_id != user.id {
        return Err(not_found());
    }
    Ok(summary)
}

/// Create a new summary
#[utoipa::path(
    post,
    path = "/summaries",
    tag = "summaries",
    summary = "Create a summary",
    description = "Creates a summary for the current user. The usage gate runs immediately before the write; a denied check fails with 429 carrying the current/limit counts.",
    request_body = SummaryCreate,
    responses(
        (status = 201, description = "Summary created", body = SummaryResponse),
        (status = 400, description = "Bad request - empty title or video URL"),
        (status = 401, description = "Unauthorized"),
        (status = 429, description = "Usage limit reached"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("ProxyHeader" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(data): Json<SummaryCreate>,
) -> Result<(StatusCode, Json<SummaryResponse>)> {
    if data.title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Title must not be empty".to_string(),
        });
    }
    if data.video_url.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Video URL must not be empty".to_string(),
        });
    }

    // The gate decision and the insert are two separate store round-trips
    let gate = UsageGate::new(state.users.clone(), state.summaries.clone(), state.config.entitlements.clone());
    gate.enforce(user.id).await?;

    let db_request = SummaryCreateDBRequest {
        user_id: user.id,
        title: data.title,
        video_url: data.video_url,
        content: data.content,
    };
    let summary = state.summaries.create(&db_request).await?;

    Ok((StatusCode::CREATED, Json(SummaryResponse::from(summary))))
}

/// List the current user's summaries
#[utoipa::path(
    get,
    path = "/summaries",
    tag = "summaries",
    summary = "List summaries",
    description = "Lists the current user's summaries, newest first. Archived summaries are excluded unless requested.",
    params(ListSummariesQuery),
    responses(
        (status = 200, description = "List of summaries", body = [SummaryResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("ProxyHeader" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_summaries(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListSummariesQuery>,
) -> Result<Json<Vec<SummaryResponse>>> {
    let filter = SummaryFilter::from(&query);
    let summaries = state.summaries.list_for_user(user.id, &filter).await?;

    Ok(Json(summaries.into_iter().map(SummaryResponse::from).collect()))
}

/// Get a specific summary
#[utoipa::path(
    get,
    path = "/summaries/{id}",
    tag = "summaries",
    summary = "Get a summary",
    params(
        ("id" = String, Path, description = "Summary ID"),
    ),
    responses(
        (status = 200, description = "Summary details", body = SummaryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Summary not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("ProxyHeader" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<SummaryId>,
) -> Result<Json<SummaryResponse>> {
    let summary = get_owned_summary(&state, &user, id).await?;
    Ok(Json(SummaryResponse::from(summary)))
}

/// Update a summary (rename, archive, unarchive)
#[utoipa::path(
    patch,
    path = "/summaries/{id}",
    tag = "summaries",
    summary = "Update a summary",
    description = "Renames or (un)archives a summary. Archiving removes it from quota counting without deleting it.",
    params(
        ("id" = String, Path, description = "Summary ID"),
    ),
    request_body = SummaryUpdate,
    responses(
        (status = 200, description = "Updated summary", body = SummaryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Summary not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("ProxyHeader" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<SummaryId>,
    Json(data): Json<SummaryUpdate>,
) -> Result<Json<SummaryResponse>> {
    get_owned_summary(&state, &user, id).await?;

    let db_request = SummaryUpdateDBRequest {
        title: data.title,
        archived: data.archived,
    };
    let summary = state.summaries.update(id, &db_request).await?;

    Ok(Json(SummaryResponse::from(summary)))
}

/// Delete a summary
#[utoipa::path(
    delete,
    path = "/summaries/{id}",
    tag = "summaries",
    summary = "Delete a summary",
    params(
        ("id" = String, Path, description = "Summary ID"),
    ),
    responses(
        (status = 204, description = "Summary deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Summary not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("ProxyHeader" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_summary(State(state): State<AppState>, user: CurrentUser, Path(id): Path<SummaryId>) -> Result<StatusCode> {
    get_owned_summary(&state, &user, id).await?;

    state.summaries.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
