//! HTTP handlers for user profile endpoints.

use axum::{extract::State, response::Json};

use crate::{
    AppState,
    api::models::users::{CurrentUser, UserResponse},
    errors::{Error, Result},
};

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    summary = "Get the current user",
    description = "Returns the authenticated user's profile including plan tier and billing period end.",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("ProxyHeader" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserResponse>> {
    // Re-read so the response reflects billing fields the extractor doesn't carry
    let user = state.users.get_by_id(user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: user.id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}
