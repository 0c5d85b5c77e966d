//! HTTP handlers for usage-limit checks.

use axum::{extract::State, response::Json};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    entitlements::{UsageGate, UsageLimit},
    errors::Result,
};

/// Get the current user's usage standing
#[utoipa::path(
    get,
    path = "/usage",
    tag = "usage",
    summary = "Check the usage limit",
    description = "Returns the current user's usage against their plan's entitlement. This is a read-only decision; creating a summary re-checks at write time.",
    responses(
        (status = 200, description = "Current usage standing", body = UsageLimit),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("ProxyHeader" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_usage(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UsageLimit>> {
    let gate = UsageGate::new(state.users.clone(), state.summaries.clone(), state.config.entitlements.clone());
    Ok(Json(gate.check(user.id).await?))
}
