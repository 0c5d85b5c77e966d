use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    db::models::users::UserCreateDBRequest,
    errors::{Error, Result},
};

/// Extract user from the trusted proxy header if present and valid
/// Returns:
/// - None: No proxy header present
/// - Some(Ok(user)): Valid proxy header found and user authenticated
/// - Some(Err(error)): Proxy header present but user lookup/creation failed
#[instrument(skip(parts, state))]
async fn try_proxy_header_auth(parts: &Parts, state: &AppState) -> Option<Result<CurrentUser>> {
    let config = &state.config.auth.proxy_header;

    let user_email = match parts.headers.get(&config.header_name).and_then(|h| h.to_str().ok()) {
        Some(email) => email,
        None => return None,
    };

    match state.users.get_by_email(user_email).await {
        Ok(Some(user)) => Some(Ok(CurrentUser::from(user))),
        Ok(None) => {
            if config.auto_create_users {
                let create_request = UserCreateDBRequest {
                    email: user_email.to_string(),
                    display_name: None,
                    auth_source: "proxy-header".to_string(),
                    plan: config.default_plan,
                };

                match state.users.create(&create_request).await {
                    Ok(new_user) => Some(Ok(CurrentUser::from(new_user))),
                    Err(e) => Some(Err(Error::Database(e))),
                }
            } else {
                None
            }
        }
        Err(e) => Some(Err(Error::Database(e))),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_proxy_header_auth(parts, state).await {
            Some(Ok(user)) => {
                debug!("Found proxy header authenticated user: {}", user.id);
                Ok(user)
            }
            Some(Err(e)) => {
                trace!("Proxy header authentication failed: {:?}", e);
                Err(e)
            }
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}
