//! OpenAPI documentation configuration.
//!
//! Client-facing endpoints are collected into [`ApiDoc`] and served through
//! Scalar at `/docs`. The billing webhook endpoint is intentionally absent:
//! it is spoken to by the billing provider, not by API clients.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api::handlers;
use crate::api::models::summaries::{SummaryCreate, SummaryResponse, SummaryUpdate};
use crate::api::models::users::UserResponse;
use crate::entitlements::{PlanTier, UsageLimit, UsagePeriod};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::summaries::create_summary,
        handlers::summaries::list_summaries,
        handlers::summaries::get_summary,
        handlers::summaries::update_summary,
        handlers::summaries::delete_summary,
        handlers::usage::get_usage,
        handlers::users::get_current_user,
    ),
    components(schemas(
        SummaryCreate,
        SummaryUpdate,
        SummaryResponse,
        UsageLimit,
        UserResponse,
        PlanTier,
        UsagePeriod,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "summaries", description = "Summary management (quota-gated)"),
        (name = "usage", description = "Usage limit checks"),
        (name = "users", description = "User profile"),
    ),
    info(
        title = "Recap Control Layer API",
        description = "Entitlement enforcement and billing synchronization for the Recap platform"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "ProxyHeader",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-recap-user"))),
            );
        }
    }
}
