//! Billing webhook endpoint: verify, route, synchronize.
//!
//! Signature verification happens inside the [`BillingEvent`] extractor,
//! before the event body is interpreted at all - it is the sole
//! authentication mechanism for this endpoint. The handler then routes by
//! event type. Unrecognized types are acknowledged (never rejected, so the
//! provider doesn't retry forever); only a synchronization failure surfaces
//! as a server error, which makes the provider redeliver.

use axum::{
    body::Body,
    extract::{FromRequest, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::{
    AppState,
    billing::{
        events::{CheckoutSessionObject, EventEnvelope, EventKind, SubscriptionObject},
        signing::{SIGNATURE_HEADER, verify_signature},
    },
    entitlements::{PlanSynchronizer, SubscriptionState},
    errors::{Error, Result},
};

/// Billing event extractor that validates webhook signatures
pub struct BillingEvent(pub EventEnvelope);

impl FromRequest<AppState> for BillingEvent
where
    String: FromRequest<AppState>,
{
    type Rejection = Response;

    async fn from_request(req: Request<Body>, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        let Some(billing) = state.config.billing.as_ref() else {
            error!("Billing webhook called but billing is not configured");
            return Err(StatusCode::NOT_IMPLEMENTED.into_response());
        };

        let signature = if let Some(sig) = req.headers().get(SIGNATURE_HEADER) {
            sig.to_owned()
        } else {
            warn!("Missing {SIGNATURE_HEADER} header");
            return Err(StatusCode::BAD_REQUEST.into_response());
        };

        let Ok(signature) = signature.to_str() else {
            warn!("Non-ASCII {SIGNATURE_HEADER} header");
            return Err(StatusCode::BAD_REQUEST.into_response());
        };

        // The signature covers the exact raw body bytes
        let payload = String::from_request(req, state).await.map_err(IntoResponse::into_response)?;

        if !verify_signature(&payload, signature, &billing.webhook_secret) {
            warn!("Billing webhook signature verification failed");
            return Err(StatusCode::BAD_REQUEST.into_response());
        }

        let envelope: EventEnvelope = serde_json::from_str(&payload).map_err(|e| {
            warn!("Malformed billing event payload: {e}");
            StatusCode::BAD_REQUEST.into_response()
        })?;

        Ok(Self(envelope))
    }
}

/// Billing webhook handler - used directly as an Axum route handler.
///
/// Always acknowledges verified events with `{"received": true}`, even when
/// a routed handler only logs; the exception is a failing plan
/// synchronization, which propagates as a 5xx so the provider's retry
/// mechanism re-delivers.
#[tracing::instrument(skip_all)]
pub async fn webhook(State(state): State<AppState>, BillingEvent(event): BillingEvent) -> Result<Json<serde_json::Value>> {
    info!(event_type = %event.event_type, event_id = event.id.as_deref(), "Received billing webhook event");

    let prices = state
        .config
        .billing
        .as_ref()
        .map(|billing| billing.prices.clone())
        .unwrap_or_default();
    let synchronizer = PlanSynchronizer::new(state.users.clone(), prices);

    match event.kind() {
        EventKind::SubscriptionUpserted => {
            let sub: SubscriptionObject = parse_object(event.data.object)?;
            synchronizer.apply_subscription(&SubscriptionState::from(&sub)).await?;
        }
        EventKind::SubscriptionDeleted => {
            let sub: SubscriptionObject = parse_object(event.data.object)?;
            synchronizer.clear_subscription(&sub.customer, sub.customer_email.as_deref()).await?;
        }
        EventKind::CheckoutCompleted => {
            let session: CheckoutSessionObject = parse_object(event.data.object)?;
            handle_checkout_completed(&state, &synchronizer, session).await?;
        }
        EventKind::PaymentSucceeded | EventKind::PaymentFailed => {
            // Out of scope for entitlement state; acknowledged so the
            // provider doesn't retry
            info!("Payment event acknowledged without state change");
        }
        EventKind::Unrecognized => {
            debug!("Ignoring unrecognized billing event type");
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// A completed subscription checkout only carries the subscription ID; the
/// full subscription is resolved through the provider API and then follows
/// the same path as a subscription update.
async fn handle_checkout_completed(state: &AppState, synchronizer: &PlanSynchronizer, session: CheckoutSessionObject) -> Result<()> {
    if session.mode.as_deref() != Some("subscription") {
        debug!(session_id = %session.id, "Ignoring non-subscription checkout");
        return Ok(());
    }

    let Some(subscription_id) = session.subscription.as_deref() else {
        warn!(session_id = %session.id, "Subscription checkout carries no subscription ID, dropping");
        return Ok(());
    };

    let Some(api) = state.billing.as_ref() else {
        warn!("Checkout event received but no provider API is configured, dropping");
        return Ok(());
    };

    let sub = api.retrieve_subscription(subscription_id).await.map_err(|e| {
        error!("Failed to resolve subscription {subscription_id}: {e}");
        Error::Internal {
            operation: format!("resolve subscription {subscription_id}"),
        }
    })?;

    let mut sub_state = SubscriptionState::from(&sub);
    // The session knows the customer's email even when the subscription
    // object doesn't carry one
    if sub_state.customer_email.is_none() {
        sub_state.customer_email = session.email().map(str::to_string);
    }

    synchronizer.apply_subscription(&sub_state).await?;
    Ok(())
}

fn parse_object<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Result<T> {
    serde_json::from_value(object).map_err(|e| Error::BadRequest {
        message: format!("Malformed event object: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use crate::billing::signing::sign_payload;
    use crate::entitlements::PlanTier;
    use crate::test_utils::{MemoryStore, StaticBillingApi, TEST_WEBHOOK_SECRET, test_server, test_server_with_billing};
    use axum_test::TestServer;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn subscription_event(event_type: &str, customer: &str, price: &str) -> String {
        json!({
            "id": "evt_1",
            "type": event_type,
            "data": {
                "object": {
                    "id": "sub_123",
                    "customer": customer,
                    "status": "active",
                    "current_period_end": 1738368000,
                    "items": {"data": [{"price": {"id": price}}]}
                }
            }
        })
        .to_string()
    }

    async fn post_signed(server: &TestServer, payload: &str) -> axum_test::TestResponse {
        let signature = sign_payload(payload, TEST_WEBHOOK_SECRET).expect("should sign");
        server
            .post("/webhooks/billing")
            .add_header("billing-signature", signature)
            .text(payload.to_string())
            .await
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_signature_never_reaches_the_synchronizer() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing("pro@example.com", PlanTier::Free, Some("cus_1"), None, None)
            .await;
        let server = test_server(&store);

        let payload = subscription_event("customer.subscription.created", "cus_1", "price_pro_monthly");
        let response = server
            .post("/webhooks/billing")
            .add_header("billing-signature", "v1,Zm9yZ2VkIHNpZ25hdHVyZQ==")
            .text(payload)
            .await;

        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        // No state change happened
        assert_eq!(store.user(user.id).await.unwrap().plan, PlanTier::Free);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_signature_header_is_rejected() {
        let store = MemoryStore::new();
        let server = test_server(&store);

        let response = server.post("/webhooks/billing").text("{}").await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_subscription_created_upgrades_user() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing("pro@example.com", PlanTier::Free, Some("cus_1"), None, None)
            .await;
        let server = test_server(&store);

        let payload = subscription_event("customer.subscription.created", "cus_1", "price_pro_monthly");
        let response = post_signed(&server, &payload).await;

        response.assert_status_ok();
        response.assert_json(&json!({"received": true}));

        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.plan, PlanTier::Pro);
        assert_eq!(stored.billing_subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(
            stored.billing_period_end,
            // 2025-02-01T00:00:00Z
            Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap())
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_subscription_deleted_downgrades_and_clears() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing(
                "pro@example.com",
                PlanTier::Pro,
                Some("cus_1"),
                Some("sub_123"),
                Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            )
            .await;
        let server = test_server(&store);

        let payload = subscription_event("customer.subscription.deleted", "cus_1", "price_pro_monthly");
        post_signed(&server, &payload).await.assert_status_ok();

        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.plan, PlanTier::Free);
        assert_eq!(stored.billing_subscription_id, None);
        assert_eq!(stored.billing_period_end, None);
        // Still a known customer at the provider
        assert_eq!(stored.billing_customer_id.as_deref(), Some("cus_1"));
    }

    #[test_log::test(tokio::test)]
    async fn test_unrecognized_event_is_acknowledged_without_mutation() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing("pro@example.com", PlanTier::Pro, Some("cus_1"), Some("sub_123"), None)
            .await;
        let server = test_server(&store);

        let payload = json!({
            "type": "customer.tax_id.created",
            "data": {"object": {"id": "txi_1"}}
        })
        .to_string();
        let response = post_signed(&server, &payload).await;

        response.assert_status_ok();
        response.assert_json(&json!({"received": true}));
        assert_eq!(store.user(user.id).await.unwrap().plan, PlanTier::Pro);
    }

    #[test_log::test(tokio::test)]
    async fn test_payment_events_are_logged_only() {
        let store = MemoryStore::new();
        let user = store
            .insert_user_with_billing("pro@example.com", PlanTier::Pro, Some("cus_1"), Some("sub_123"), None)
            .await;
        let server = test_server(&store);

        for event_type in ["invoice.payment_succeeded", "invoice.payment_failed"] {
            let payload = json!({
                "type": event_type,
                "data": {"object": {"id": "in_1", "customer": "cus_1"}}
            })
            .to_string();
            post_signed(&server, &payload).await.assert_status_ok();
        }

        assert_eq!(store.user(user.id).await.unwrap().plan, PlanTier::Pro);
    }

    #[test_log::test(tokio::test)]
    async fn test_unresolved_subscriber_is_acknowledged() {
        let store = MemoryStore::new();
        let server = test_server(&store);

        let payload = subscription_event("customer.subscription.created", "cus_stranger", "price_pro_monthly");
        let response = post_signed(&server, &payload).await;

        // Dropped, not retried: the provider redelivers on its own schedule
        response.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_checkout_completed_resolves_subscription_and_links_by_email() {
        let store = MemoryStore::new();
        // The user signed up moments ago; no customer ID backfilled yet
        let user = store.insert_user("buyer@example.com", PlanTier::Free).await;

        let api = StaticBillingApi::with_subscription(
            "sub_new",
            serde_json::from_value(json!({
                "id": "sub_new",
                "customer": "cus_new",
                "status": "active",
                "current_period_end": 1738368000,
                "items": {"data": [{"price": {"id": "price_enterprise_monthly"}}]}
            }))
            .unwrap(),
        );
        let server = test_server_with_billing(&store, api);

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_1",
                    "mode": "subscription",
                    "subscription": "sub_new",
                    "customer": "cus_new",
                    "customer_details": {"email": "buyer@example.com"}
                }
            }
        })
        .to_string();
        post_signed(&server, &payload).await.assert_status_ok();

        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.plan, PlanTier::Enterprise);
        assert_eq!(stored.billing_customer_id.as_deref(), Some("cus_new"));
        assert_eq!(stored.billing_subscription_id.as_deref(), Some("sub_new"));
    }

    #[test_log::test(tokio::test)]
    async fn test_checkout_with_unresolvable_subscription_surfaces_server_error() {
        let store = MemoryStore::new();
        store.insert_user("buyer@example.com", PlanTier::Free).await;
        // Provider API knows no subscriptions at all
        let server = test_server_with_billing(&store, StaticBillingApi::empty());

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_1",
                    "mode": "subscription",
                    "subscription": "sub_missing"
                }
            }
        })
        .to_string();
        let response = post_signed(&server, &payload).await;

        // 5xx makes the provider redeliver once the API hiccup passes
        response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test_log::test(tokio::test)]
    async fn test_payment_mode_checkout_is_ignored() {
        let store = MemoryStore::new();
        let user = store.insert_user("buyer@example.com", PlanTier::Free).await;
        let server = test_server(&store);

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_1", "mode": "payment"}}
        })
        .to_string();
        post_signed(&server, &payload).await.assert_status_ok();

        assert_eq!(store.user(user.id).await.unwrap().plan, PlanTier::Free);
    }

    #[test_log::test(tokio::test)]
    async fn test_webhook_without_billing_config_is_not_implemented() {
        let store = MemoryStore::new();
        let mut state = crate::test_utils::test_state(&store);
        state.config.billing = None;
        let server = TestServer::new(crate::build_router(state)).expect("Failed to create test server");

        let response = server.post("/webhooks/billing").text("{}").await;
        response.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);
    }
}
