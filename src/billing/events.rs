//! Billing webhook event payloads.
//!
//! Events arrive as an envelope `{"type": ..., "data": {"object": ...}}`;
//! the object shape depends on the event type, so the envelope keeps it as
//! raw JSON and the dispatcher parses it per route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entitlements::SubscriptionState;

/// Inbound event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Routing classification of an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `customer.subscription.created` / `customer.subscription.updated`
    SubscriptionUpserted,
    /// `customer.subscription.deleted`
    SubscriptionDeleted,
    /// `checkout.session.completed`
    CheckoutCompleted,
    /// `invoice.payment_succeeded`
    PaymentSucceeded,
    /// `invoice.payment_failed`
    PaymentFailed,
    /// Anything else - acknowledged and ignored, never rejected
    Unrecognized,
}

impl EventEnvelope {
    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            "customer.subscription.created" | "customer.subscription.updated" => EventKind::SubscriptionUpserted,
            "customer.subscription.deleted" => EventKind::SubscriptionDeleted,
            "checkout.session.completed" => EventKind::CheckoutCompleted,
            "invoice.payment_succeeded" => EventKind::PaymentSucceeded,
            "invoice.payment_failed" => EventKind::PaymentFailed,
            _ => EventKind::Unrecognized,
        }
    }
}

/// A subscription object as the provider reports it, reduced to the fields
/// the synchronizer consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    /// Provider customer ID
    pub customer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// End of the current billing period, unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<i64>,
    /// Email the provider has on file; not all providers include it on
    /// subscription payloads (see the synchronizer's fallback rules)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
}

impl SubscriptionObject {
    /// Price ID of the first subscription item, if any
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl From<&SubscriptionObject> for SubscriptionState {
    fn from(sub: &SubscriptionObject) -> Self {
        Self {
            customer_id: sub.customer.clone(),
            subscription_id: sub.id.clone(),
            price_id: sub.price_id().map(str::to_string),
            current_period_end: sub.period_end(),
            customer_email: sub.customer_email.clone(),
        }
    }
}

/// A checkout session object, as delivered with `checkout.session.completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    /// "subscription" for subscription checkouts; other modes are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    /// ID of the subscription the checkout created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CheckoutSessionObject {
    /// Best-effort email for the checkout's customer
    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref().and_then(|d| d.email.as_deref()))
    }
}
