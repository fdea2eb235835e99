//! Normalized billing provider events
//!
//! The transport layer verifies and parses provider payloads into this closed
//! set of variants before anything reaches reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Fields a billing event may carry. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEventData {
    /// Provider event id
    pub event_id: String,
    /// Account the event belongs to, when the provider echoes it back
    pub account_id: Option<AccountId>,
    /// Provider customer reference
    pub customer_ref: Option<String>,
    /// Provider subscription reference
    pub subscription_ref: Option<String>,
    /// Plan id as sent by the provider
    pub plan_id: Option<String>,
    /// Provider status string
    pub status: Option<String>,
    /// Current period start
    pub period_start: Option<DateTime<Utc>>,
    /// Current period end
    pub period_end: Option<DateTime<Utc>>,
    /// Whether the subscription ends with the current period
    pub cancel_at_period_end: Option<bool>,
    /// Provider-side freshness of the state carried by this event
    pub updated_at: Option<DateTime<Utc>>,
}

/// Billing events handled by reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BillingEvent {
    /// Checkout finished and a subscription was started
    CheckoutCompleted(BillingEventData),
    /// Subscription created
    SubscriptionCreated(BillingEventData),
    /// Subscription changed (plan, status, period, cancel flag)
    SubscriptionUpdated(BillingEventData),
    /// Subscription ended
    SubscriptionDeleted(BillingEventData),
    /// Renewal payment failed
    PaymentFailed(BillingEventData),
    /// Customer details changed
    CustomerUpdated(BillingEventData),
    /// Any other provider event type
    Unhandled {
        /// Provider event type string
        event_type: String,
    },
}

impl BillingEvent {
    /// Map a provider event type string and its data to a variant
    pub fn from_provider(event_type: &str, data: BillingEventData) -> Self {
        match event_type {
            "checkout.session.completed" => Self::CheckoutCompleted(data),
            "customer.subscription.created" | "subscription.created" => {
                Self::SubscriptionCreated(data)
            }
            "customer.subscription.updated" | "subscription.updated" => {
                Self::SubscriptionUpdated(data)
            }
            "customer.subscription.deleted" | "subscription.deleted" => {
                Self::SubscriptionDeleted(data)
            }
            "invoice.payment_failed" => Self::PaymentFailed(data),
            "customer.updated" => Self::CustomerUpdated(data),
            other => Self::Unhandled {
                event_type: other.to_string(),
            },
        }
    }

    /// Event type label for logs and metrics
    pub fn event_type(&self) -> &str {
        match self {
            Self::CheckoutCompleted(_) => "checkout_completed",
            Self::SubscriptionCreated(_) => "subscription_created",
            Self::SubscriptionUpdated(_) => "subscription_updated",
            Self::SubscriptionDeleted(_) => "subscription_deleted",
            Self::PaymentFailed(_) => "payment_failed",
            Self::CustomerUpdated(_) => "customer_updated",
            Self::Unhandled { event_type } => event_type,
        }
    }

    /// Whether the event can change what an account is entitled to
    pub fn is_entitlement_changing(&self) -> bool {
        matches!(
            self,
            Self::CheckoutCompleted(_)
                | Self::SubscriptionCreated(_)
                | Self::SubscriptionUpdated(_)
                | Self::SubscriptionDeleted(_)
                | Self::PaymentFailed(_)
        )
    }

    /// Event payload, if the variant carries one
    pub fn data(&self) -> Option<&BillingEventData> {
        match self {
            Self::CheckoutCompleted(d)
            | Self::SubscriptionCreated(d)
            | Self::SubscriptionUpdated(d)
            | Self::SubscriptionDeleted(d)
            | Self::PaymentFailed(d)
            | Self::CustomerUpdated(d) => Some(d),
            Self::Unhandled { .. } => None,
        }
    }
}
