//! Stripe webhook handling
//!
//! Verifies the `Stripe-Signature` header and turns the payload into a
//! [`BillingEvent`]. Nothing past this module sees raw provider JSON.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tally_types::{AccountId, BillingEvent, BillingEventData};
use tracing::{debug, instrument, warn};

use crate::config::{BillingConfig, DEFAULT_SIGNATURE_TOLERANCE};
use crate::error::BillingError;

/// Metadata key carrying our account id on Stripe objects
pub const ACCOUNT_ID_METADATA_KEY: &str = "account_id";

/// Metadata key carrying our plan id on Stripe objects
pub const PLAN_METADATA_KEY: &str = "plan";

/// Webhook handler for verifying and normalizing Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: String,
    tolerance: Duration,
}

impl WebhookHandler {
    /// Create a new webhook handler
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            tolerance: DEFAULT_SIGNATURE_TOLERANCE,
        }
    }

    /// Create a webhook handler from config
    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            webhook_secret: config.stripe_webhook_secret.clone(),
            tolerance: config.signature_tolerance,
        }
    }

    /// Verify and normalize a webhook payload
    #[instrument(skip(self, payload, signature))]
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<BillingEvent, BillingError> {
        self.verify_signature(payload, signature, Utc::now().timestamp())?;
        parse_event(payload)
    }

    /// Verify a Stripe signature header against `now` (Unix seconds)
    pub fn verify_signature(
        &self,
        payload: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<(), BillingError> {
        // Header: t=timestamp,v1=signature[,v1=signature...]
        let mut timestamp: Option<&str> = None;
        let mut candidates: Vec<&str> = Vec::new();

        for part in signature.split(',') {
            if let Some((key, value)) = part.trim().split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => candidates.push(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            BillingError::WebhookError("Missing timestamp".to_string())
        })?;

        if candidates.is_empty() {
            warn!("Missing v1 signature in webhook signature");
            return Err(BillingError::WebhookError("Missing signature".to_string()));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| BillingError::WebhookError("Invalid timestamp format".to_string()))?;

        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| BillingError::Internal("HMAC error".to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        // Several v1 entries appear while a signing secret is being rolled
        let verified = candidates.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !verified {
            warn!("Webhook signature verification failed");
            return Err(BillingError::WebhookError(
                "Signature verification failed".to_string(),
            ));
        }

        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if (now - ts).abs() > tolerance {
            warn!(timestamp = ts, now = now, "Webhook timestamp outside tolerance");
            return Err(BillingError::WebhookError("Timestamp too old".to_string()));
        }

        Ok(())
    }
}

/// Normalize an already-verified Stripe event payload
pub fn parse_event(payload: &[u8]) -> Result<BillingEvent, BillingError> {
    let raw: RawStripeEvent = serde_json::from_slice(payload)
        .map_err(|e| BillingError::WebhookError(e.to_string()))?;

    debug!(event_id = %raw.id, event_type = %raw.event_type, "Parsed webhook event");

    let updated_at = Utc.timestamp_opt(raw.created, 0).single();
    let data = match raw.event_type.as_str() {
        "checkout.session.completed" => {
            let session: RawCheckoutSession = from_object(raw.data.object)?;
            BillingEventData {
                event_id: raw.id.clone(),
                account_id: account_from(
                    session.metadata.get(ACCOUNT_ID_METADATA_KEY),
                    session.client_reference_id.as_ref(),
                ),
                customer_ref: session.customer,
                subscription_ref: session.subscription,
                plan_id: session.metadata.get(PLAN_METADATA_KEY).cloned(),
                updated_at,
                ..Default::default()
            }
        }
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            let sub: RawSubscription = from_object(raw.data.object)?;
            let plan_id = sub.plan_id();
            BillingEventData {
                event_id: raw.id.clone(),
                account_id: account_from(sub.metadata.get(ACCOUNT_ID_METADATA_KEY), None),
                customer_ref: Some(sub.customer),
                subscription_ref: Some(sub.id),
                plan_id,
                status: Some(sub.status),
                period_start: sub.current_period_start.and_then(timestamp),
                period_end: sub.current_period_end.and_then(timestamp),
                cancel_at_period_end: Some(sub.cancel_at_period_end),
                updated_at,
            }
        }
        "invoice.payment_failed" => {
            let invoice: RawInvoice = from_object(raw.data.object)?;
            BillingEventData {
                event_id: raw.id.clone(),
                customer_ref: invoice.customer,
                subscription_ref: invoice.subscription,
                updated_at,
                ..Default::default()
            }
        }
        "customer.updated" => {
            let customer: RawCustomer = from_object(raw.data.object)?;
            BillingEventData {
                event_id: raw.id.clone(),
                account_id: account_from(customer.metadata.get(ACCOUNT_ID_METADATA_KEY), None),
                customer_ref: Some(customer.id),
                updated_at,
                ..Default::default()
            }
        }
        _ => BillingEventData::default(),
    };

    Ok(BillingEvent::from_provider(&raw.event_type, data))
}

fn from_object<T: for<'de> Deserialize<'de>>(object: serde_json::Value) -> Result<T, BillingError> {
    serde_json::from_value(object).map_err(|e| BillingError::WebhookError(e.to_string()))
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn account_from(metadata: Option<&String>, reference: Option<&String>) -> Option<AccountId> {
    let raw = metadata.or(reference)?;
    match AccountId::parse(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed account id on webhook object");
            None
        }
    }
}

// Raw Stripe shapes, only the fields we read

#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    customer: Option<String>,
    subscription: Option<String>,
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    id: String,
    customer: String,
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    metadata: HashMap<String, String>,
    #[serde(default)]
    items: Option<RawList<RawSubscriptionItem>>,
}

impl RawSubscription {
    /// Plan from subscription metadata, else the first price's lookup key
    fn plan_id(&self) -> Option<String> {
        self.metadata.get(PLAN_METADATA_KEY).cloned().or_else(|| {
            self.items
                .as_ref()
                .and_then(|items| items.data.first())
                .and_then(|item| item.price.lookup_key.clone())
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawSubscriptionItem {
    price: RawPrice,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    lookup_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    customer: Option<String>,
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCustomer {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}
