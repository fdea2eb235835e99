//! Stripe webhook handler

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::handlers::shared::record_op_duration;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: &'static str,
}

/// POST /webhooks/stripe
///
/// Verifies the signature, then reconciles the event. Signature and payload
/// problems are 400; engine failures are 500 so the provider retries.
#[instrument(skip_all)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WebhookResponse>)> {
    let start = Instant::now();

    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Missing or unreadable Stripe-Signature header");
        metrics::counter!("tally_webhooks_processed_total", "outcome" => "rejected").increment(1);
        return Err(ApiError::WebhookError("Missing Stripe-Signature header".into()));
    };

    let event = match state.webhooks.verify_and_parse(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook rejected");
            metrics::counter!("tally_webhooks_processed_total", "outcome" => "rejected")
                .increment(1);
            record_op_duration("stripe_webhook", start, false);
            return Err(e.into());
        }
    };

    let result = state.reconciler.apply_billing_event(&event).await;
    record_op_duration("stripe_webhook", start, result.is_ok());

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, event_type = event.event_type(), "Webhook processing failed");
            metrics::counter!("tally_webhooks_processed_total", "outcome" => "error").increment(1);
            return Err(e.into());
        }
    };

    metrics::counter!("tally_webhooks_processed_total", "outcome" => outcome.as_str())
        .increment(1);

    Ok((
        StatusCode::OK,
        Json(WebhookResponse {
            received: true,
            outcome: outcome.as_str(),
        }),
    ))
}
