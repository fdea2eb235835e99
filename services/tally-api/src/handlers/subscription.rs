//! Subscription handlers

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tally_types::Subscription;
use tracing::instrument;

use crate::error::ApiResult;
use crate::extractors::VerifiedCaller;
use crate::handlers::shared::record_op_duration;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub scheduled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

/// POST /api/v1/subscription/init
///
/// Called once the identity provider has set up the account. Applies the
/// plan it observed, if any, then makes sure a stored row exists.
#[instrument(skip(state, caller), fields(account_id = %caller.account_id))]
pub async fn init_subscription(
    State(state): State<AppState>,
    caller: VerifiedCaller,
) -> ApiResult<Json<Subscription>> {
    let start = Instant::now();

    if let Some(plan) = caller.observed_plan.as_deref() {
        let outcome = state
            .reconciler
            .apply_identity_signal(&caller.account_id, plan)
            .await;
        if let Err(e) = outcome {
            record_op_duration("init_subscription", start, false);
            return Err(e.into());
        }
    }

    let result = state.reconciler.ensure_subscription(&caller.account_id).await;
    record_op_duration("init_subscription", start, result.is_ok());

    Ok(Json(result?))
}

/// POST /api/v1/subscription/cancel
///
/// Schedules cancellation at the end of the current period.
#[instrument(skip(state, caller), fields(account_id = %caller.account_id))]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    caller: VerifiedCaller,
) -> ApiResult<Json<CancelResponse>> {
    let start = Instant::now();
    let result = state
        .reconciler
        .schedule_cancellation(&caller.account_id)
        .await;
    record_op_duration("cancel_subscription", start, result.is_ok());

    let subscription = result?.subscription().cloned();
    if subscription.is_some() {
        metrics::counter!("tally_cancellations_scheduled_total").increment(1);
    }

    Ok(Json(CancelResponse {
        scheduled: subscription.is_some(),
        subscription,
    }))
}
