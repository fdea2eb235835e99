//! Usage limit handlers

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tally_types::{LimitCheck, ResourceKind, UsageSummary};
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::extractors::VerifiedCaller;
use crate::handlers::shared::{parse_kind, record_op_duration};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub kind: ResourceKind,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

/// GET /api/v1/usage
#[instrument(skip(state, caller), fields(account_id = %caller.account_id))]
pub async fn get_usage(
    State(state): State<AppState>,
    caller: VerifiedCaller,
) -> ApiResult<Json<UsageSummary>> {
    let start = Instant::now();
    let result = state.checker.summary(&caller).await;
    record_op_duration("get_usage", start, result.is_ok());

    Ok(Json(result?))
}

/// POST /api/v1/usage/{kind}/check
#[instrument(skip(state, caller), fields(account_id = %caller.account_id))]
pub async fn check_usage(
    State(state): State<AppState>,
    caller: VerifiedCaller,
    Path(kind): Path<String>,
) -> ApiResult<Json<LimitCheck>> {
    let start = Instant::now();
    let kind = parse_kind(&kind)?;

    let result = state.checker.check(&caller, kind).await;
    record_op_duration("check_usage", start, result.is_ok());

    Ok(Json(result?))
}

/// POST /api/v1/usage/{kind}/consume
///
/// Checks first and refuses with 403 when the period limit is reached.
/// Concurrent consumers may overshoot by at most their count.
#[instrument(skip(state, caller), fields(account_id = %caller.account_id))]
pub async fn consume_usage(
    State(state): State<AppState>,
    caller: VerifiedCaller,
    Path(kind): Path<String>,
) -> ApiResult<Json<ConsumeResponse>> {
    let start = Instant::now();
    let kind = parse_kind(&kind)?;

    let check = match state.checker.check(&caller, kind).await {
        Ok(check) => check,
        Err(e) => {
            record_op_duration("consume_usage", start, false);
            return Err(e.into());
        }
    };

    if !check.allowed {
        record_op_duration("consume_usage", start, false);
        metrics::counter!("tally_usage_denied_total", "kind" => kind.as_str()).increment(1);
        tracing::info!(used = check.used, limit = check.limit, "Usage limit reached");
        return Err(ApiError::UsageLimitExceeded {
            kind,
            used: check.used,
            limit: check.limit,
            plan: check.plan,
        });
    }

    let result = state.checker.consume(&caller, kind).await;
    record_op_duration("consume_usage", start, result.is_ok());
    let counters = result?;

    metrics::counter!("tally_usage_consumed_total", "kind" => kind.as_str()).increment(1);

    let used = counters.used(kind);
    Ok(Json(ConsumeResponse {
        kind,
        used,
        limit: check.limit,
        remaining: check.limit.saturating_sub(used),
    }))
}
