//! Administrative plan overrides

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tally_types::{AccountId, PlanId, Subscription};
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::extractors::VerifiedCaller;
use crate::handlers::shared::record_op_duration;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetPlanRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

async fn require_admin(state: &AppState, caller: &VerifiedCaller) -> ApiResult<()> {
    if state.resolver().admin().is_admin(caller).await {
        Ok(())
    } else {
        tracing::warn!(account_id = %caller.account_id, "Non-admin attempted admin action");
        Err(ApiError::Forbidden("admin role required".into()))
    }
}

/// POST /admin/accounts/{id}/plan
#[instrument(skip(state, caller, req), fields(admin_id = %caller.account_id, plan = %req.plan))]
pub async fn set_plan(
    State(state): State<AppState>,
    caller: VerifiedCaller,
    Path(account_id): Path<String>,
    Json(req): Json<SetPlanRequest>,
) -> ApiResult<Json<AdminResponse>> {
    require_admin(&state, &caller).await?;
    let start = Instant::now();

    let account_id = AccountId::parse(&account_id)?;
    let plan: PlanId = req.plan.parse()?;

    let result = state.reconciler.force_set_plan(&account_id, plan).await;
    record_op_duration("admin_set_plan", start, result.is_ok());
    let outcome = result?;

    tracing::info!(account_id = %account_id, plan = %plan, "Plan set by admin");
    Ok(Json(AdminResponse {
        outcome: outcome.as_str(),
        subscription: outcome.subscription().cloned(),
    }))
}

/// POST /admin/accounts/{id}/reset
#[instrument(skip(state, caller), fields(admin_id = %caller.account_id))]
pub async fn reset_plan(
    State(state): State<AppState>,
    caller: VerifiedCaller,
    Path(account_id): Path<String>,
) -> ApiResult<Json<AdminResponse>> {
    require_admin(&state, &caller).await?;
    let start = Instant::now();

    let account_id = AccountId::parse(&account_id)?;

    let result = state.reconciler.reset_to_free(&account_id).await;
    record_op_duration("admin_reset_plan", start, result.is_ok());
    let outcome = result?;

    tracing::info!(account_id = %account_id, "Account reset to free by admin");
    Ok(Json(AdminResponse {
        outcome: outcome.as_str(),
        subscription: outcome.subscription().cloned(),
    }))
}
