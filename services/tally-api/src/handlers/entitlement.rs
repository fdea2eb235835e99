//! Entitlement handler

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use tally_types::Entitlement;
use tracing::instrument;

use crate::error::ApiResult;
use crate::extractors::VerifiedCaller;
use crate::handlers::shared::record_op_duration;
use crate::state::AppState;

/// GET /api/v1/entitlement
#[instrument(skip(state, caller), fields(account_id = %caller.account_id))]
pub async fn get_entitlement(
    State(state): State<AppState>,
    caller: VerifiedCaller,
) -> ApiResult<Json<Entitlement>> {
    let start = Instant::now();
    let result = state.resolver().resolve(&caller).await;
    record_op_duration("get_entitlement", start, result.is_ok());

    Ok(Json(result?))
}
