//! Shared handler utilities

use std::time::Instant;

use tally_types::ResourceKind;

use crate::error::ApiError;

/// Parse a resource kind from a path segment
pub fn parse_kind(raw: &str) -> Result<ResourceKind, ApiError> {
    raw.parse::<ResourceKind>().map_err(ApiError::from)
}

/// Record handler duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "tally_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}
