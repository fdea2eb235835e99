//! Error types for the Tally API service.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tally_billing::BillingError;
use tally_core::EntitlementError;
use tally_types::{EntitledPlan, ResourceKind, TallyError};

/// Response header carrying the requests left in the rate-limit window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Usage limit reached for {kind}: {used}/{limit}")]
    UsageLimitExceeded {
        kind: ResourceKind,
        used: u32,
        limit: u32,
        plan: EntitledPlan,
    },

    #[error("Too many requests, try again later")]
    RateLimited,

    #[error("Webhook error: {0}")]
    WebhookError(String),

    #[error("{0}")]
    Entitlement(#[from] EntitlementError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        Self::Entitlement(err.into())
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::WebhookError(msg) => Self::WebhookError(msg),
            BillingError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) | Self::UsageLimitExceeded { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::WebhookError(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Entitlement(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::UsageLimitExceeded { .. } => "USAGE_LIMIT_EXCEEDED",
            Self::RateLimited => "RATE_LIMIT_EXCEEDED",
            Self::WebhookError(_) => "WEBHOOK_ERROR",
            Self::Entitlement(e) => e.error_code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::UsageLimitExceeded {
                kind,
                used,
                limit,
                plan,
            } => Some(serde_json::json!({
                "kind": kind,
                "used": used,
                "limit": limit,
                "plan": plan,
            })),
            _ => None,
        }
    }

    fn is_internal(&self) -> bool {
        match self {
            Self::Internal(_) => true,
            Self::Entitlement(e) => e.status_code() >= 500,
            _ => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log internal errors, never echo their detail to the caller
        let message = if self.is_internal() {
            tracing::error!(error = ?self, "Internal API error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, Self::RateLimited) {
            response
                .headers_mut()
                .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from_static("0"));
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
