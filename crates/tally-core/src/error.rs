//! Entitlement errors

use tally_types::TallyError;
use thiserror::Error;

/// Errors raised by the entitlement engine
#[derive(Error, Debug)]
pub enum EntitlementError {
    /// No verified caller identity
    #[error("unauthenticated")]
    Unauthenticated,

    /// Account id failed validation
    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    /// Unknown resource kind
    #[error("invalid resource kind: {0}")]
    InvalidResourceKind(String),

    /// Unknown plan id supplied by a caller
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Caller is not allowed to perform the operation
    #[error("forbidden")]
    Forbidden,

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl EntitlementError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::InvalidAccountId(_) | Self::InvalidResourceKind(_) | Self::InvalidPlan(_) => 400,
            Self::Forbidden => 403,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
            Self::InvalidResourceKind(_) => "INVALID_RESOURCE_KIND",
            Self::InvalidPlan(_) => "INVALID_PLAN",
            Self::Forbidden => "FORBIDDEN",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<tally_db::DbError> for EntitlementError {
    fn from(err: tally_db::DbError) -> Self {
        tracing::error!("Database error: {}", err);
        Self::Database(err.to_string())
    }
}

impl From<TallyError> for EntitlementError {
    fn from(err: TallyError) -> Self {
        match err {
            TallyError::Unauthenticated => Self::Unauthenticated,
            TallyError::InvalidAccountId(id) => Self::InvalidAccountId(id),
            TallyError::InvalidPlan(plan) => Self::InvalidPlan(plan),
            TallyError::InvalidResourceKind(kind) => Self::InvalidResourceKind(kind),
            TallyError::InvalidStatus(status) => Self::Internal(format!("invalid status: {status}")),
        }
    }
}
