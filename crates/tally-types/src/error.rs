//! Common error types

use thiserror::Error;

/// Validation errors shared across Tally crates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    /// No verified caller identity was supplied
    #[error("unauthenticated")]
    Unauthenticated,

    /// Account identifier is malformed
    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    /// Plan identifier is not in the catalog
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Resource kind is not recognized
    #[error("invalid resource kind: {0}")]
    InvalidResourceKind(String),

    /// Subscription status is not recognized
    #[error("invalid subscription status: {0}")]
    InvalidStatus(String),
}
