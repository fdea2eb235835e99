//! Tally Core - Entitlement business logic
//!
//! Subscription resolution, usage-limit checks, reconciliation of billing
//! and identity signals, administrator overrides and request rate limiting.

pub mod admin;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod reconcile;
pub mod resolver;
pub mod usage;

pub use admin::AdminOverride;
pub use config::EntitlementConfig;
pub use error::*;
pub use rate_limit::{rate_key, RateDecision, RateLimiter};
pub use reconcile::{ReconcileOutcome, ReconciliationHandler};
pub use resolver::SubscriptionResolver;
pub use usage::UsageLimitChecker;
