//! Tally Types - Shared domain types
//!
//! This crate contains domain types used across Tally crates:
//! - Account identity and roles
//! - Plans and the static plan catalog
//! - Subscriptions, usage counters and entitlements
//! - Normalized billing provider events

pub mod account;
pub mod billing;
pub mod entitlement;
pub mod error;
pub mod plan;
pub mod subscription;
pub mod usage;

pub use account::*;
pub use billing::*;
pub use entitlement::*;
pub use error::*;
pub use plan::{PlanDefinition, PlanId, PlanLimits, UNLIMITED};
pub use subscription::*;
pub use usage::*;
