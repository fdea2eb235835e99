//! REST API handlers

pub mod admin;
pub mod entitlement;
pub mod health;
pub mod shared;
pub mod subscription;
pub mod usage;
pub mod webhook;

pub use admin::*;
pub use entitlement::*;
pub use health::*;
pub use subscription::*;
pub use usage::*;
pub use webhook::*;
