//! Tally Billing - Stripe webhook transport
//!
//! Verifies Stripe webhook signatures and normalizes payloads into the
//! closed set of billing events reconciliation understands.
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_billing::{BillingConfig, WebhookHandler};
//!
//! let handler = WebhookHandler::from_config(&BillingConfig::new("whsec_..."));
//! let event = handler.verify_and_parse(&body, signature_header)?;
//! reconciler.apply_billing_event(&event).await?;
//! ```

pub mod config;
pub mod error;
pub mod webhook;

pub use config::BillingConfig;
pub use error::BillingError;
pub use webhook::{parse_event, WebhookHandler};
