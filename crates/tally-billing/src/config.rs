//! Billing configuration

use std::time::Duration;

/// Default allowed clock skew between the signature timestamp and now
pub const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::from_secs(300);

/// Billing webhook configuration
#[derive(Clone)]
pub struct BillingConfig {
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Maximum age of a signed webhook
    pub signature_tolerance: Duration,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(stripe_webhook_secret: impl Into<String>) -> Self {
        Self {
            stripe_webhook_secret: stripe_webhook_secret.into(),
            signature_tolerance: DEFAULT_SIGNATURE_TOLERANCE,
        }
    }

    /// Set the signature tolerance
    pub fn with_signature_tolerance(mut self, tolerance: Duration) -> Self {
        self.signature_tolerance = tolerance;
        self
    }
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("stripe_webhook_secret", &"[REDACTED]")
            .field("signature_tolerance", &self.signature_tolerance)
            .finish()
    }
}
