//! Configuration for the Tally API service.

use std::time::Duration;

use tally_billing::BillingConfig;
use tally_core::EntitlementConfig;
use tally_db::PoolOptions;

/// Tally API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Database pool options
    pub pool: PoolOptions,
    /// Entitlement engine configuration (admin allow-list)
    pub entitlement: EntitlementConfig,
    /// Billing webhook configuration
    pub billing: BillingConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Requests admitted per key inside one rate-limit window
    pub rate_limit_requests: u32,
    /// Rate-limit window
    pub rate_limit_window: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = parse_or("DB_MAX_CONNECTIONS", 10)?;
        let acquire_timeout_secs: u64 = parse_or("DB_ACQUIRE_TIMEOUT_SECS", 5)?;

        // Server
        let http_port = parse_or("HTTP_PORT", 8080)?;

        // Stripe webhook secret
        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?;

        // Administrators
        let admin_ids = std::env::var("ADMIN_ACCOUNT_IDS").unwrap_or_default();

        // Request timeout
        let request_timeout_secs: u64 = parse_or("REQUEST_TIMEOUT_SECS", 30)?;

        // Rate limiting
        let rate_limit_requests = parse_or("RATE_LIMIT_REQUESTS", 30)?;
        let rate_limit_window_ms: u64 = parse_or("RATE_LIMIT_WINDOW_MS", 60_000)?;
        if rate_limit_window_ms == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_WINDOW_MS"));
        }

        // Metrics
        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Self {
            http_port,
            database_url,
            pool: PoolOptions {
                max_connections,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            },
            entitlement: EntitlementConfig::new().with_admin_list(&admin_ids),
            billing: BillingConfig::new(stripe_webhook_secret),
            request_timeout: Duration::from_secs(request_timeout_secs),
            rate_limit_requests,
            rate_limit_window: Duration::from_millis(rate_limit_window_ms),
            metrics_enabled,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
