//! Application state for the Tally API service.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use tally_billing::WebhookHandler;
use tally_core::{
    AdminOverride, RateLimiter, ReconciliationHandler, SubscriptionResolver, UsageLimitChecker,
};
use tally_db::pg::{PgAccountRepository, PgSubscriptionRepository, PgUsageRepository, Repositories};
use tally_db::DbPool;

use crate::config::Config;
use crate::rate_limit::RateLimitState;

pub type Resolver = SubscriptionResolver<PgSubscriptionRepository, PgAccountRepository>;
pub type Checker =
    UsageLimitChecker<PgSubscriptionRepository, PgUsageRepository, PgAccountRepository>;
pub type Reconciler = ReconciliationHandler<PgSubscriptionRepository>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Usage checker (wraps the resolver)
    pub checker: Checker,
    /// Subscription writer
    pub reconciler: Reconciler,
    /// Stripe webhook verification
    pub webhooks: WebhookHandler,
    /// Request rate limiting
    pub rate_limit: RateLimitState,
    /// Database pool (readiness probe)
    pub pool: DbPool,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(repos: Repositories, pool: DbPool, limiter: RateLimiter, config: Config) -> Self {
        let subscriptions = Arc::new(repos.subscriptions);
        let admin = AdminOverride::new(&config.entitlement, Arc::new(repos.accounts));
        let resolver = SubscriptionResolver::new(Arc::clone(&subscriptions), admin);

        Self {
            checker: UsageLimitChecker::new(resolver, Arc::new(repos.usage)),
            reconciler: ReconciliationHandler::new(subscriptions),
            webhooks: WebhookHandler::from_config(&config.billing),
            rate_limit: RateLimitState {
                limiter,
                scope: "api",
                limit: config.rate_limit_requests,
                window: config.rate_limit_window,
            },
            pool,
            config: Arc::new(config),
        }
    }

    /// Subscription resolver
    pub fn resolver(&self) -> &Resolver {
        self.checker.resolver()
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }
}

impl FromRef<AppState> for RateLimitState {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limit.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
