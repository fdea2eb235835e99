//! PostgreSQL repository implementations

mod account;
mod subscription;
mod usage;

pub use account::PgAccountRepository;
pub use subscription::PgSubscriptionRepository;
pub use usage::PgUsageRepository;

use crate::DbPool;

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub subscriptions: PgSubscriptionRepository,
    pub usage: PgUsageRepository,
    pub accounts: PgAccountRepository,
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            subscriptions: PgSubscriptionRepository::new(pool.clone()),
            usage: PgUsageRepository::new(pool.clone()),
            accounts: PgAccountRepository::new(pool),
        }
    }
}
