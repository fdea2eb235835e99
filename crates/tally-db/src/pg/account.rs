//! PostgreSQL account repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use tally_types::AccountId;
use tracing::instrument;

use crate::error::DbResult;
use crate::models::AccountRow;
use crate::repo::AccountRepository;

/// PostgreSQL account repository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn find_role(&self, account_id: &AccountId) -> DbResult<Option<String>> {
        let account = sqlx::query_as::<_, AccountRow>(
            "SELECT account_id, role, created_at FROM accounts WHERE account_id = $1",
        )
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(account.map(|a| a.role))
    }
}
