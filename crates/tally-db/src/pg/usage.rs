//! PostgreSQL usage repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use tally_types::{AccountId, BillingPeriod, ResourceKind};
use tracing::instrument;

use crate::error::{DbError, DbResult};
use crate::models::UsageRow;
use crate::repo::UsageRepository;

/// PostgreSQL usage repository
#[derive(Clone)]
pub struct PgUsageRepository {
    pool: PgPool,
}

impl PgUsageRepository {
    /// Create a new usage repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    #[instrument(skip(self), fields(account_id = %account_id, period = %period))]
    async fn get_for_period(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> DbResult<Option<UsageRow>> {
        let usage = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT account_id, period, day_in_role_count, interview_count, updated_at
            FROM usage_counters
            WHERE account_id = $1 AND period = $2
            "#,
        )
        .bind(account_id.as_str())
        .bind(period.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(usage)
    }

    #[instrument(skip(self), fields(account_id = %account_id, period = %period, kind = %kind))]
    async fn increment(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
        kind: ResourceKind,
        delta: u32,
    ) -> DbResult<UsageRow> {
        let delta = i32::try_from(delta)
            .map_err(|_| DbError::InvalidRow(format!("usage delta out of range: {delta}")))?;
        let (day_in_role, interview) = match kind {
            ResourceKind::DayInRole => (delta, 0),
            ResourceKind::Interview => (0, delta),
        };

        let usage = sqlx::query_as::<_, UsageRow>(
            r#"
            INSERT INTO usage_counters (account_id, period, day_in_role_count, interview_count)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id, period) DO UPDATE SET
                day_in_role_count = usage_counters.day_in_role_count + EXCLUDED.day_in_role_count,
                interview_count = usage_counters.interview_count + EXCLUDED.interview_count,
                updated_at = NOW()
            RETURNING account_id, period, day_in_role_count, interview_count, updated_at
            "#,
        )
        .bind(account_id.as_str())
        .bind(period.as_str())
        .bind(day_in_role)
        .bind(interview)
        .fetch_one(&self.pool)
        .await?;

        Ok(usage)
    }
}
