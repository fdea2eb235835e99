//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tally_types::AccountId;
use tracing::instrument;

use crate::error::DbResult;
use crate::models::SubscriptionRow;
use crate::repo::{SubscriptionPatch, SubscriptionRepository};

const COLUMNS: &str = "account_id, plan_id, status, current_period_start, current_period_end, \
                       cancel_at_period_end, billing_customer_ref, billing_subscription_ref, \
                       source_updated_at, created_at, updated_at";

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> DbResult<Option<SubscriptionRow>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM subscriptions WHERE {column} = $1 \
             ORDER BY updated_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn get_by_account(&self, account_id: &AccountId) -> DbResult<Option<SubscriptionRow>> {
        self.find_one("account_id", account_id.as_str()).await
    }

    #[instrument(skip(self))]
    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> DbResult<Option<SubscriptionRow>> {
        self.find_one("billing_subscription_ref", subscription_ref)
            .await
    }

    #[instrument(skip(self))]
    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> DbResult<Option<SubscriptionRow>> {
        self.find_one("billing_customer_ref", customer_ref).await
    }

    #[instrument(skip(self, patch), fields(account_id = %account_id))]
    async fn upsert(
        &self,
        account_id: &AccountId,
        patch: SubscriptionPatch,
    ) -> DbResult<Option<SubscriptionRow>> {
        let insert = patch.new_row(account_id, Utc::now());

        // Single statement: the unique account_id serializes concurrent
        // writers, and the WHERE clause drops patches older than the stored
        // watermark without a separate read.
        let sql = format!(
            r#"
            INSERT INTO subscriptions (account_id, plan_id, status, current_period_start,
                                       current_period_end, cancel_at_period_end,
                                       billing_customer_ref, billing_subscription_ref,
                                       source_updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (account_id) DO UPDATE SET
                plan_id = COALESCE($10, subscriptions.plan_id),
                status = COALESCE($11, subscriptions.status),
                current_period_start = COALESCE($12, subscriptions.current_period_start),
                current_period_end = COALESCE($13, subscriptions.current_period_end),
                cancel_at_period_end = COALESCE($14, subscriptions.cancel_at_period_end),
                billing_customer_ref = COALESCE(EXCLUDED.billing_customer_ref,
                                                subscriptions.billing_customer_ref),
                billing_subscription_ref = COALESCE(EXCLUDED.billing_subscription_ref,
                                                    subscriptions.billing_subscription_ref),
                source_updated_at = GREATEST(subscriptions.source_updated_at,
                                             EXCLUDED.source_updated_at),
                updated_at = NOW()
            WHERE $9::timestamptz IS NULL
               OR subscriptions.source_updated_at IS NULL
               OR subscriptions.source_updated_at <= $9::timestamptz
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(&insert.account_id)
            .bind(&insert.plan_id)
            .bind(&insert.status)
            .bind(insert.current_period_start)
            .bind(insert.current_period_end)
            .bind(insert.cancel_at_period_end)
            .bind(&insert.billing_customer_ref)
            .bind(&insert.billing_subscription_ref)
            .bind(insert.source_updated_at)
            .bind(patch.plan_id.map(|p| p.as_str()))
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.current_period_start)
            .bind(patch.current_period_end)
            .bind(patch.cancel_at_period_end)
            .fetch_optional(&self.pool)
            .await?;

        if row.is_none() {
            tracing::debug!("Upsert dropped, stored state is newer");
        }

        Ok(row)
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    async fn insert_default(&self, account_id: &AccountId) -> DbResult<SubscriptionRow> {
        let row = SubscriptionPatch::default().new_row(account_id, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO subscriptions (account_id, plan_id, status, current_period_start,
                                       current_period_end, cancel_at_period_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(&row.account_id)
        .bind(&row.plan_id)
        .bind(&row.status)
        .bind(row.current_period_start)
        .bind(row.current_period_end)
        .bind(row.cancel_at_period_end)
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {COLUMNS} FROM subscriptions WHERE account_id = $1");
        let stored = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(account_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(stored)
    }
}
