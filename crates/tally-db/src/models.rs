//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tally_types::{
    AccountId, BillingPeriod, Subscription, SubscriptionStatus, UsageCounters,
};

use crate::error::{DbError, DbResult};

/// Subscription row from the database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SubscriptionRow {
    pub account_id: String,
    pub plan_id: String,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub billing_customer_ref: Option<String>,
    pub billing_subscription_ref: Option<String>,
    pub source_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Usage counter row from the database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UsageRow {
    pub account_id: String,
    pub period: String,
    pub day_in_role_count: i32,
    pub interview_count: i32,
    pub updated_at: DateTime<Utc>,
}

/// Account row from the database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AccountRow {
    pub account_id: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

// Conversion implementations from Row types to tally-types domain types
impl SubscriptionRow {
    /// Convert to the domain subscription.
    ///
    /// An unrecognized status is read as canceled so a corrupt row never
    /// grants paid limits.
    pub fn into_subscription(self) -> DbResult<Subscription> {
        let account_id = AccountId::parse(&self.account_id)
            .map_err(|e| DbError::InvalidRow(format!("subscriptions.account_id: {e}")))?;

        let status = self.status.parse().unwrap_or_else(|_| {
            tracing::warn!(
                account_id = %account_id,
                status = %self.status,
                "Unknown subscription status in store, treating as canceled"
            );
            SubscriptionStatus::Canceled
        });

        Ok(Subscription {
            account_id,
            plan_id: self.plan_id,
            status,
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            cancel_at_period_end: self.cancel_at_period_end,
            billing_customer_ref: self.billing_customer_ref,
            billing_subscription_ref: self.billing_subscription_ref,
            updated_at: self.updated_at,
        })
    }
}

impl UsageRow {
    /// Convert to domain usage counters
    pub fn into_counters(self) -> DbResult<UsageCounters> {
        let account_id = AccountId::parse(&self.account_id)
            .map_err(|e| DbError::InvalidRow(format!("usage_counters.account_id: {e}")))?;
        let day_in_role_count = u32::try_from(self.day_in_role_count)
            .map_err(|_| DbError::InvalidRow("negative day_in_role_count".to_string()))?;
        let interview_count = u32::try_from(self.interview_count)
            .map_err(|_| DbError::InvalidRow("negative interview_count".to_string()))?;

        Ok(UsageCounters {
            account_id,
            period: BillingPeriod::starting(period_start(&self.period)?),
            day_in_role_count,
            interview_count,
        })
    }
}

fn period_start(key: &str) -> DbResult<DateTime<Utc>> {
    chrono::NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| DbError::InvalidRow(format!("usage_counters.period: {key}")))
}
