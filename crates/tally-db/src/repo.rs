//! Repository traits
//!
//! Define async repository interfaces for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_types::subscription::standard_period;
use tally_types::{AccountId, BillingPeriod, PlanId, ResourceKind, SubscriptionStatus};

use crate::error::DbResult;
use crate::models::*;

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the subscription for an account
    async fn get_by_account(&self, account_id: &AccountId) -> DbResult<Option<SubscriptionRow>>;

    /// Find a subscription by billing provider subscription reference
    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> DbResult<Option<SubscriptionRow>>;

    /// Find a subscription by billing provider customer reference
    async fn find_by_customer_ref(&self, customer_ref: &str)
        -> DbResult<Option<SubscriptionRow>>;

    /// Insert or update the account's row in one atomic step.
    ///
    /// Returns `None` when the patch is older than the stored freshness
    /// watermark and was dropped.
    async fn upsert(
        &self,
        account_id: &AccountId,
        patch: SubscriptionPatch,
    ) -> DbResult<Option<SubscriptionRow>>;

    /// Insert the default free row if the account has none, then return the row
    async fn insert_default(&self, account_id: &AccountId) -> DbResult<SubscriptionRow>;
}

/// Partial subscription update. `None` fields keep the stored value, or the
/// default when the row is being created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionPatch {
    pub plan_id: Option<PlanId>,
    pub status: Option<SubscriptionStatus>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
    pub billing_customer_ref: Option<String>,
    pub billing_subscription_ref: Option<String>,
    /// Source timestamp of the state in this patch
    pub source_updated_at: Option<DateTime<Utc>>,
}

impl SubscriptionPatch {
    /// Row inserted when the account has none yet.
    ///
    /// Same defaults as the `INSERT` arm of the Postgres upsert.
    pub fn new_row(&self, account_id: &AccountId, now: DateTime<Utc>) -> SubscriptionRow {
        let plan = self.plan_id.unwrap_or(PlanId::Free);
        let start = self.current_period_start.unwrap_or(now);
        SubscriptionRow {
            account_id: account_id.as_str().to_string(),
            plan_id: plan.as_str().to_string(),
            status: self
                .status
                .unwrap_or(SubscriptionStatus::Active)
                .as_str()
                .to_string(),
            current_period_start: start,
            current_period_end: self
                .current_period_end
                .unwrap_or(start + standard_period(plan)),
            cancel_at_period_end: self.cancel_at_period_end.unwrap_or(false),
            billing_customer_ref: self.billing_customer_ref.clone(),
            billing_subscription_ref: self.billing_subscription_ref.clone(),
            source_updated_at: self.source_updated_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the patch may overwrite `row`: an older source timestamp loses.
    ///
    /// Mirrors the `WHERE` guard on the Postgres upsert, for in-memory stores.
    pub fn is_fresh_against(&self, row: &SubscriptionRow) -> bool {
        match (self.source_updated_at, row.source_updated_at) {
            (Some(incoming), Some(stored)) => stored <= incoming,
            _ => true,
        }
    }

    /// Apply present fields to an existing row.
    ///
    /// Mirrors the `COALESCE` / `GREATEST` update of the Postgres upsert.
    pub fn apply_to(&self, row: &mut SubscriptionRow, now: DateTime<Utc>) {
        if let Some(plan) = self.plan_id {
            row.plan_id = plan.as_str().to_string();
        }
        if let Some(status) = self.status {
            row.status = status.as_str().to_string();
        }
        if let Some(start) = self.current_period_start {
            row.current_period_start = start;
        }
        if let Some(end) = self.current_period_end {
            row.current_period_end = end;
        }
        if let Some(cancel) = self.cancel_at_period_end {
            row.cancel_at_period_end = cancel;
        }
        if let Some(customer) = &self.billing_customer_ref {
            row.billing_customer_ref = Some(customer.clone());
        }
        if let Some(subscription) = &self.billing_subscription_ref {
            row.billing_subscription_ref = Some(subscription.clone());
        }
        row.source_updated_at = match (row.source_updated_at, self.source_updated_at) {
            (Some(stored), Some(incoming)) => Some(stored.max(incoming)),
            (stored, incoming) => stored.or(incoming),
        };
        row.updated_at = now;
    }
}

/// Usage repository trait
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Get counters for an account and period
    async fn get_for_period(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> DbResult<Option<UsageRow>>;

    /// Atomically add `delta` to one counter, creating the row on first use
    async fn increment(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
        kind: ResourceKind,
        delta: u32,
    ) -> DbResult<UsageRow>;
}

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Stored role for an account, if the account is known
    async fn find_role(&self, account_id: &AccountId) -> DbResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn account() -> AccountId {
        AccountId::parse("acct_1").unwrap()
    }

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_new_row_defaults() {
        let row = SubscriptionPatch::default().new_row(&account(), t(1));
        assert_eq!(row.plan_id, "free");
        assert_eq!(row.status, "active");
        assert_eq!(row.current_period_end - row.current_period_start, Duration::days(365));
        assert!(!row.cancel_at_period_end);
    }

    #[test]
    fn test_new_row_paid_period() {
        let patch = SubscriptionPatch {
            plan_id: Some(PlanId::Start),
            ..Default::default()
        };
        let row = patch.new_row(&account(), t(1));
        assert_eq!(row.plan_id, "start");
        assert_eq!(row.current_period_end, t(1) + Duration::days(30));
    }

    #[test]
    fn test_apply_keeps_absent_fields() {
        let mut row = SubscriptionPatch {
            plan_id: Some(PlanId::Pro),
            billing_customer_ref: Some("cus_1".to_string()),
            ..Default::default()
        }
        .new_row(&account(), t(1));

        SubscriptionPatch {
            status: Some(SubscriptionStatus::PastDue),
            ..Default::default()
        }
        .apply_to(&mut row, t(2));

        assert_eq!(row.plan_id, "pro");
        assert_eq!(row.status, "past_due");
        assert_eq!(row.billing_customer_ref.as_deref(), Some("cus_1"));
        assert_eq!(row.updated_at, t(2));
    }

    #[test]
    fn test_freshness_watermark() {
        let mut row = SubscriptionPatch {
            source_updated_at: Some(t(10)),
            ..Default::default()
        }
        .new_row(&account(), t(10));

        let older = SubscriptionPatch {
            source_updated_at: Some(t(5)),
            ..Default::default()
        };
        assert!(!older.is_fresh_against(&row));

        let same = SubscriptionPatch {
            source_updated_at: Some(t(10)),
            ..Default::default()
        };
        assert!(same.is_fresh_against(&row));

        // Untimed writes always apply and never move the watermark back
        let untimed = SubscriptionPatch::default();
        assert!(untimed.is_fresh_against(&row));
        untimed.apply_to(&mut row, t(11));
        assert_eq!(row.source_updated_at, Some(t(10)));
    }
}
