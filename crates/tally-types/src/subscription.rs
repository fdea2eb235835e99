//! Subscription types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;
use crate::{AccountId, BillingPeriod, PlanId};

/// Length of a free-tier period. Free never really expires, so it is generous.
pub const FREE_PERIOD_DAYS: i64 = 365;

/// Length of a paid billing period
pub const PAID_PERIOD_DAYS: i64 = 30;

/// Standard period length used when a plan is set outside the billing provider
pub fn standard_period(plan: PlanId) -> Duration {
    if plan.is_free() {
        Duration::days(FREE_PERIOD_DAYS)
    } else {
        Duration::days(PAID_PERIOD_DAYS)
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active
    Active,
    /// Subscription was canceled
    Canceled,
    /// Payment is past due
    PastDue,
}

impl SubscriptionStatus {
    /// Stable string form, as stored in the database
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "past_due" => Ok(Self::PastDue),
            other => Err(TallyError::InvalidStatus(other.to_string())),
        }
    }
}

/// Account subscription snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Owning account
    pub account_id: AccountId,
    /// Plan id as stored. May name a plan that is no longer in the catalog.
    pub plan_id: String,
    /// Subscription status
    pub status: SubscriptionStatus,
    /// Current billing period start
    pub current_period_start: DateTime<Utc>,
    /// Current billing period end
    pub current_period_end: DateTime<Utc>,
    /// Whether the subscription ends with the current period
    pub cancel_at_period_end: bool,
    /// Billing provider customer reference
    pub billing_customer_ref: Option<String>,
    /// Billing provider subscription reference
    pub billing_subscription_ref: Option<String>,
    /// Last local write
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// In-memory free subscription for an account that has no stored row.
    ///
    /// Nothing is persisted: rows are only created by write-triggering
    /// actions, so a successful read does not imply a row exists.
    pub fn implicit_free(account_id: AccountId, now: DateTime<Utc>) -> Self {
        let period = BillingPeriod::calendar_month(now);
        let start = period.start();
        Self {
            account_id,
            plan_id: PlanId::Free.as_str().to_string(),
            status: SubscriptionStatus::Active,
            current_period_start: start,
            current_period_end: start + standard_period(PlanId::Free),
            cancel_at_period_end: false,
            billing_customer_ref: None,
            billing_subscription_ref: None,
            updated_at: now,
        }
    }

    /// Catalog plan for the stored id, if it is still known
    pub fn plan(&self) -> Option<PlanId> {
        self.plan_id.parse().ok()
    }

    /// Whether the status is active
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Whether the billing provider manages this subscription
    pub fn is_billing_managed(&self) -> bool {
        self.billing_subscription_ref.is_some()
    }

    /// Usage period the subscription counts against at `now`.
    ///
    /// Billing-managed rows follow the stored period; the provider moves it on
    /// renewal. Rows set outside billing never get renewed, so once their
    /// period has ended the start advances in whole periods of the stored
    /// length.
    pub fn billing_period(&self, now: DateTime<Utc>) -> BillingPeriod {
        if self.is_billing_managed() || now < self.current_period_end {
            return BillingPeriod::starting(self.current_period_start);
        }

        let span = (self.current_period_end - self.current_period_start).num_seconds();
        if span <= 0 {
            return BillingPeriod::calendar_month(now);
        }

        let elapsed = (now - self.current_period_start).num_seconds();
        let start = self.current_period_start + Duration::seconds(elapsed / span * span);
        BillingPeriod::starting(start)
    }
}
