//! Usage counter types

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;
use crate::AccountId;

/// Kind of metered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// "Day in role" generation
    DayInRole,
    /// Interview generation
    Interview,
}

impl ResourceKind {
    /// All resource kinds
    pub const ALL: [ResourceKind; 2] = [Self::DayInRole, Self::Interview];

    /// Stable string form
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DayInRole => "day_in_role",
            Self::Interview => "interview",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day_in_role" | "dayInRole" => Ok(Self::DayInRole),
            "interview" => Ok(Self::Interview),
            other => Err(TallyError::InvalidResourceKind(other.to_string())),
        }
    }
}

/// Billing period key (`YYYY-MM-DD` of the period start)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingPeriod(String);

impl BillingPeriod {
    const FORMAT: &'static str = "%Y-%m-%d";

    /// Period that starts at the given instant
    pub fn starting(start: DateTime<Utc>) -> Self {
        Self(start.format(Self::FORMAT).to_string())
    }

    /// Calendar month containing `now`, used when no subscription row exists
    pub fn calendar_month(now: DateTime<Utc>) -> Self {
        Self(format!("{:04}-{:02}-01", now.year(), now.month()))
    }

    /// Borrow the period key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Midnight UTC at the start of the period
    pub fn start(&self) -> DateTime<Utc> {
        NaiveDate::parse_from_str(&self.0, Self::FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Consumption counters for one account and billing period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Owning account
    pub account_id: AccountId,
    /// Billing period
    pub period: BillingPeriod,
    /// "Day in role" generations consumed
    pub day_in_role_count: u32,
    /// Interview generations consumed
    pub interview_count: u32,
}

impl UsageCounters {
    /// Zeroed counters for a period with no stored row
    pub fn empty(account_id: AccountId, period: BillingPeriod) -> Self {
        Self {
            account_id,
            period,
            day_in_role_count: 0,
            interview_count: 0,
        }
    }

    /// Count consumed for a resource kind
    pub fn used(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::DayInRole => self.day_in_role_count,
            ResourceKind::Interview => self.interview_count,
        }
    }
}
