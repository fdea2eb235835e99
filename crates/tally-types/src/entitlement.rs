//! Entitlement and limit-check types

use serde::{Deserialize, Serialize};

use crate::{BillingPeriod, PlanId, PlanLimits, ResourceKind, Subscription};

/// Plan an entitlement was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitledPlan {
    /// Free plan
    Free,
    /// Start plan
    Start,
    /// Pro plan
    Pro,
    /// Administrator override
    Admin,
}

impl EntitledPlan {
    /// Stable string form
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Start => "start",
            Self::Pro => "pro",
            Self::Admin => "admin",
        }
    }
}

impl From<PlanId> for EntitledPlan {
    fn from(plan: PlanId) -> Self {
        match plan {
            PlanId::Free => Self::Free,
            PlanId::Start => Self::Start,
            PlanId::Pro => Self::Pro,
        }
    }
}

impl std::fmt::Display for EntitledPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective entitlement of an account at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Plan the limits come from
    pub plan: EntitledPlan,
    /// Free plan, or a paid plan that is not active
    pub is_free_plan: bool,
    /// Stored subscription, `None` when the account has no row yet
    pub subscription: Option<Subscription>,
    /// Effective limits
    pub limits: PlanLimits,
    /// Usage period the account currently counts against
    pub period: BillingPeriod,
}

/// Result of checking a single resource kind against its limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCheck {
    /// Whether another unit may be consumed
    pub allowed: bool,
    /// Resource kind checked
    pub kind: ResourceKind,
    /// Units consumed in the current period
    pub used: u32,
    /// Units allowed per period (0 = samples only)
    pub limit: u32,
    /// Units left in the current period
    pub remaining: u32,
    /// Plan the limit comes from
    pub plan: EntitledPlan,
    /// Whether the account is on free-tier entitlement
    pub is_free_plan: bool,
}

impl LimitCheck {
    /// Build a check result from usage and limit
    pub fn evaluate(
        kind: ResourceKind,
        used: u32,
        limit: u32,
        plan: EntitledPlan,
        is_free_plan: bool,
    ) -> Self {
        Self {
            allowed: used < limit,
            kind,
            used,
            limit,
            remaining: limit.saturating_sub(used),
            plan,
            is_free_plan,
        }
    }

    /// Whether the kind is illustrative-only for this plan
    pub fn is_sample_only(&self) -> bool {
        self.limit == 0
    }
}

/// Usage of one resource kind, for "x/y used" rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Resource kind
    pub kind: ResourceKind,
    /// Units consumed
    pub used: u32,
    /// Units allowed
    pub limit: u32,
}

/// Usage of every resource kind for the current period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Plan the limits come from
    pub plan: EntitledPlan,
    /// Whether the account is on free-tier entitlement
    pub is_free_plan: bool,
    /// Billing period
    pub period: BillingPeriod,
    /// Per-kind usage
    pub resources: Vec<ResourceUsage>,
    /// Questions generated per interview
    pub questions_per_interview: u32,
}
