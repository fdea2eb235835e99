//! Subscription plans and the static plan catalog

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Limit used for every dimension of the admin entitlement
pub const UNLIMITED: u32 = 9_999;

/// Subscription plan identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    /// Free plan - sample content only
    Free,
    /// Start plan - $9/mo
    Start,
    /// Pro plan - $29/mo
    Pro,
}

impl PlanId {
    /// All plans in the catalog
    pub const ALL: [PlanId; 3] = [Self::Free, Self::Start, Self::Pro];

    /// Stable string form, as stored in the database
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Start => "start",
            Self::Pro => "pro",
        }
    }

    /// Static definition of this plan
    pub const fn definition(&self) -> &'static PlanDefinition {
        match self {
            Self::Free => &FREE,
            Self::Start => &START,
            Self::Pro => &PRO,
        }
    }

    /// Whether this is the free plan
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "start" => Ok(Self::Start),
            "pro" => Ok(Self::Pro),
            _ => Err(TallyError::InvalidPlan(s.to_string())),
        }
    }
}

/// Quota definition for a plan.
///
/// Plans are not totally ordered: two plans may differ in several
/// dimensions, so upgrade/downgrade is a policy decision and is never
/// derived from comparing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDefinition {
    /// Plan identifier
    pub plan_id: PlanId,
    /// "Day in role" generations per billing period (0 = samples only)
    pub day_in_role_limit: u32,
    /// Interview generations per billing period (0 = samples only)
    pub interview_limit: u32,
    /// Questions generated per interview
    pub questions_per_interview: u32,
    /// Monthly price in cents
    pub price_cents: u32,
}

impl PlanDefinition {
    /// Limits carried by this definition
    pub const fn limits(&self) -> PlanLimits {
        PlanLimits {
            day_in_role_limit: self.day_in_role_limit,
            interview_limit: self.interview_limit,
            questions_per_interview: self.questions_per_interview,
        }
    }
}

const FREE: PlanDefinition = PlanDefinition {
    plan_id: PlanId::Free,
    day_in_role_limit: 0,
    interview_limit: 0,
    questions_per_interview: 5,
    price_cents: 0,
};

const START: PlanDefinition = PlanDefinition {
    plan_id: PlanId::Start,
    day_in_role_limit: 10,
    interview_limit: 10,
    questions_per_interview: 10,
    price_cents: 900,
};

const PRO: PlanDefinition = PlanDefinition {
    plan_id: PlanId::Pro,
    day_in_role_limit: 50,
    interview_limit: 50,
    questions_per_interview: 20,
    price_cents: 2_900,
};

/// Effective quota limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// "Day in role" generations per billing period
    pub day_in_role_limit: u32,
    /// Interview generations per billing period
    pub interview_limit: u32,
    /// Questions generated per interview
    pub questions_per_interview: u32,
}

impl PlanLimits {
    /// Limits granted to administrators
    pub const fn unlimited() -> Self {
        Self {
            day_in_role_limit: UNLIMITED,
            interview_limit: UNLIMITED,
            questions_per_interview: UNLIMITED,
        }
    }

    /// Limit for a resource kind
    pub const fn limit_for(&self, kind: crate::ResourceKind) -> u32 {
        match kind {
            crate::ResourceKind::DayInRole => self.day_in_role_limit,
            crate::ResourceKind::Interview => self.interview_limit,
        }
    }
}

/// Look up a stored plan id in the catalog.
///
/// Returns `None` for ids that are not (or no longer) in the catalog.
pub fn lookup(plan_id: &str) -> Option<&'static PlanDefinition> {
    plan_id.parse::<PlanId>().ok().map(|p| p.definition())
}
