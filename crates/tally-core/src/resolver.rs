//! Subscription resolution
//!
//! Turns the stored subscription (or its absence) into the entitlement the
//! caller has right now. Reads only: an account without a row resolves to an
//! implicit free subscription and nothing is written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_db::{AccountRepository, DbResult, SubscriptionRepository};
use tally_types::{
    plan, AccountId, BillingPeriod, CallerIdentity, EntitledPlan, Entitlement, PlanId, PlanLimits,
    Subscription,
};
use tracing::instrument;

use crate::admin::AdminOverride;
use crate::EntitlementError;

/// Resolves a caller's effective entitlement
pub struct SubscriptionResolver<S: SubscriptionRepository, A: AccountRepository> {
    subscriptions: Arc<S>,
    admin: AdminOverride<A>,
}

impl<S: SubscriptionRepository, A: AccountRepository> Clone for SubscriptionResolver<S, A> {
    fn clone(&self) -> Self {
        Self {
            subscriptions: Arc::clone(&self.subscriptions),
            admin: self.admin.clone(),
        }
    }
}

impl<S: SubscriptionRepository, A: AccountRepository> SubscriptionResolver<S, A> {
    /// Create a new resolver
    pub fn new(subscriptions: Arc<S>, admin: AdminOverride<A>) -> Self {
        Self {
            subscriptions,
            admin,
        }
    }

    /// Admin override used by this resolver
    pub fn admin(&self) -> &AdminOverride<A> {
        &self.admin
    }

    /// Resolve the caller's entitlement.
    ///
    /// Admins short-circuit before the stored row matters. Their row is read
    /// only to pick the usage period, and a failed read falls back to the
    /// calendar month.
    #[instrument(skip(self, caller), fields(account_id = %caller.account_id))]
    pub async fn resolve(&self, caller: &CallerIdentity) -> Result<Entitlement, EntitlementError> {
        let now = Utc::now();

        if self.admin.is_admin(caller).await {
            tracing::debug!("Admin caller, granting unlimited entitlement");
            let stored = self.stored(&caller.account_id).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Subscription read failed for admin, using calendar period");
                None
            });
            return Ok(admin_entitlement(stored, now));
        }

        let stored = self.stored(&caller.account_id).await?;
        Ok(entitlement_for(stored, now))
    }

    async fn stored(&self, account_id: &AccountId) -> DbResult<Option<Subscription>> {
        self.subscriptions
            .get_by_account(account_id)
            .await?
            .map(|row| row.into_subscription())
            .transpose()
    }
}

/// Administrator entitlement. Usage still counts against the stored period.
pub fn admin_entitlement(subscription: Option<Subscription>, now: DateTime<Utc>) -> Entitlement {
    let period = period_for(subscription.as_ref(), now);
    Entitlement {
        plan: EntitledPlan::Admin,
        is_free_plan: false,
        subscription,
        limits: PlanLimits::unlimited(),
        period,
    }
}

/// Entitlement derived from a stored subscription, or its absence.
///
/// A plan that is not active grants free limits. A stored plan id that is no
/// longer in the catalog also falls back to free.
pub fn entitlement_for(subscription: Option<Subscription>, now: DateTime<Utc>) -> Entitlement {
    let period = period_for(subscription.as_ref(), now);

    let (plan_id, active) = match &subscription {
        None => (PlanId::Free, true),
        Some(sub) => {
            let plan_id = plan::lookup(&sub.plan_id).map(|d| d.plan_id).unwrap_or_else(|| {
                tracing::warn!(
                    account_id = %sub.account_id,
                    plan_id = %sub.plan_id,
                    "Unknown plan id in store, falling back to free"
                );
                PlanId::Free
            });
            (plan_id, sub.is_active())
        }
    };

    let is_free_plan = plan_id.is_free() || !active;
    let limits = if is_free_plan {
        PlanId::Free.definition().limits()
    } else {
        plan_id.definition().limits()
    };
    let plan = if is_free_plan {
        EntitledPlan::Free
    } else {
        EntitledPlan::from(plan_id)
    };

    Entitlement {
        plan,
        is_free_plan,
        subscription,
        limits,
        period,
    }
}

fn period_for(subscription: Option<&Subscription>, now: DateTime<Utc>) -> BillingPeriod {
    subscription
        .map(|sub| sub.billing_period(now))
        .unwrap_or_else(|| BillingPeriod::calendar_month(now))
}
