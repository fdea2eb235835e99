//! Usage limit checks and consumption

use std::sync::Arc;

use tally_db::{AccountRepository, SubscriptionRepository, UsageRepository};
use tally_types::{
    CallerIdentity, Entitlement, LimitCheck, ResourceKind, ResourceUsage, UsageCounters,
    UsageSummary,
};
use tracing::instrument;

use crate::resolver::SubscriptionResolver;
use crate::EntitlementError;

/// Gates metered actions against the caller's plan limits.
///
/// Checking and consuming are separate steps: callers check, perform the
/// action, then consume. Two concurrent callers can both pass the check for
/// the last unit, so a counter may end slightly above its limit.
pub struct UsageLimitChecker<S, U, A>
where
    S: SubscriptionRepository,
    U: UsageRepository,
    A: AccountRepository,
{
    resolver: SubscriptionResolver<S, A>,
    usage: Arc<U>,
}

impl<S, U, A> Clone for UsageLimitChecker<S, U, A>
where
    S: SubscriptionRepository,
    U: UsageRepository,
    A: AccountRepository,
{
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            usage: Arc::clone(&self.usage),
        }
    }
}

impl<S, U, A> UsageLimitChecker<S, U, A>
where
    S: SubscriptionRepository,
    U: UsageRepository,
    A: AccountRepository,
{
    /// Create a new usage checker
    pub fn new(resolver: SubscriptionResolver<S, A>, usage: Arc<U>) -> Self {
        Self { resolver, usage }
    }

    /// Resolver used for entitlements
    pub fn resolver(&self) -> &SubscriptionResolver<S, A> {
        &self.resolver
    }

    /// Whether the caller may consume one more unit of `kind`
    #[instrument(skip(self, caller), fields(account_id = %caller.account_id, kind = %kind))]
    pub async fn check(
        &self,
        caller: &CallerIdentity,
        kind: ResourceKind,
    ) -> Result<LimitCheck, EntitlementError> {
        let entitlement = self.resolver.resolve(caller).await?;
        let counters = self.counters(caller, &entitlement).await?;
        Ok(limit_check(&entitlement, &counters, kind))
    }

    /// Record one unit of `kind` for the current period.
    ///
    /// Call after the gated action succeeded. Kinds the plan only offers as
    /// samples (limit 0) are never counted.
    #[instrument(skip(self, caller), fields(account_id = %caller.account_id, kind = %kind))]
    pub async fn consume(
        &self,
        caller: &CallerIdentity,
        kind: ResourceKind,
    ) -> Result<UsageCounters, EntitlementError> {
        let entitlement = self.resolver.resolve(caller).await?;

        if entitlement.limits.limit_for(kind) == 0 {
            tracing::debug!(plan = %entitlement.plan, "Sample-only resource, not counted");
            return self.counters(caller, &entitlement).await;
        }

        let row = self
            .usage
            .increment(&caller.account_id, &entitlement.period, kind, 1)
            .await?;
        let counters = row.into_counters()?;

        tracing::debug!(
            plan = %entitlement.plan,
            used = counters.used(kind),
            "Usage consumed"
        );
        Ok(counters)
    }

    /// Usage of every kind for the current period
    #[instrument(skip(self, caller), fields(account_id = %caller.account_id))]
    pub async fn summary(&self, caller: &CallerIdentity) -> Result<UsageSummary, EntitlementError> {
        let entitlement = self.resolver.resolve(caller).await?;
        let counters = self.counters(caller, &entitlement).await?;
        Ok(usage_summary(&entitlement, &counters))
    }

    async fn counters(
        &self,
        caller: &CallerIdentity,
        entitlement: &Entitlement,
    ) -> Result<UsageCounters, EntitlementError> {
        let counters = match self
            .usage
            .get_for_period(&caller.account_id, &entitlement.period)
            .await?
        {
            Some(row) => row.into_counters()?,
            None => UsageCounters::empty(caller.account_id.clone(), entitlement.period.clone()),
        };
        Ok(counters)
    }
}

/// Compare counters against the entitlement for one kind
pub fn limit_check(
    entitlement: &Entitlement,
    counters: &UsageCounters,
    kind: ResourceKind,
) -> LimitCheck {
    LimitCheck::evaluate(
        kind,
        counters.used(kind),
        entitlement.limits.limit_for(kind),
        entitlement.plan,
        entitlement.is_free_plan,
    )
}

/// Per-kind usage for rendering
pub fn usage_summary(entitlement: &Entitlement, counters: &UsageCounters) -> UsageSummary {
    UsageSummary {
        plan: entitlement.plan,
        is_free_plan: entitlement.is_free_plan,
        period: entitlement.period.clone(),
        resources: ResourceKind::ALL
            .into_iter()
            .map(|kind| ResourceUsage {
                kind,
                used: counters.used(kind),
                limit: entitlement.limits.limit_for(kind),
            })
            .collect(),
        questions_per_interview: entitlement.limits.questions_per_interview,
    }
}
