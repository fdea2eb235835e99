//! Subscription reconciliation
//!
//! Applies billing events, identity plan signals and administrative actions
//! to the subscription store. Every write goes through the store's atomic
//! upsert, so duplicate and concurrent deliveries converge on one row, and
//! events older than the stored freshness watermark are dropped there.

use std::sync::Arc;

use chrono::Utc;
use tally_db::{SubscriptionPatch, SubscriptionRepository};
use tally_types::subscription::standard_period;
use tally_types::{
    plan, AccountId, BillingEvent, BillingEventData, PlanId, Subscription, SubscriptionStatus,
};
use tracing::instrument;

use crate::EntitlementError;

/// Result of applying a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Stored row after the write
    Applied(Subscription),
    /// Stored state is newer than the change; nothing written
    Stale,
    /// Change does not apply to stored state
    Ignored,
    /// No account could be found for the event
    Unmatched,
}

impl ReconcileOutcome {
    /// Short label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Stale => "stale",
            Self::Ignored => "ignored",
            Self::Unmatched => "unmatched",
        }
    }

    /// Stored row, when the change was applied
    pub fn subscription(&self) -> Option<&Subscription> {
        match self {
            Self::Applied(sub) => Some(sub),
            _ => None,
        }
    }
}

/// Map a billing provider status to a stored status
pub fn map_provider_status(status: &str) -> Option<SubscriptionStatus> {
    match status {
        "active" | "trialing" => Some(SubscriptionStatus::Active),
        "past_due" | "unpaid" | "incomplete" => Some(SubscriptionStatus::PastDue),
        "canceled" | "incomplete_expired" => Some(SubscriptionStatus::Canceled),
        _ => None,
    }
}

/// Writes subscription state from every source
pub struct ReconciliationHandler<S: SubscriptionRepository> {
    subscriptions: Arc<S>,
}

impl<S: SubscriptionRepository> Clone for ReconciliationHandler<S> {
    fn clone(&self) -> Self {
        Self {
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }
}

impl<S: SubscriptionRepository> ReconciliationHandler<S> {
    /// Create a new reconciliation handler
    pub fn new(subscriptions: Arc<S>) -> Self {
        Self { subscriptions }
    }

    // =========================================================================
    // Billing events
    // =========================================================================

    /// Apply a normalized billing event
    #[instrument(skip(self, event), fields(event_type = %event.event_type()))]
    pub async fn apply_billing_event(
        &self,
        event: &BillingEvent,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        let data = match event.data() {
            Some(data) => data,
            None => {
                tracing::info!("Unhandled billing event, ignoring");
                return Ok(ReconcileOutcome::Ignored);
            }
        };

        let Some(account_id) = self.resolve_account(data).await? else {
            tracing::warn!(
                event_id = %data.event_id,
                "Billing event matches no account"
            );
            return Ok(ReconcileOutcome::Unmatched);
        };

        let patch = match event {
            BillingEvent::CheckoutCompleted(d) => SubscriptionPatch {
                status: Some(
                    d.status
                        .as_deref()
                        .and_then(map_provider_status)
                        .unwrap_or(SubscriptionStatus::Active),
                ),
                ..subscription_patch(d)
            },
            BillingEvent::SubscriptionCreated(d) | BillingEvent::SubscriptionUpdated(d) => {
                subscription_patch(d)
            }
            BillingEvent::SubscriptionDeleted(d) => SubscriptionPatch {
                status: Some(SubscriptionStatus::Canceled),
                cancel_at_period_end: Some(false),
                billing_customer_ref: d.customer_ref.clone(),
                billing_subscription_ref: d.subscription_ref.clone(),
                source_updated_at: d.updated_at,
                ..Default::default()
            },
            BillingEvent::PaymentFailed(d) => SubscriptionPatch {
                status: Some(SubscriptionStatus::PastDue),
                billing_customer_ref: d.customer_ref.clone(),
                source_updated_at: d.updated_at,
                ..Default::default()
            },
            // Informational: link the customer and leave the watermark alone
            BillingEvent::CustomerUpdated(d) => match &d.customer_ref {
                Some(customer) => SubscriptionPatch {
                    billing_customer_ref: Some(customer.clone()),
                    ..Default::default()
                },
                None => return Ok(ReconcileOutcome::Ignored),
            },
            BillingEvent::Unhandled { .. } => return Ok(ReconcileOutcome::Ignored),
        };

        let outcome = self.upsert(&account_id, patch).await?;
        tracing::info!(
            account_id = %account_id,
            event_id = %data.event_id,
            outcome = outcome.as_str(),
            "Billing event reconciled"
        );
        Ok(outcome)
    }

    async fn resolve_account(
        &self,
        data: &BillingEventData,
    ) -> Result<Option<AccountId>, EntitlementError> {
        if let Some(account_id) = &data.account_id {
            return Ok(Some(account_id.clone()));
        }

        let mut row = None;
        if let Some(subscription_ref) = &data.subscription_ref {
            row = self
                .subscriptions
                .find_by_subscription_ref(subscription_ref)
                .await?;
        }
        if row.is_none() {
            if let Some(customer_ref) = &data.customer_ref {
                row = self.subscriptions.find_by_customer_ref(customer_ref).await?;
            }
        }

        match row {
            Some(row) => Ok(Some(row.into_subscription()?.account_id)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Identity provider
    // =========================================================================

    /// Apply the plan the identity provider observed for an account.
    ///
    /// Billing-managed subscriptions take precedence over this signal.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn apply_identity_signal(
        &self,
        account_id: &AccountId,
        observed_plan: &str,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        let Some(definition) = plan::lookup(observed_plan) else {
            tracing::warn!(observed_plan, "Identity signal names unknown plan, ignoring");
            return Ok(ReconcileOutcome::Ignored);
        };
        let plan_id = definition.plan_id;

        let stored = self
            .subscriptions
            .get_by_account(account_id)
            .await?
            .map(|row| row.into_subscription())
            .transpose()?;

        match stored {
            None => self.upsert(account_id, identity_patch(plan_id)).await,
            Some(sub) if sub.is_billing_managed() => {
                tracing::debug!("Billing manages this subscription, ignoring identity signal");
                Ok(ReconcileOutcome::Ignored)
            }
            Some(sub) if sub.plan_id == plan_id.as_str() => Ok(ReconcileOutcome::Ignored),
            Some(_) => {
                let patch = SubscriptionPatch {
                    plan_id: Some(plan_id),
                    ..Default::default()
                };
                self.upsert(account_id, patch).await
            }
        }
    }

    // =========================================================================
    // Account and administrative actions
    // =========================================================================

    /// Create the default free row if the account has none
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn ensure_subscription(
        &self,
        account_id: &AccountId,
    ) -> Result<Subscription, EntitlementError> {
        let row = self.subscriptions.insert_default(account_id).await?;
        Ok(row.into_subscription()?)
    }

    /// Mark the account's subscription to end with the current period
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn schedule_cancellation(
        &self,
        account_id: &AccountId,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        if self.subscriptions.get_by_account(account_id).await?.is_none() {
            return Ok(ReconcileOutcome::Ignored);
        }

        let patch = SubscriptionPatch {
            cancel_at_period_end: Some(true),
            ..Default::default()
        };
        self.upsert(account_id, patch).await
    }

    /// Put an account on `plan` with a fresh standard period
    #[instrument(skip(self), fields(account_id = %account_id, plan = %plan))]
    pub async fn force_set_plan(
        &self,
        account_id: &AccountId,
        plan: PlanId,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        let outcome = self.upsert(account_id, fixed_plan_patch(plan)).await?;
        tracing::info!(outcome = outcome.as_str(), "Plan set administratively");
        Ok(outcome)
    }

    /// Put an account back on the free plan
    pub async fn reset_to_free(
        &self,
        account_id: &AccountId,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        self.force_set_plan(account_id, PlanId::Free).await
    }

    async fn upsert(
        &self,
        account_id: &AccountId,
        patch: SubscriptionPatch,
    ) -> Result<ReconcileOutcome, EntitlementError> {
        match self.subscriptions.upsert(account_id, patch).await? {
            Some(row) => Ok(ReconcileOutcome::Applied(row.into_subscription()?)),
            None => {
                tracing::info!(account_id = %account_id, "Stored subscription is newer, change dropped");
                Ok(ReconcileOutcome::Stale)
            }
        }
    }
}

/// Patch for subscription created/updated style events
fn subscription_patch(data: &BillingEventData) -> SubscriptionPatch {
    let plan_id = data.plan_id.as_deref().and_then(|raw| {
        let plan = plan::lookup(raw).map(|d| d.plan_id);
        if plan.is_none() {
            tracing::warn!(plan_id = raw, "Billing event names unknown plan, keeping stored plan");
        }
        plan
    });

    let status = data.status.as_deref().and_then(|raw| {
        let status = map_provider_status(raw);
        if status.is_none() {
            tracing::warn!(status = raw, "Unrecognized provider status, keeping stored status");
        }
        status
    });

    SubscriptionPatch {
        plan_id,
        status,
        current_period_start: data.period_start,
        current_period_end: data.period_end,
        cancel_at_period_end: data.cancel_at_period_end,
        billing_customer_ref: data.customer_ref.clone(),
        billing_subscription_ref: data.subscription_ref.clone(),
        source_updated_at: data.updated_at,
    }
}

/// Patch that puts an account on `plan`, active, starting now
fn fixed_plan_patch(plan: PlanId) -> SubscriptionPatch {
    let now = Utc::now();
    SubscriptionPatch {
        plan_id: Some(plan),
        status: Some(SubscriptionStatus::Active),
        current_period_start: Some(now),
        current_period_end: Some(now + standard_period(plan)),
        cancel_at_period_end: Some(false),
        source_updated_at: Some(now),
        ..Default::default()
    }
}

/// Row seeded from an identity signal. Carries no freshness timestamp, so a
/// billing event that predates the signal still applies.
fn identity_patch(plan: PlanId) -> SubscriptionPatch {
    SubscriptionPatch {
        source_updated_at: None,
        ..fixed_plan_patch(plan)
    }
}
