//! Integration tests for subscription resolution and admin overrides

mod common;

use chrono::Utc;
use common::{caller, engine, MockSubscriptionRepository};
use tally_core::EntitlementError;
use tally_types::{BillingPeriod, EntitledPlan, ResourceKind, Role, UNLIMITED};

#[tokio::test]
async fn test_unknown_account_resolves_free_without_writing() {
    let e = engine("");

    let ent = e.resolver.resolve(&caller("acct_new")).await.unwrap();

    assert_eq!(ent.plan, EntitledPlan::Free);
    assert!(ent.is_free_plan);
    assert!(ent.subscription.is_none());
    assert_eq!(e.subscriptions.len(), 0);
    assert_eq!(e.subscriptions.write_count(), 0);
}

#[tokio::test]
async fn test_active_paid_subscription() {
    let e = engine("");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_1", "start", "active"));

    let ent = e.resolver.resolve(&caller("acct_1")).await.unwrap();

    assert_eq!(ent.plan, EntitledPlan::Start);
    assert!(!ent.is_free_plan);
    assert_eq!(ent.limits.limit_for(ResourceKind::Interview), 10);
    assert_eq!(ent.limits.questions_per_interview, 10);
}

#[tokio::test]
async fn test_past_due_paid_plan_gets_free_limits() {
    let e = engine("");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_1", "pro", "past_due"));

    let ent = e.resolver.resolve(&caller("acct_1")).await.unwrap();

    assert!(ent.is_free_plan);
    assert_eq!(ent.plan, EntitledPlan::Free);
    assert_eq!(ent.limits.limit_for(ResourceKind::DayInRole), 0);
}

#[tokio::test]
async fn test_retired_plan_id_falls_back_to_free() {
    let e = engine("");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_1", "enterprise", "active"));

    let ent = e.resolver.resolve(&caller("acct_1")).await.unwrap();

    assert_eq!(ent.plan, EntitledPlan::Free);
    assert_eq!(ent.limits.questions_per_interview, 5);
}

#[tokio::test]
async fn test_allow_listed_admin_ignores_subscription() {
    let e = engine("acct_admin");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_admin", "free", "canceled"));

    let ent = e.resolver.resolve(&caller("acct_admin")).await.unwrap();

    assert_eq!(ent.plan, EntitledPlan::Admin);
    assert!(!ent.is_free_plan);
    assert_eq!(ent.limits.limit_for(ResourceKind::Interview), UNLIMITED);
}

#[tokio::test]
async fn test_asserted_admin_role() {
    let e = engine("");

    let admin = caller("acct_1").with_role(Role::Admin);
    assert_eq!(e.resolver.resolve(&admin).await.unwrap().plan, EntitledPlan::Admin);

    let user = caller("acct_1").with_role(Role::User);
    assert_eq!(e.resolver.resolve(&user).await.unwrap().plan, EntitledPlan::Free);
}

#[tokio::test]
async fn test_stored_admin_role() {
    let e = engine("");
    e.accounts.set_role("acct_1", "admin");

    assert!(e.resolver.admin().is_admin(&caller("acct_1")).await);
    assert!(!e.resolver.admin().is_admin(&caller("acct_2")).await);
}

#[tokio::test]
async fn test_role_lookup_failure_never_grants_admin() {
    let e = engine("acct_listed");
    e.accounts.set_role("acct_1", "admin");
    e.accounts.fail_lookups();

    assert!(!e.resolver.admin().is_admin(&caller("acct_1")).await);
    // Allow-list still applies without the store
    assert!(e.resolver.admin().is_admin(&caller("acct_listed")).await);

    let ent = e.resolver.resolve(&caller("acct_1")).await.unwrap();
    assert_eq!(ent.plan, EntitledPlan::Free);
}

#[tokio::test]
async fn test_admin_resolves_when_subscription_store_fails() {
    let e = engine("acct_admin");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_admin", "pro", "active"));
    e.subscriptions.fail_reads();

    let ent = e.resolver.resolve(&caller("acct_admin")).await.unwrap();
    assert_eq!(ent.plan, EntitledPlan::Admin);
    assert!(ent.subscription.is_none());
    assert_eq!(ent.period, BillingPeriod::calendar_month(Utc::now()));

    // Usage still works on the calendar period
    let check = e
        .checker
        .check(&caller("acct_admin"), ResourceKind::Interview)
        .await
        .unwrap();
    assert!(check.allowed);

    // Everyone else sees the store failure
    let err = e.resolver.resolve(&caller("acct_1")).await.unwrap_err();
    assert!(matches!(err, EntitlementError::Database(_)));
}
