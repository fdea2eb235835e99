//! Integration tests for usage limit checks and consumption

mod common;

use chrono::{Duration, Utc};
use common::{caller, engine, MockSubscriptionRepository};
use tally_db::UsageRepository;
use tally_types::{AccountId, BillingPeriod, EntitledPlan, ResourceKind};

#[tokio::test]
async fn test_free_plan_kinds_are_sample_only() {
    let e = engine("");
    let c = caller("acct_free");

    for kind in ResourceKind::ALL {
        let check = e.checker.check(&c, kind).await.unwrap();
        assert!(!check.allowed);
        assert!(check.is_sample_only());
        assert!(check.is_free_plan);
    }

    // Sample-only kinds are never counted
    let counters = e.checker.consume(&c, ResourceKind::Interview).await.unwrap();
    assert_eq!(counters.interview_count, 0);
}

#[tokio::test]
async fn test_check_consume_until_limit() {
    let e = engine("");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_1", "start", "active"));
    let c = caller("acct_1");

    for used in 0..10 {
        let check = e.checker.check(&c, ResourceKind::DayInRole).await.unwrap();
        assert!(check.allowed, "unit {used} should be allowed");
        assert_eq!(check.used, used);
        assert_eq!(check.remaining, 10 - used);
        e.checker.consume(&c, ResourceKind::DayInRole).await.unwrap();
    }

    let check = e.checker.check(&c, ResourceKind::DayInRole).await.unwrap();
    assert!(!check.allowed);
    assert_eq!(check.used, 10);
    assert_eq!(check.limit, 10);
    assert_eq!(check.remaining, 0);

    // The other kind has its own counter
    let check = e.checker.check(&c, ResourceKind::Interview).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.used, 0);
}

#[tokio::test]
async fn test_concurrent_check_then_consume_over_admission_is_bounded() {
    let e = engine("");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_1", "start", "active"));
    let c = caller("acct_1");

    for _ in 0..9 {
        e.checker.consume(&c, ResourceKind::Interview).await.unwrap();
    }

    // Both callers see 9/10 before either consumes
    let first = e.checker.check(&c, ResourceKind::Interview).await.unwrap();
    let second = e.checker.check(&c, ResourceKind::Interview).await.unwrap();
    assert!(first.allowed && second.allowed);

    let (a, b) = futures::join!(
        e.checker.consume(&c, ResourceKind::Interview),
        e.checker.consume(&c, ResourceKind::Interview)
    );
    a.unwrap();
    b.unwrap();

    // Over-admission is at most the number of racing callers minus one
    let check = e.checker.check(&c, ResourceKind::Interview).await.unwrap();
    assert_eq!(check.used, 11);
    assert!(!check.allowed);
    assert_eq!(check.remaining, 0);
}

#[tokio::test]
async fn test_admin_consumption_is_unlimited() {
    let e = engine("acct_admin");
    let c = caller("acct_admin");

    for _ in 0..25 {
        e.checker.consume(&c, ResourceKind::Interview).await.unwrap();
    }
    let check = e.checker.check(&c, ResourceKind::Interview).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.plan, EntitledPlan::Admin);
    assert_eq!(check.used, 25);
}

#[tokio::test]
async fn test_summary_lists_every_kind() {
    let e = engine("");
    e.subscriptions
        .insert_row(MockSubscriptionRepository::create_test_row("acct_1", "pro", "active"));
    let c = caller("acct_1");

    e.checker.consume(&c, ResourceKind::DayInRole).await.unwrap();
    e.checker.consume(&c, ResourceKind::DayInRole).await.unwrap();

    let summary = e.checker.summary(&c).await.unwrap();
    assert_eq!(summary.plan, EntitledPlan::Pro);
    assert_eq!(summary.questions_per_interview, 20);
    assert_eq!(summary.resources.len(), 2);

    let day = summary
        .resources
        .iter()
        .find(|r| r.kind == ResourceKind::DayInRole)
        .unwrap();
    assert_eq!((day.used, day.limit), (2, 50));
}

#[tokio::test]
async fn test_usage_counts_against_subscription_period() {
    let e = engine("");
    let row = MockSubscriptionRepository::create_test_row("acct_1", "start", "active");
    let period = row.current_period_start.format("%Y-%m-%d").to_string();
    e.subscriptions.insert_row(row);

    e.checker
        .consume(&caller("acct_1"), ResourceKind::DayInRole)
        .await
        .unwrap();

    let stored = e.usage.row("acct_1", &period).unwrap();
    assert_eq!(stored.day_in_role_count, 1);
}

#[tokio::test]
async fn test_usage_rolls_over_after_unrenewed_period_ends() {
    let e = engine("");
    let now = Utc::now();
    let mut row = MockSubscriptionRepository::create_test_row("acct_1", "start", "active");
    row.current_period_start = now - Duration::days(70);
    row.current_period_end = now - Duration::days(40);
    e.subscriptions.insert_row(row);

    // Exhausted in the old period
    let old_period = BillingPeriod::starting(now - Duration::days(70));
    e.usage
        .increment(&AccountId::parse("acct_1").unwrap(), &old_period, ResourceKind::DayInRole, 10)
        .await
        .unwrap();

    let c = caller("acct_1");
    let check = e.checker.check(&c, ResourceKind::DayInRole).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.used, 0);
    assert_eq!(check.limit, 10);

    let ent = e.resolver.resolve(&c).await.unwrap();
    assert_eq!(ent.period, BillingPeriod::starting(now - Duration::days(10)));
}
