//! End-to-end flow through resolver, usage checker and administrative plan changes

mod common;

use common::{caller, engine};
use tally_types::{AccountId, EntitledPlan, PlanId, ResourceKind};

#[tokio::test]
async fn test_new_account_upgrade_and_exhaust_limit() {
    let e = engine("");
    let c = caller("acct_scenario");

    // New account: implicit free, nothing used
    let summary = e.checker.summary(&c).await.unwrap();
    assert_eq!(summary.plan, EntitledPlan::Free);
    assert!(summary.is_free_plan);
    assert!(summary.resources.iter().all(|r| r.used == 0));
    assert_eq!(e.subscriptions.len(), 0);

    // Free plan offers day-in-role as samples only
    let check = e.checker.check(&c, ResourceKind::DayInRole).await.unwrap();
    assert!(!check.allowed);
    assert_eq!(check.limit, 0);

    e.reconciler
        .force_set_plan(&AccountId::parse("acct_scenario").unwrap(), PlanId::Start)
        .await
        .unwrap();

    let check = e.checker.check(&c, ResourceKind::DayInRole).await.unwrap();
    assert!(check.allowed);
    assert_eq!(check.limit, 10);

    for _ in 0..10 {
        assert!(e.checker.check(&c, ResourceKind::DayInRole).await.unwrap().allowed);
        e.checker.consume(&c, ResourceKind::DayInRole).await.unwrap();
    }

    let denied = e.checker.check(&c, ResourceKind::DayInRole).await.unwrap();
    assert!(!denied.allowed);
    assert_eq!((denied.used, denied.limit), (10, 10));
    assert_eq!(denied.plan, EntitledPlan::Start);
}
