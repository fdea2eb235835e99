//! Mock repositories for testing

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tally_core::{
    AdminOverride, EntitlementConfig, ReconciliationHandler, SubscriptionResolver,
    UsageLimitChecker,
};
use tally_db::{
    AccountRepository, DbError, DbResult, SubscriptionPatch, SubscriptionRepository,
    SubscriptionRow, UsageRepository, UsageRow,
};
use tally_types::{AccountId, BillingPeriod, CallerIdentity, ResourceKind};

/// In-memory subscription repository for testing.
///
/// Upserts hold the per-key entry lock for the whole read-modify-write, so
/// concurrent writers to one account serialize the way the SQL upsert does.
#[derive(Default, Clone)]
pub struct MockSubscriptionRepository {
    rows: Arc<DashMap<String, SubscriptionRow>>,
    writes: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
}

impl MockSubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly for testing
    #[allow(dead_code)]
    pub fn insert_row(&self, row: SubscriptionRow) {
        self.rows.insert(row.account_id.clone(), row);
    }

    /// Create a test row for `account` with the given plan and status
    #[allow(dead_code)]
    pub fn create_test_row(account: &str, plan_id: &str, status: &str) -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            account_id: account.to_string(),
            plan_id: plan_id.to_string(),
            status: status.to_string(),
            current_period_start: now,
            current_period_end: now + chrono::Duration::days(30),
            cancel_at_period_end: false,
            billing_customer_ref: None,
            billing_subscription_ref: None,
            source_updated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stored row for an account
    #[allow(dead_code)]
    pub fn row(&self, account: &str) -> Option<SubscriptionRow> {
        self.rows.get(account).map(|r| r.value().clone())
    }

    /// Number of stored rows
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of write calls (upsert or insert_default)
    #[allow(dead_code)]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every account lookup fail
    #[allow(dead_code)]
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    fn find_by<F>(&self, pred: F) -> Option<SubscriptionRow>
    where
        F: Fn(&SubscriptionRow) -> bool,
    {
        self.rows
            .iter()
            .find(|r| pred(r.value()))
            .map(|r| r.value().clone())
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptionRepository {
    async fn get_by_account(&self, account_id: &AccountId) -> DbResult<Option<SubscriptionRow>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DbError::InvalidRow("subscription store unavailable".into()));
        }
        Ok(self.row(account_id.as_str()))
    }

    async fn find_by_subscription_ref(&self, sub_ref: &str) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.find_by(|r| r.billing_subscription_ref.as_deref() == Some(sub_ref)))
    }

    async fn find_by_customer_ref(&self, customer_ref: &str) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.find_by(|r| r.billing_customer_ref.as_deref() == Some(customer_ref)))
    }

    async fn upsert(
        &self,
        account_id: &AccountId,
        patch: SubscriptionPatch,
    ) -> DbResult<Option<SubscriptionRow>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();

        match self.rows.entry(account_id.as_str().to_string()) {
            Entry::Occupied(mut entry) => {
                if !patch.is_fresh_against(entry.get()) {
                    return Ok(None);
                }
                patch.apply_to(entry.get_mut(), now);
                Ok(Some(entry.get().clone()))
            }
            Entry::Vacant(entry) => {
                let row = patch.new_row(account_id, now);
                entry.insert(row.clone());
                Ok(Some(row))
            }
        }
    }

    async fn insert_default(&self, account_id: &AccountId) -> DbResult<SubscriptionRow> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let row = self
            .rows
            .entry(account_id.as_str().to_string())
            .or_insert_with(|| SubscriptionPatch::default().new_row(account_id, Utc::now()))
            .value()
            .clone();
        Ok(row)
    }
}

/// In-memory usage repository for testing
#[derive(Default, Clone)]
pub struct MockUsageRepository {
    counters: Arc<DashMap<(String, String), UsageRow>>,
}

impl MockUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored counter row
    #[allow(dead_code)]
    pub fn row(&self, account: &str, period: &str) -> Option<UsageRow> {
        self.counters
            .get(&(account.to_string(), period.to_string()))
            .map(|r| r.value().clone())
    }
}

#[async_trait]
impl UsageRepository for MockUsageRepository {
    async fn get_for_period(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> DbResult<Option<UsageRow>> {
        Ok(self.row(account_id.as_str(), period.as_str()))
    }

    async fn increment(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
        kind: ResourceKind,
        delta: u32,
    ) -> DbResult<UsageRow> {
        let delta = i32::try_from(delta).map_err(|_| DbError::InvalidRow("delta".into()))?;
        let mut entry = self
            .counters
            .entry((account_id.as_str().to_string(), period.as_str().to_string()))
            .or_insert_with(|| UsageRow {
                account_id: account_id.as_str().to_string(),
                period: period.as_str().to_string(),
                day_in_role_count: 0,
                interview_count: 0,
                updated_at: Utc::now(),
            });

        match kind {
            ResourceKind::DayInRole => entry.day_in_role_count += delta,
            ResourceKind::Interview => entry.interview_count += delta,
        }
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }
}

/// In-memory account role repository for testing
#[derive(Default, Clone)]
pub struct MockAccountRepository {
    roles: Arc<DashMap<String, String>>,
    fail: Arc<AtomicBool>,
}

impl MockAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a role for an account
    #[allow(dead_code)]
    pub fn set_role(&self, account: &str, role: &str) {
        self.roles.insert(account.to_string(), role.to_string());
    }

    /// Make every lookup fail
    #[allow(dead_code)]
    pub fn fail_lookups(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountRepository for MockAccountRepository {
    async fn find_role(&self, account_id: &AccountId) -> DbResult<Option<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DbError::InvalidRow("account store unavailable".into()));
        }
        Ok(self.roles.get(account_id.as_str()).map(|r| r.value().clone()))
    }
}

/// Engine components wired to shared in-memory stores
#[allow(dead_code)]
pub struct Engine {
    pub subscriptions: Arc<MockSubscriptionRepository>,
    pub usage: Arc<MockUsageRepository>,
    pub accounts: Arc<MockAccountRepository>,
    pub resolver: SubscriptionResolver<MockSubscriptionRepository, MockAccountRepository>,
    pub checker:
        UsageLimitChecker<MockSubscriptionRepository, MockUsageRepository, MockAccountRepository>,
    pub reconciler: ReconciliationHandler<MockSubscriptionRepository>,
}

/// Build an engine with the given admin allow-list
#[allow(dead_code)]
pub fn engine(admin_ids: &str) -> Engine {
    let subscriptions = Arc::new(MockSubscriptionRepository::new());
    let usage = Arc::new(MockUsageRepository::new());
    let accounts = Arc::new(MockAccountRepository::new());

    let config = EntitlementConfig::new().with_admin_list(admin_ids);
    let admin = AdminOverride::new(&config, Arc::clone(&accounts));
    let resolver = SubscriptionResolver::new(Arc::clone(&subscriptions), admin);
    let checker = UsageLimitChecker::new(resolver.clone(), Arc::clone(&usage));
    let reconciler = ReconciliationHandler::new(Arc::clone(&subscriptions));

    Engine {
        subscriptions,
        usage,
        accounts,
        resolver,
        checker,
        reconciler,
    }
}

/// Caller with no asserted role
#[allow(dead_code)]
pub fn caller(account: &str) -> CallerIdentity {
    CallerIdentity::new(AccountId::parse(account).expect("valid test account id"))
}
