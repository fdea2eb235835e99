//! Administrator detection

use std::collections::HashSet;
use std::sync::Arc;

use tally_db::AccountRepository;
use tally_types::{AccountId, CallerIdentity, Role};
use tracing::instrument;

use crate::config::EntitlementConfig;

/// Decides whether a caller gets administrator entitlement.
///
/// A caller is an administrator when any of these hold: the account is on
/// the configured allow-list, the identity provider asserted the admin role,
/// or the stored account role is admin.
pub struct AdminOverride<A: AccountRepository> {
    allow_list: Arc<HashSet<AccountId>>,
    accounts: Arc<A>,
}

impl<A: AccountRepository> Clone for AdminOverride<A> {
    fn clone(&self) -> Self {
        Self {
            allow_list: Arc::clone(&self.allow_list),
            accounts: Arc::clone(&self.accounts),
        }
    }
}

impl<A: AccountRepository> AdminOverride<A> {
    /// Create a new admin override
    pub fn new(config: &EntitlementConfig, accounts: Arc<A>) -> Self {
        Self {
            allow_list: Arc::new(config.admin_account_ids.clone()),
            accounts,
        }
    }

    /// Whether the account is on the static allow-list
    pub fn is_allow_listed(&self, account_id: &AccountId) -> bool {
        self.allow_list.contains(account_id)
    }

    /// Whether the caller is an administrator.
    ///
    /// A failed role lookup never grants admin.
    #[instrument(skip(self, caller), fields(account_id = %caller.account_id))]
    pub async fn is_admin(&self, caller: &CallerIdentity) -> bool {
        if self.is_allow_listed(&caller.account_id) {
            return true;
        }
        if caller.asserted_role.is_some_and(Role::is_admin) {
            return true;
        }

        match self.accounts.find_role(&caller.account_id).await {
            Ok(Some(role)) => Role::from_claim(&role).is_admin(),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Role lookup failed, treating caller as non-admin");
                false
            }
        }
    }
}
