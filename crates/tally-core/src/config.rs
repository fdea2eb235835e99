//! Configuration types for the entitlement engine

use std::collections::HashSet;

use tally_types::AccountId;

/// Entitlement engine configuration
#[derive(Debug, Clone, Default)]
pub struct EntitlementConfig {
    /// Accounts that always receive administrator entitlement
    pub admin_account_ids: HashSet<AccountId>,
}

impl EntitlementConfig {
    /// Create a config with an empty allow-list
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the administrator allow-list
    pub fn with_admin_ids(mut self, ids: impl IntoIterator<Item = AccountId>) -> Self {
        self.admin_account_ids = ids.into_iter().collect();
        self
    }

    /// Set the administrator allow-list from a comma-separated string.
    ///
    /// Blank and malformed entries are skipped with a warning.
    pub fn with_admin_list(self, raw: &str) -> Self {
        self.with_admin_ids(parse_admin_list(raw))
    }
}

/// Parse a comma-separated account id list
pub fn parse_admin_list(raw: &str) -> Vec<AccountId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match AccountId::parse(s) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(entry = %s, error = %e, "Skipping malformed admin allow-list entry");
                None
            }
        })
        .collect()
}
