//! Account identity types

use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// Maximum accepted length of an account identifier, in bytes
pub const MAX_ACCOUNT_ID_LEN: usize = 128;

/// Opaque account identifier issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Parse and validate an account identifier.
    ///
    /// Surrounding whitespace is trimmed. Empty ids, ids longer than
    /// [`MAX_ACCOUNT_ID_LEN`] and ids containing whitespace or control
    /// characters are rejected. No other normalization is applied.
    pub fn parse(raw: &str) -> Result<Self, TallyError> {
        let id = raw.trim();

        if id.is_empty() {
            return Err(TallyError::InvalidAccountId("empty".to_string()));
        }

        if id.len() > MAX_ACCOUNT_ID_LEN {
            return Err(TallyError::InvalidAccountId(format!(
                "longer than {MAX_ACCOUNT_ID_LEN} bytes"
            )));
        }

        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TallyError::InvalidAccountId(
                "contains whitespace or control characters".to_string(),
            ));
        }

        Ok(Self(id.to_string()))
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Account role, as stored or as asserted by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account
    #[default]
    User,
    /// Administrator with unlimited entitlement
    Admin,
}

impl Role {
    /// Parse a role string. Anything other than `admin` is a regular user.
    pub fn from_claim(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    /// Whether this is the admin role
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A caller whose identity has already been verified upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Verified account identifier
    pub account_id: AccountId,
    /// Role asserted by the identity provider, if any
    pub asserted_role: Option<Role>,
}

impl CallerIdentity {
    /// Identity with no asserted role
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            asserted_role: None,
        }
    }

    /// Attach the role asserted by the identity provider
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.asserted_role = Some(role);
        self
    }

    /// Build an identity from the verified facts handed over by the identity
    /// collaborator.
    ///
    /// A missing account id means the caller is unauthenticated; a present but
    /// malformed one is an input error.
    pub fn from_verified(account_id: Option<&str>, role: Option<&str>) -> Result<Self, TallyError> {
        let raw = account_id
            .filter(|s| !s.trim().is_empty())
            .ok_or(TallyError::Unauthenticated)?;

        Ok(Self {
            account_id: AccountId::parse(raw)?,
            asserted_role: role.map(Role::from_claim),
        })
    }
}
