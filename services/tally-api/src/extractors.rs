//! Extractors for the verified caller identity.
//!
//! The identity gateway in front of this service verifies the session and
//! forwards the result as headers. Handlers take a [`VerifiedCaller`]:
//!
//! ```ignore
//! async fn handler(caller: VerifiedCaller) -> String {
//!     caller.account_id.to_string()
//! }
//! ```

use std::ops::Deref;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tally_types::CallerIdentity;

use crate::error::ApiError;

/// Verified account identifier
pub const ACCOUNT_ID_HEADER: &str = "x-account-id";
/// Role asserted by the identity provider
pub const ACCOUNT_ROLE_HEADER: &str = "x-account-role";
/// Plan the identity provider last observed for the account
pub const ACCOUNT_PLAN_HEADER: &str = "x-account-plan";

/// Caller identity plus the optional plan signal from the identity provider.
///
/// Rejects with 401 when no account id is present.
#[derive(Debug, Clone)]
pub struct VerifiedCaller {
    pub identity: CallerIdentity,
    pub observed_plan: Option<String>,
}

impl Deref for VerifiedCaller {
    type Target = CallerIdentity;

    fn deref(&self) -> &Self::Target {
        &self.identity
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for VerifiedCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = CallerIdentity::from_verified(
            header(&parts.headers, ACCOUNT_ID_HEADER),
            header(&parts.headers, ACCOUNT_ROLE_HEADER),
        )?;

        Ok(Self {
            identity,
            observed_plan: header(&parts.headers, ACCOUNT_PLAN_HEADER).map(str::to_owned),
        })
    }
}
