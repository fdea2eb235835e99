//! Common test utilities for tally-core integration tests

pub mod mock_repos;

#[allow(unused_imports)]
pub use mock_repos::{
    caller, engine, Engine, MockAccountRepository, MockSubscriptionRepository, MockUsageRepository,
};
