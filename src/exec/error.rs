// ABOUTME: Per-node execution errors.
// ABOUTME: A node failure blocks its dependents but never other branches.

use crate::provider::ProviderError;
use crate::resource::ResolveError;
use crate::state::StateError;
use crate::types::Address;
use thiserror::Error;

use super::retry::RetryError;
use super::waiter::WaitError;

/// Why one node's operation failed.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("condition not satisfied within {0} seconds")]
    ConditionTimeout(u64),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("failed to resolve attribute `{attribute}`: {source}")]
    Resolve {
        attribute: String,
        source: ResolveError,
    },

    #[error("state record for `{0}` has no provider id")]
    MissingProviderId(Address),

    #[error(transparent)]
    State(#[from] StateError),
}

impl From<RetryError> for NodeError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Provider(e) => NodeError::Provider(e),
            RetryError::Cancelled => NodeError::Cancelled,
        }
    }
}

impl From<WaitError> for NodeError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout(secs) => NodeError::ConditionTimeout(secs),
            WaitError::Poll(e) => NodeError::Provider(e),
            WaitError::Cancelled => NodeError::Cancelled,
        }
    }
}
