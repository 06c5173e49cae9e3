// ABOUTME: Async trait seam to the cloud provider's resource APIs.
// ABOUTME: Real backends live out of tree; MemoryProvider backs tests and dev.

mod error;
mod memory;
mod types;

pub use error::{ProviderError, ProviderErrorKind};
pub use memory::MemoryProvider;
pub use types::{Attributes, CreateResponse, RemoteObject};

use crate::resource::ResourceKind;
use crate::types::{ObjectKey, ProviderId};
use async_trait::async_trait;
use bytes::Bytes;

/// Resource CRUD operations.
#[async_trait]
pub trait ResourceOps: Send + Sync {
    /// Provision a resource, returning its provider-assigned id and
    /// computed outputs.
    async fn create(
        &self,
        kind: ResourceKind,
        attributes: &Attributes,
    ) -> Result<CreateResponse, ProviderError>;

    /// Read current attributes; `None` when the resource is gone.
    async fn read(
        &self,
        kind: ResourceKind,
        id: &ProviderId,
    ) -> Result<Option<Attributes>, ProviderError>;

    /// Update a resource in place, returning refreshed outputs.
    async fn update(
        &self,
        kind: ResourceKind,
        id: &ProviderId,
        attributes: &Attributes,
    ) -> Result<Attributes, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, kind: ResourceKind, id: &ProviderId) -> Result<(), ProviderError>;
}

/// Polling of externally-asynchronous readiness conditions.
#[async_trait]
pub trait ConditionOps: Send + Sync {
    /// Side-effect-free check of the resource's readiness condition
    /// (e.g. whether the certificate authority has observed the
    /// domain-ownership proof).
    async fn check_condition(
        &self,
        kind: ResourceKind,
        id: &ProviderId,
    ) -> Result<bool, ProviderError>;
}

/// Object operations inside a storage resource, used by the content sync.
#[async_trait]
pub trait ObjectOps: Send + Sync {
    async fn list_objects(&self, target: &ProviderId)
        -> Result<Vec<RemoteObject>, ProviderError>;

    async fn put_object(
        &self,
        target: &ProviderId,
        key: &ObjectKey,
        body: Bytes,
    ) -> Result<(), ProviderError>;

    async fn delete_object(
        &self,
        target: &ProviderId,
        key: &ObjectKey,
    ) -> Result<(), ProviderError>;
}

/// Everything an apply needs from a provider backend.
pub trait Provider: ResourceOps + ConditionOps + ObjectOps {}

impl<T: ResourceOps + ConditionOps + ObjectOps> Provider for T {}
