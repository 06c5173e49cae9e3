// ABOUTME: In-memory provider backend for tests and local development.
// ABOUTME: Supports fault injection and configurable condition latency.

use crate::resource::ResourceKind;
use crate::types::{ObjectKey, ProviderId, Value};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::error::ProviderError;
use super::types::{Attributes, CreateResponse, RemoteObject};
use super::{ConditionOps, ObjectOps, ResourceOps};

#[derive(Debug, Clone)]
struct StoredResource {
    kind: ResourceKind,
    attributes: Attributes,
    /// Successful condition polls remaining before the resource reports
    /// ready; `None` means the condition never holds.
    polls_remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    hash: String,
}

#[derive(Debug, Clone, Copy)]
enum FaultMode {
    Permanent,
    Transient { remaining: u32 },
}

#[derive(Debug, Clone)]
struct CreateFault {
    kind: ResourceKind,
    attribute: String,
    equals: Value,
    mode: FaultMode,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    resources: BTreeMap<String, StoredResource>,
    objects: BTreeMap<String, BTreeMap<String, StoredObject>>,
    faults: Vec<CreateFault>,
    events: Vec<String>,
}

/// Provider backend holding everything in process memory.
///
/// Tests script it: inject create faults to exercise failure isolation
/// and retries, and raise the condition latency to exercise the waiter.
/// The event log records provider calls in order, which lets tests
/// assert scheduling constraints (e.g. a distribution is created only
/// after its certificate's condition held).
#[derive(Debug)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
    /// Polls before a condition-awaiting resource reports ready;
    /// `None` means the condition never becomes true.
    condition_latency: Mutex<Option<u32>>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            condition_latency: Mutex::new(Some(0)),
        }
    }
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `polls` successful condition checks before readiness.
    pub fn with_condition_latency(polls: u32) -> Self {
        let provider = Self::new();
        *provider.condition_latency.lock() = Some(polls);
        provider
    }

    /// Make every awaited condition unsatisfiable.
    pub fn with_condition_never_ready() -> Self {
        let provider = Self::new();
        *provider.condition_latency.lock() = None;
        provider
    }

    /// Permanently fail creates of `kind` whose `attribute` equals the
    /// given value.
    pub fn fail_create(&self, kind: ResourceKind, attribute: &str, equals: impl Into<Value>) {
        self.inner.lock().faults.push(CreateFault {
            kind,
            attribute: attribute.to_string(),
            equals: equals.into(),
            mode: FaultMode::Permanent,
        });
    }

    /// Fail matching creates with a transient error `times` times, then
    /// let them succeed.
    pub fn fail_create_transient(
        &self,
        kind: ResourceKind,
        attribute: &str,
        equals: impl Into<Value>,
        times: u32,
    ) {
        self.inner.lock().faults.push(CreateFault {
            kind,
            attribute: attribute.to_string(),
            equals: equals.into(),
            mode: FaultMode::Transient { remaining: times },
        });
    }

    /// Ordered log of provider calls.
    pub fn events(&self) -> Vec<String> {
        self.inner.lock().events.clone()
    }

    pub fn resource_count(&self) -> usize {
        self.inner.lock().resources.len()
    }

    pub fn has_resource(&self, id: &ProviderId) -> bool {
        self.inner.lock().resources.contains_key(id.as_str())
    }

    /// Object bodies currently stored for a target, keyed by object key.
    pub fn object_bodies(&self, target: &ProviderId) -> BTreeMap<String, Bytes> {
        self.inner
            .lock()
            .objects
            .get(target.as_str())
            .map(|objects| {
                objects
                    .iter()
                    .map(|(k, o)| (k.clone(), o.body.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn take_fault(inner: &mut Inner, kind: ResourceKind, attributes: &Attributes) -> Option<ProviderError> {
        for fault in &mut inner.faults {
            if fault.kind != kind {
                continue;
            }
            if attributes.get(&fault.attribute) != Some(&fault.equals) {
                continue;
            }
            match &mut fault.mode {
                FaultMode::Permanent => {
                    return Some(ProviderError::Rejected {
                        message: format!("injected failure for {kind}"),
                    });
                }
                FaultMode::Transient { remaining } => {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Some(ProviderError::Unavailable {
                            message: format!("injected transient failure for {kind}"),
                        });
                    }
                }
            }
        }
        None
    }

    fn outputs_for(kind: ResourceKind, id: &str, attributes: &Attributes) -> Attributes {
        let mut outputs = Attributes::new();
        outputs.insert("id".to_string(), Value::String(id.to_string()));

        let attr = |name: &str| {
            attributes
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        match kind {
            ResourceKind::StorageBucket => {
                outputs.insert(
                    "endpoint".to_string(),
                    Value::String(format!("{}.storage.internal", attr("name"))),
                );
            }
            ResourceKind::Distribution => {
                outputs.insert(
                    "domain_name".to_string(),
                    Value::String(format!("{id}.cdn.internal")),
                );
            }
            ResourceKind::DnsRecord => {
                outputs.insert(
                    "fqdn".to_string(),
                    Value::String(format!("{}.{}", attr("name"), attr("zone"))),
                );
            }
            ResourceKind::BucketPolicy | ResourceKind::Certificate => {}
        }

        outputs
    }
}

#[async_trait]
impl ResourceOps for MemoryProvider {
    async fn create(
        &self,
        kind: ResourceKind,
        attributes: &Attributes,
    ) -> Result<CreateResponse, ProviderError> {
        let mut inner = self.inner.lock();

        if let Some(error) = Self::take_fault(&mut inner, kind, attributes) {
            inner.events.push(format!("create {kind} failed"));
            return Err(error);
        }

        inner.next_id += 1;
        let id = format!("{kind}-{:04}", inner.next_id);

        let polls_remaining = if kind.awaits_condition() {
            *self.condition_latency.lock()
        } else {
            Some(0)
        };

        inner.resources.insert(
            id.clone(),
            StoredResource {
                kind,
                attributes: attributes.clone(),
                polls_remaining,
            },
        );
        inner.events.push(format!("create {kind} {id}"));

        Ok(CreateResponse {
            outputs: Self::outputs_for(kind, &id, attributes),
            id: ProviderId::new(id),
        })
    }

    async fn read(
        &self,
        _kind: ResourceKind,
        id: &ProviderId,
    ) -> Result<Option<Attributes>, ProviderError> {
        let inner = self.inner.lock();
        Ok(inner
            .resources
            .get(id.as_str())
            .map(|r| r.attributes.clone()))
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: &ProviderId,
        attributes: &Attributes,
    ) -> Result<Attributes, ProviderError> {
        let mut inner = self.inner.lock();

        let resource = inner
            .resources
            .get_mut(id.as_str())
            .ok_or_else(|| ProviderError::NotFound {
                id: id.to_string(),
            })?;
        resource.attributes = attributes.clone();
        inner.events.push(format!("update {kind} {id}"));

        Ok(Self::outputs_for(kind, id.as_str(), attributes))
    }

    async fn delete(&self, kind: ResourceKind, id: &ProviderId) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock();

        if inner.resources.remove(id.as_str()).is_none() {
            return Err(ProviderError::NotFound {
                id: id.to_string(),
            });
        }
        inner.objects.remove(id.as_str());
        inner.events.push(format!("delete {kind} {id}"));
        Ok(())
    }
}

#[async_trait]
impl ConditionOps for MemoryProvider {
    async fn check_condition(
        &self,
        _kind: ResourceKind,
        id: &ProviderId,
    ) -> Result<bool, ProviderError> {
        let mut inner = self.inner.lock();

        let resource = inner
            .resources
            .get_mut(id.as_str())
            .ok_or_else(|| ProviderError::NotFound {
                id: id.to_string(),
            })?;

        let ready = match &mut resource.polls_remaining {
            None => false,
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
        };

        inner.events.push(format!("check_condition {id} {ready}"));
        Ok(ready)
    }
}

#[async_trait]
impl ObjectOps for MemoryProvider {
    async fn list_objects(
        &self,
        target: &ProviderId,
    ) -> Result<Vec<RemoteObject>, ProviderError> {
        let inner = self.inner.lock();
        Ok(inner
            .objects
            .get(target.as_str())
            .map(|objects| {
                objects
                    .iter()
                    .map(|(key, object)| RemoteObject {
                        key: ObjectKey::new(key.clone()),
                        content_hash: object.hash.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_object(
        &self,
        target: &ProviderId,
        key: &ObjectKey,
        body: Bytes,
    ) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock();

        if !inner.resources.contains_key(target.as_str()) {
            return Err(ProviderError::NotFound {
                id: target.to_string(),
            });
        }

        let hash = blake3::hash(&body).to_hex().to_string();
        inner
            .objects
            .entry(target.as_str().to_string())
            .or_default()
            .insert(key.as_str().to_string(), StoredObject { body, hash });
        inner.events.push(format!("put_object {target} {key}"));
        Ok(())
    }

    async fn delete_object(
        &self,
        target: &ProviderId,
        key: &ObjectKey,
    ) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock();

        if let Some(objects) = inner.objects.get_mut(target.as_str()) {
            objects.remove(key.as_str());
        }
        inner.events.push(format!("delete_object {target} {key}"));
        Ok(())
    }
}
