// ABOUTME: Per-resource state records persisted between applies.
// ABOUTME: One record per address; the planner diffs against last_applied.

use crate::resource::{ResourceDescriptor, ResourceKind};
use crate::types::{Address, ProviderId, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Where a resource stands relative to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// No provider-side object exists.
    Absent,
    /// A create was started; the provider object may or may not exist.
    Creating,
    /// Provisioned and, where applicable, validated.
    Ready,
    /// Provisioned but unusable (e.g. validation never completed);
    /// the next plan replaces it.
    Tainted,
    /// A destroy was started but not confirmed.
    Destroying,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Absent => "absent",
            ResourceStatus::Creating => "creating",
            ResourceStatus::Ready => "ready",
            ResourceStatus::Tainted => "tainted",
            ResourceStatus::Destroying => "destroying",
        }
    }
}

/// The durable record of one resource's last-applied configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub address: Address,
    pub kind: ResourceKind,
    pub status: ResourceStatus,

    #[serde(default)]
    pub provider_id: Option<ProviderId>,

    /// Attributes as written in the document (references symbolic),
    /// compared against the desired document on the next plan.
    #[serde(default)]
    pub last_applied: BTreeMap<String, Value>,

    /// Outputs reported by the provider; referenced by dependents.
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,

    /// Dependency addresses at apply time, kept so resources removed
    /// from the document can still be destroyed in reverse order.
    #[serde(default)]
    pub depends_on: BTreeSet<Address>,

    /// Provider id of a predecessor awaiting deferred destruction after
    /// a create-before-destroy replacement.
    #[serde(default)]
    pub deposed: Option<ProviderId>,

    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    /// Write-ahead record committed before the provider create call.
    pub fn creating(descriptor: &ResourceDescriptor) -> Self {
        Self {
            address: descriptor.address.clone(),
            kind: descriptor.kind,
            status: ResourceStatus::Creating,
            provider_id: None,
            last_applied: descriptor.attributes.clone(),
            outputs: BTreeMap::new(),
            depends_on: descriptor.dependency_addresses(),
            deposed: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    pub fn with_provider_id(mut self, id: ProviderId) -> Self {
        self.provider_id = Some(id);
        self.updated_at = Utc::now();
        self
    }

    pub fn with_outputs(mut self, outputs: BTreeMap<String, Value>) -> Self {
        self.outputs = outputs;
        self.updated_at = Utc::now();
        self
    }

    pub fn with_deposed(mut self, deposed: Option<ProviderId>) -> Self {
        self.deposed = deposed;
        self.updated_at = Utc::now();
        self
    }

    pub fn is_ready(&self) -> bool {
        self.status == ResourceStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{self, Lifecycle, RawResource};

    fn descriptor() -> ResourceDescriptor {
        let raw = RawResource {
            address: "storage_bucket.site".to_string(),
            attributes: [
                ("name".to_string(), "content".into()),
                ("region".to_string(), "eu-west-1".into()),
            ]
            .into_iter()
            .collect(),
            depends_on: Vec::new(),
            lifecycle: Lifecycle::default(),
        };
        resource::parse(&[raw]).unwrap().remove(0)
    }

    #[test]
    fn creating_record_carries_desired_attributes() {
        let record = StateRecord::creating(&descriptor());
        assert_eq!(record.status, ResourceStatus::Creating);
        assert!(record.provider_id.is_none());
        assert_eq!(record.last_applied.len(), 2);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = StateRecord::creating(&descriptor())
            .with_provider_id(ProviderId::new("storage_bucket-0001"))
            .with_status(ResourceStatus::Ready);

        let json = serde_json::to_string(&record).unwrap();
        let back: StateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
