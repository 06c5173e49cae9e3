// ABOUTME: Resource kinds and their per-kind attribute schemas.
// ABOUTME: Schemas drive validation and the update-vs-replace decision.

use crate::types::{Address, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of resource the pipeline provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    StorageBucket,
    BucketPolicy,
    Certificate,
    Distribution,
    DnsRecord,
}

/// Declared type of a schema attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Bool,
    Int,
    List,
}

impl AttrType {
    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (AttrType::String, Value::String(_))
                | (AttrType::Bool, Value::Bool(_))
                | (AttrType::Int, Value::Int(_))
                | (AttrType::List, Value::List(_))
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttrType::String => "string",
            AttrType::Bool => "bool",
            AttrType::Int => "int",
            AttrType::List => "list",
        }
    }
}

/// Schema entry for one attribute of a kind.
#[derive(Debug, Clone, Copy)]
pub struct AttrSchema {
    pub name: &'static str,
    pub ty: AttrType,
    pub required: bool,
    /// Changing this attribute requires destroying and recreating the
    /// resource; the planner turns such diffs into `replace`.
    pub forces_replacement: bool,
}

const fn required(name: &'static str, ty: AttrType) -> AttrSchema {
    AttrSchema {
        name,
        ty,
        required: true,
        forces_replacement: false,
    }
}

const fn optional(name: &'static str, ty: AttrType) -> AttrSchema {
    AttrSchema {
        name,
        ty,
        required: false,
        forces_replacement: false,
    }
}

const fn replacement(mut schema: AttrSchema) -> AttrSchema {
    schema.forces_replacement = true;
    schema
}

const STORAGE_BUCKET: &[AttrSchema] = &[
    replacement(required("name", AttrType::String)),
    replacement(required("region", AttrType::String)),
    optional("versioning", AttrType::Bool),
    optional("index_document", AttrType::String),
    optional("error_document", AttrType::String),
];

const BUCKET_POLICY: &[AttrSchema] = &[
    replacement(required("bucket", AttrType::String)),
    optional("public_read", AttrType::Bool),
];

const CERTIFICATE: &[AttrSchema] = &[
    replacement(required("domain", AttrType::String)),
    replacement(optional("alternative_names", AttrType::List)),
    replacement(optional("validation_method", AttrType::String)),
];

const DISTRIBUTION: &[AttrSchema] = &[
    required("origin", AttrType::String),
    required("certificate", AttrType::String),
    optional("aliases", AttrType::List),
    optional("price_class", AttrType::String),
    // Static allow-list of locales; opaque to the orchestration core.
    optional("geo_allow", AttrType::List),
    optional("default_root_object", AttrType::String),
];

const DNS_RECORD: &[AttrSchema] = &[
    replacement(required("zone", AttrType::String)),
    replacement(required("name", AttrType::String)),
    replacement(required("record_type", AttrType::String)),
    required("value", AttrType::String),
    optional("ttl", AttrType::Int),
];

impl ResourceKind {
    /// Resolve the kind named by an address's kind segment.
    pub fn from_address(address: &Address) -> Option<Self> {
        match address.kind_part() {
            "storage_bucket" => Some(ResourceKind::StorageBucket),
            "bucket_policy" => Some(ResourceKind::BucketPolicy),
            "certificate" => Some(ResourceKind::Certificate),
            "distribution" => Some(ResourceKind::Distribution),
            "dns_record" => Some(ResourceKind::DnsRecord),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::StorageBucket => "storage_bucket",
            ResourceKind::BucketPolicy => "bucket_policy",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Distribution => "distribution",
            ResourceKind::DnsRecord => "dns_record",
        }
    }

    pub fn schema(&self) -> &'static [AttrSchema] {
        match self {
            ResourceKind::StorageBucket => STORAGE_BUCKET,
            ResourceKind::BucketPolicy => BUCKET_POLICY,
            ResourceKind::Certificate => CERTIFICATE,
            ResourceKind::Distribution => DISTRIBUTION,
            ResourceKind::DnsRecord => DNS_RECORD,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&'static AttrSchema> {
        self.schema().iter().find(|a| a.name == name)
    }

    /// Output names other resources may reference.
    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::StorageBucket => &["id", "endpoint"],
            ResourceKind::BucketPolicy => &["id"],
            ResourceKind::Certificate => &["id"],
            ResourceKind::Distribution => &["id", "domain_name"],
            ResourceKind::DnsRecord => &["id", "fqdn"],
        }
    }

    /// Whether readiness depends on an externally-asynchronous condition
    /// (certificate issuance awaits domain-ownership validation).
    pub fn awaits_condition(&self) -> bool {
        matches!(self, ResourceKind::Certificate)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_resolves_from_address() {
        let addr = Address::parse("certificate.site").unwrap();
        assert_eq!(
            ResourceKind::from_address(&addr),
            Some(ResourceKind::Certificate)
        );

        let addr = Address::parse("queue.jobs").unwrap();
        assert_eq!(ResourceKind::from_address(&addr), None);
    }

    #[test]
    fn identity_attributes_force_replacement() {
        let schema = ResourceKind::StorageBucket.attr("name").unwrap();
        assert!(schema.forces_replacement);

        let schema = ResourceKind::Distribution.attr("origin").unwrap();
        assert!(!schema.forces_replacement);
    }

    #[test]
    fn only_certificates_await_a_condition() {
        assert!(ResourceKind::Certificate.awaits_condition());
        assert!(!ResourceKind::Distribution.awaits_condition());
        assert!(!ResourceKind::StorageBucket.awaits_condition());
    }

    #[test]
    fn every_kind_exports_id() {
        for kind in [
            ResourceKind::StorageBucket,
            ResourceKind::BucketPolicy,
            ResourceKind::Certificate,
            ResourceKind::Distribution,
            ResourceKind::DnsRecord,
        ] {
            assert!(kind.outputs().contains(&"id"));
        }
    }
}
