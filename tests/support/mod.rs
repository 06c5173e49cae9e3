// ABOUTME: Shared fixtures for integration tests.
// ABOUTME: Builders for raw resources, descriptors, and graphs.

#![allow(dead_code)]

use std::collections::BTreeMap;
use stratus::graph::DependencyGraph;
use stratus::resource::{self, Lifecycle, RawResource, ResourceDescriptor};
use stratus::types::Value;

pub fn raw(address: &str, attrs: &[(&str, Value)]) -> RawResource {
    RawResource {
        address: address.to_string(),
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<BTreeMap<String, Value>>(),
        depends_on: Vec::new(),
        lifecycle: Lifecycle::default(),
    }
}

pub fn with_deps(mut entry: RawResource, deps: &[&str]) -> RawResource {
    entry.depends_on = deps.iter().map(|s| s.to_string()).collect();
    entry
}

pub fn with_cbd(mut entry: RawResource) -> RawResource {
    entry.lifecycle.create_before_destroy = true;
    entry
}

/// `storage_bucket.<name>` with a derived bucket name.
pub fn bucket(name: &str) -> RawResource {
    raw(
        &format!("storage_bucket.{name}"),
        &[
            ("name", format!("{name}-content").into()),
            ("region", "eu-west-1".into()),
        ],
    )
}

/// `bucket_policy.<name>` referencing `storage_bucket.<name>`.
pub fn policy(name: &str) -> RawResource {
    raw(
        &format!("bucket_policy.{name}"),
        &[
            ("bucket", format!("${{storage_bucket.{name}.id}}").into()),
            ("public_read", true.into()),
        ],
    )
}

/// `certificate.<name>` for example.com.
pub fn certificate(name: &str) -> RawResource {
    raw(
        &format!("certificate.{name}"),
        &[
            ("domain", "example.com".into()),
            ("validation_method", "dns".into()),
        ],
    )
}

/// `distribution.<name>` referencing a bucket endpoint and a certificate.
pub fn distribution(name: &str, bucket_name: &str, cert_name: &str) -> RawResource {
    raw(
        &format!("distribution.{name}"),
        &[
            (
                "origin",
                format!("${{storage_bucket.{bucket_name}.endpoint}}").into(),
            ),
            (
                "certificate",
                format!("${{certificate.{cert_name}.id}}").into(),
            ),
        ],
    )
}

/// `dns_record.<name>` pointing at a distribution's domain name.
pub fn dns_record(name: &str, distribution_name: &str) -> RawResource {
    raw(
        &format!("dns_record.{name}"),
        &[
            ("zone", "example.com".into()),
            ("name", name.into()),
            ("record_type", "CNAME".into()),
            (
                "value",
                format!("${{distribution.{distribution_name}.domain_name}}").into(),
            ),
            ("ttl", Value::Int(300)),
        ],
    )
}

/// Parse and build, panicking on invalid fixtures.
pub fn build(entries: &[RawResource]) -> (Vec<ResourceDescriptor>, DependencyGraph) {
    let descriptors = resource::parse(entries).expect("fixture document is valid");
    let graph = DependencyGraph::build(&descriptors).expect("fixture graph is acyclic");
    (descriptors, graph)
}
