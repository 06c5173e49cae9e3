// ABOUTME: Resource model: kinds, descriptors, references, and validation.
// ABOUTME: Turns raw document entries into immutable ResourceDescriptors.

mod descriptor;
mod error;
mod kind;
pub mod reference;

pub use descriptor::{Lifecycle, ResourceDescriptor};
pub use error::ParseError;
pub use kind::{AttrSchema, AttrType, ResourceKind};
pub use reference::{RawReference, Reference, ResolveError};

use crate::types::{Address, Value};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// One resource entry as written in the desired-state document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResource {
    pub address: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub lifecycle: Lifecycle,
}

/// Validate raw entries into descriptors.
///
/// Checks address syntax and kind, duplicate addresses, schema conformance
/// (attribute names, types, required attributes), and that every explicit
/// dependency and attribute reference targets a declared resource and an
/// output that resource actually exports.
pub fn parse(raw: &[RawResource]) -> Result<Vec<ResourceDescriptor>, ParseError> {
    // First pass: addresses and kinds, so references can be checked
    // against the full document regardless of declaration order.
    let mut kinds: BTreeMap<Address, ResourceKind> = BTreeMap::new();
    for entry in raw {
        let address =
            Address::parse(&entry.address).map_err(|source| ParseError::InvalidAddress {
                address: entry.address.clone(),
                source,
            })?;
        let kind =
            ResourceKind::from_address(&address).ok_or(ParseError::UnknownKind(address.clone()))?;
        if kinds.insert(address.clone(), kind).is_some() {
            return Err(ParseError::DuplicateAddress(address));
        }
    }

    let mut descriptors = Vec::with_capacity(raw.len());
    for entry in raw {
        let address = Address::parse(&entry.address).expect("validated in first pass");
        let kind = kinds[&address];

        validate_attributes(&address, kind, &entry.attributes)?;

        let mut depends_on = BTreeSet::new();
        for target in &entry.depends_on {
            let dep = Address::parse(target).map_err(|source| ParseError::InvalidAddress {
                address: target.clone(),
                source,
            })?;
            if !kinds.contains_key(&dep) {
                return Err(ParseError::UnknownReference {
                    from: address.clone(),
                    target: target.clone(),
                });
            }
            depends_on.insert(dep);
        }

        let references = collect_references(&address, &entry.attributes, &kinds)?;

        descriptors.push(ResourceDescriptor {
            address,
            kind,
            attributes: entry.attributes.clone(),
            depends_on,
            references,
            lifecycle: entry.lifecycle,
        });
    }

    Ok(descriptors)
}

fn validate_attributes(
    address: &Address,
    kind: ResourceKind,
    attributes: &BTreeMap<String, Value>,
) -> Result<(), ParseError> {
    for (name, value) in attributes {
        let schema = kind
            .attr(name)
            .ok_or_else(|| ParseError::SchemaViolation {
                address: address.clone(),
                detail: format!("unknown attribute `{name}` for kind `{kind}`"),
            })?;
        if !schema.ty.matches(value) {
            return Err(ParseError::SchemaViolation {
                address: address.clone(),
                detail: format!(
                    "attribute `{name}` expects {}, found {}",
                    schema.ty.name(),
                    value.type_name()
                ),
            });
        }
    }

    for schema in kind.schema() {
        if schema.required && !attributes.contains_key(schema.name) {
            return Err(ParseError::SchemaViolation {
                address: address.clone(),
                detail: format!("missing required attribute `{}`", schema.name),
            });
        }
    }

    Ok(())
}

fn collect_references(
    address: &Address,
    attributes: &BTreeMap<String, Value>,
    kinds: &BTreeMap<Address, ResourceKind>,
) -> Result<Vec<Reference>, ParseError> {
    let mut references = Vec::new();

    for (name, value) in attributes {
        let raw_refs =
            reference::scan_value(value).map_err(|e| ParseError::InvalidReference {
                address: address.clone(),
                detail: e.to_string(),
            })?;

        for raw in raw_refs {
            let target_kind =
                kinds
                    .get(&raw.to)
                    .copied()
                    .ok_or_else(|| ParseError::UnknownReference {
                        from: address.clone(),
                        target: raw.to.to_string(),
                    })?;
            if !target_kind.outputs().contains(&raw.output.as_str()) {
                return Err(ParseError::UnknownOutput {
                    from: address.clone(),
                    to: raw.to.clone(),
                    output: raw.output.clone(),
                });
            }
            references.push(Reference {
                from: address.clone(),
                to: raw.to,
                output: raw.output,
                attribute: name.clone(),
            });
        }
    }

    Ok(references)
}
