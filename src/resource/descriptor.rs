// ABOUTME: Parsed resource descriptors and lifecycle flags.
// ABOUTME: Descriptors are immutable once produced by the parse pass.

use crate::types::{Address, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::kind::ResourceKind;
use super::reference::Reference;

/// Lifecycle policy attached to a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// When a change forces replacement, create the successor before
    /// destroying the original so dependents never point at nothing.
    #[serde(default)]
    pub create_before_destroy: bool,
}

/// A validated description of one desired resource.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub address: Address,
    pub kind: ResourceKind,
    pub attributes: BTreeMap<String, Value>,
    /// Explicit ordering hints from the document.
    pub depends_on: BTreeSet<Address>,
    /// Edges derived from attribute references during parsing.
    pub references: Vec<Reference>,
    pub lifecycle: Lifecycle,
}

impl ResourceDescriptor {
    /// All addresses this resource depends on: explicit entries plus
    /// reference targets, deduplicated.
    pub fn dependency_addresses(&self) -> BTreeSet<Address> {
        let mut deps = self.depends_on.clone();
        for reference in &self.references {
            deps.insert(reference.to.clone());
        }
        deps
    }
}
