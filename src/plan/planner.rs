// ABOUTME: Diffs desired descriptors against stored state into a change-set.
// ABOUTME: Changes follow topological order; destroys run in reverse.

use crate::graph::DependencyGraph;
use crate::resource::ResourceDescriptor;
use crate::state::{ResourceStatus, StateRecord};
use crate::types::Address;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::change::{ChangeAction, ChangeSetEntry, Plan};

/// Compute the ordered change-set for one apply.
///
/// Create/update/replace entries follow the graph's topological order;
/// entries for resources that vanished from the document are appended
/// in reverse dependency order, reconstructed from the dependency sets
/// recorded in state.
pub fn plan(
    descriptors: &[ResourceDescriptor],
    graph: &DependencyGraph,
    state: &BTreeMap<Address, StateRecord>,
) -> Plan {
    let by_address: HashMap<&Address, &ResourceDescriptor> =
        descriptors.iter().map(|d| (&d.address, d)).collect();

    let mut entries = Vec::new();

    for address in graph.topo_order() {
        let descriptor = by_address[&address];
        let (action, reason) = decide(descriptor, state.get(&address));
        entries.push(ChangeSetEntry {
            address,
            action,
            reason,
            create_before_destroy: descriptor.lifecycle.create_before_destroy,
        });
    }

    for address in destroy_order(descriptors, state) {
        entries.push(ChangeSetEntry {
            address,
            action: ChangeAction::Destroy,
            reason: "removed from configuration".to_string(),
            create_before_destroy: false,
        });
    }

    Plan { entries }
}

fn decide(
    descriptor: &ResourceDescriptor,
    record: Option<&StateRecord>,
) -> (ChangeAction, String) {
    let Some(record) = record else {
        return (ChangeAction::Create, "not yet provisioned".to_string());
    };

    match record.status {
        ResourceStatus::Absent => {
            return (ChangeAction::Create, "not yet provisioned".to_string());
        }
        ResourceStatus::Creating => {
            // A crash or cancellation interrupted the previous create.
            // With no recorded id there is nothing to clean up; with one,
            // the half-created object must go.
            return if record.provider_id.is_none() {
                (
                    ChangeAction::Create,
                    "previous create never completed".to_string(),
                )
            } else {
                (
                    ChangeAction::Replace,
                    "previous create was interrupted".to_string(),
                )
            };
        }
        ResourceStatus::Destroying => {
            return (
                ChangeAction::Replace,
                "previous destroy was interrupted".to_string(),
            );
        }
        ResourceStatus::Tainted => {
            return (ChangeAction::Replace, "resource is tainted".to_string());
        }
        ResourceStatus::Ready => {}
    }

    let changed = changed_attributes(&descriptor.attributes, &record.last_applied);
    if changed.is_empty() {
        return (ChangeAction::Noop, "matches recorded state".to_string());
    }

    for name in &changed {
        if let Some(schema) = descriptor.kind.attr(name)
            && schema.forces_replacement
        {
            return (
                ChangeAction::Replace,
                format!("change to `{name}` forces replacement"),
            );
        }
    }

    (
        ChangeAction::Update,
        format!("attributes changed: {}", changed.join(", ")),
    )
}

fn changed_attributes(
    desired: &BTreeMap<String, crate::types::Value>,
    recorded: &BTreeMap<String, crate::types::Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (name, value) in desired {
        if recorded.get(name) != Some(value) {
            changed.push(name.clone());
        }
    }
    for name in recorded.keys() {
        if !desired.contains_key(name) {
            changed.push(name.clone());
        }
    }

    changed.sort();
    changed.dedup();
    changed
}

/// Reverse dependency order over the resources present in state but no
/// longer described: a resource is destroyed only after everything
/// recorded as depending on it.
fn destroy_order(
    descriptors: &[ResourceDescriptor],
    state: &BTreeMap<Address, StateRecord>,
) -> Vec<Address> {
    let desired: BTreeSet<&Address> = descriptors.iter().map(|d| &d.address).collect();
    let doomed: BTreeSet<&Address> = state
        .keys()
        .filter(|address| !desired.contains(*address))
        .collect();

    if doomed.is_empty() {
        return Vec::new();
    }

    // Kahn over the doomed subset using recorded edges, then reversed.
    let nodes: Vec<&Address> = doomed.iter().copied().collect();
    let index: HashMap<&Address, usize> = nodes.iter().enumerate().map(|(i, a)| (*a, i)).collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut remaining: Vec<usize> = vec![0; nodes.len()];
    for (i, address) in nodes.iter().enumerate() {
        for dep in &state[*address].depends_on {
            if let Some(&j) = index.get(dep) {
                dependents[j].push(i);
                remaining[i] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = remaining
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(&next) = ready.iter().next() {
        ready.remove(&next);
        order.push(nodes[next].clone());
        for &dependent in &dependents[next] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    order.reverse();

    // Stale cyclic leftovers in state cannot be ordered; destroy them in
    // address order after the well-ordered portion.
    for (i, address) in nodes.iter().enumerate() {
        if remaining[i] > 0 {
            order.push((*address).clone());
        }
    }

    order
}
