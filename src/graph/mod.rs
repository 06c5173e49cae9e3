// ABOUTME: Dependency graph construction, cycle detection, topological order.
// ABOUTME: Edges come from explicit depends_on entries and attribute references.

use crate::resource::ResourceDescriptor;
use crate::types::Address;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// The desired-state dependency graph for one apply.
///
/// Nodes are stored sorted by address, so index order doubles as the
/// deterministic tie-break order for traversals.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Address>,
    index: HashMap<Address, usize>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

/// The dependency graph contains a cycle; provisioning cannot be ordered.
#[derive(Debug, Clone, Error)]
#[error("{}", self.describe())]
pub struct CycleError {
    pub involved: Vec<Address>,
}

impl CycleError {
    fn describe(&self) -> String {
        let mut path: Vec<&str> = self.involved.iter().map(Address::as_str).collect();
        if let Some(first) = path.first().copied() {
            path.push(first);
        }
        format!("dependency cycle: {}", path.join(" -> "))
    }
}

impl DependencyGraph {
    /// Build the graph and verify it is acyclic.
    pub fn build(descriptors: &[ResourceDescriptor]) -> Result<Self, CycleError> {
        let mut nodes: Vec<Address> = descriptors.iter().map(|d| d.address.clone()).collect();
        nodes.sort();

        let index: HashMap<Address, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();

        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

        for descriptor in descriptors {
            let from = index[&descriptor.address];
            let targets: BTreeSet<Address> = descriptor.dependency_addresses();
            for target in targets {
                let to = index[&target];
                deps[from].push(to);
                dependents[to].push(from);
            }
        }

        let graph = Self {
            nodes,
            index,
            deps,
            dependents,
        };

        if let Some(cycle) = graph.find_cycle() {
            return Err(CycleError {
                involved: cycle.into_iter().map(|i| graph.nodes[i].clone()).collect(),
            });
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.index.contains_key(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.nodes.iter()
    }

    /// Addresses this node depends on.
    pub fn dependencies_of(&self, address: &Address) -> Vec<&Address> {
        self.index
            .get(address)
            .map(|&i| self.deps[i].iter().map(|&j| &self.nodes[j]).collect())
            .unwrap_or_default()
    }

    /// Addresses depending on this node.
    pub fn dependents_of(&self, address: &Address) -> Vec<&Address> {
        self.index
            .get(address)
            .map(|&i| self.dependents[i].iter().map(|&j| &self.nodes[j]).collect())
            .unwrap_or_default()
    }

    /// Topological order: every node appears after all of its
    /// dependencies. Ties are broken by address order.
    pub fn topo_order(&self) -> Vec<Address> {
        let mut remaining: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(&next) = ready.iter().next() {
            ready.remove(&next);
            order.push(self.nodes[next].clone());
            for &dependent in &self.dependents[next] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        debug_assert_eq!(order.len(), self.nodes.len(), "graph must be acyclic");
        order
    }

    /// Depth-first search with an explicit recursion stack; a grey node
    /// reached again closes a cycle.
    fn find_cycle(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Finished,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut path: Vec<usize> = Vec::new();

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            let mut frames: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::InProgress;
            path.push(start);

            while let Some(frame) = frames.last_mut() {
                let (node, cursor) = (frame.0, frame.1);
                if cursor < self.deps[node].len() {
                    frame.1 += 1;
                    let next = self.deps[node][cursor];
                    match marks[next] {
                        Mark::Unvisited => {
                            marks[next] = Mark::InProgress;
                            path.push(next);
                            frames.push((next, 0));
                        }
                        Mark::InProgress => {
                            let from = path
                                .iter()
                                .position(|&n| n == next)
                                .expect("in-progress node is on the path");
                            return Some(path[from..].to_vec());
                        }
                        Mark::Finished => {}
                    }
                } else {
                    marks[node] = Mark::Finished;
                    frames.pop();
                    path.pop();
                }
            }
        }

        None
    }
}
