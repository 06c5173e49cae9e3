// ABOUTME: Executor: schedules the change-set over the dependency graph.
// ABOUTME: Bounded workers, failure isolation, write-ahead state commits.

use crate::graph::DependencyGraph;
use crate::plan::{ChangeAction, ChangeSetEntry, Plan};
use crate::provider::{Attributes, Provider};
use crate::resource::{reference, ResolveError, ResourceDescriptor, ResourceKind};
use crate::state::{ResourceStatus, StateRecord, Transaction};
use crate::types::{Address, ProviderId, Value};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::cancel::CancelToken;
use super::error::NodeError;
use super::retry::{with_retries, RetryError, RetryPolicy};
use super::waiter::{wait_for_condition, WaitError, WaiterConfig};

/// Final disposition of one address after an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Replaced,
    Destroyed,
    Noop,
    Failed(String),
    /// Never attempted because something it depends on failed.
    Blocked,
    /// Never attempted because the apply was cancelled.
    Skipped,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Replaced => "replaced",
            Outcome::Destroyed => "destroyed",
            Outcome::Noop => "unchanged",
            Outcome::Failed(_) => "failed",
            Outcome::Blocked => "blocked",
            Outcome::Skipped => "skipped",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Outcome::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::Created
                | Outcome::Updated
                | Outcome::Replaced
                | Outcome::Destroyed
                | Outcome::Noop
        )
    }
}

/// Per-address outcomes for one apply, in plan order.
#[derive(Debug)]
pub struct ApplyReport {
    pub outcomes: Vec<(Address, Outcome)>,
}

impl ApplyReport {
    pub fn outcome(&self, address: &Address) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, o)| o)
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_success())
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Failed(_)))
            .count()
    }

    pub fn blocked_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Blocked | Outcome::Skipped))
            .count()
    }
}

#[derive(Debug, Clone)]
enum NodeState {
    Pending,
    Running,
    Done(Outcome),
}

/// Applies a change-set against the provider.
pub struct Executor {
    provider: Arc<dyn Provider>,
    concurrency: usize,
    retry: RetryPolicy,
    waiter: WaiterConfig,
}

impl Executor {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            concurrency: 4,
            retry: RetryPolicy::default(),
            waiter: WaiterConfig::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_waiter_config(mut self, waiter: WaiterConfig) -> Self {
        self.waiter = waiter;
        self
    }

    /// Apply the change-set.
    ///
    /// A node starts only after every scheduling dependency reached its
    /// target status; for an edge `A depends_on B`, B is committed to
    /// state before A begins. Independent branches run concurrently up
    /// to the concurrency limit. A failed node blocks its transitive
    /// dependents while unrelated branches continue.
    pub async fn apply(
        &self,
        plan: &Plan,
        graph: &DependencyGraph,
        descriptors: &[ResourceDescriptor],
        txn: Arc<Transaction>,
        cancel: CancelToken,
    ) -> ApplyReport {
        let descriptors: HashMap<Address, ResourceDescriptor> = descriptors
            .iter()
            .map(|d| (d.address.clone(), d.clone()))
            .collect();
        let snapshot = txn.snapshot();

        let active: Vec<&ChangeSetEntry> = plan
            .entries
            .iter()
            .filter(|e| e.action != ChangeAction::Noop)
            .collect();
        let active_set: HashSet<&Address> = active.iter().map(|e| &e.address).collect();
        let destroy_set: HashSet<&Address> = active
            .iter()
            .filter(|e| e.action == ChangeAction::Destroy)
            .map(|e| &e.address)
            .collect();

        // Scheduling edges. Create/update/replace nodes wait on their
        // graph dependencies; destroy nodes wait on recorded dependents
        // also being destroyed (reverse order).
        let mut pending: HashMap<Address, usize> = HashMap::new();
        let mut dependents: HashMap<Address, Vec<Address>> = HashMap::new();
        for entry in &active {
            let address = &entry.address;
            let mut node_deps: HashSet<Address> = HashSet::new();

            if entry.action == ChangeAction::Destroy {
                for (other, record) in &snapshot {
                    if destroy_set.contains(other) && record.depends_on.contains(address) {
                        node_deps.insert(other.clone());
                    }
                }
            } else {
                for dep in graph.dependencies_of(address) {
                    if active_set.contains(dep) {
                        node_deps.insert(dep.clone());
                    }
                }
            }

            for dep in &node_deps {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(address.clone());
            }
            pending.insert(address.clone(), node_deps.len());
        }

        let actions: HashMap<Address, ChangeAction> = active
            .iter()
            .map(|e| (e.address.clone(), e.action))
            .collect();
        let entries: HashMap<Address, ChangeSetEntry> = active
            .iter()
            .map(|e| (e.address.clone(), (*e).clone()))
            .collect();

        let mut statuses: HashMap<Address, NodeState> = active
            .iter()
            .map(|e| (e.address.clone(), NodeState::Pending))
            .collect();
        let mut ready: VecDeque<Address> = active
            .iter()
            .filter(|e| pending[&e.address] == 0)
            .map(|e| e.address.clone())
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let deposed: Arc<Mutex<Vec<(Address, ResourceKind, ProviderId)>>> = Arc::default();
        let mut join: JoinSet<(Address, Result<(), NodeError>)> = JoinSet::new();

        loop {
            while let Some(address) = ready.pop_front() {
                if cancel.is_cancelled() {
                    // Leave the node pending; it reports as skipped.
                    break;
                }
                statuses.insert(address.clone(), NodeState::Running);
                self.spawn_node(
                    &mut join,
                    entries[&address].clone(),
                    descriptors.get(&address).cloned(),
                    txn.get(&address),
                    Arc::clone(&txn),
                    Arc::clone(&semaphore),
                    Arc::clone(&deposed),
                    cancel.clone(),
                );
            }

            let Some(joined) = join.join_next().await else {
                break;
            };
            let (address, node_result) = match joined {
                Ok(completed) => completed,
                Err(e) => {
                    tracing::error!("worker task aborted: {e}");
                    continue;
                }
            };

            let outcome = match node_result {
                Ok(()) => success_outcome(actions[&address]),
                Err(NodeError::Cancelled) => Outcome::Skipped,
                Err(e) => {
                    tracing::error!("apply of `{address}` failed: {e}");
                    Outcome::Failed(e.to_string())
                }
            };

            let failed = matches!(outcome, Outcome::Failed(_));
            let succeeded = outcome.is_success();
            statuses.insert(address.clone(), NodeState::Done(outcome));

            if failed {
                block_dependents(&address, &dependents, &mut statuses);
            } else if succeeded {
                for dependent in dependents.get(&address).cloned().unwrap_or_default() {
                    if let Some(NodeState::Pending) = statuses.get(&dependent) {
                        let remaining = pending
                            .get_mut(&dependent)
                            .expect("pending entry exists for every active node");
                        *remaining -= 1;
                        if *remaining == 0 {
                            ready.push_back(dependent);
                        }
                    }
                }
            }
        }

        // Nodes never reached: blocked by failures, or skipped on cancel.
        for state in statuses.values_mut() {
            match state {
                NodeState::Pending => {
                    *state = NodeState::Done(if cancel.is_cancelled() {
                        Outcome::Skipped
                    } else {
                        Outcome::Blocked
                    });
                }
                NodeState::Running => {
                    *state = NodeState::Done(Outcome::Failed("worker task aborted".to_string()));
                }
                NodeState::Done(_) => {}
            }
        }

        self.destroy_deposed(&txn, &deposed, &cancel).await;

        let outcomes = plan
            .entries
            .iter()
            .map(|entry| {
                let outcome = match statuses.get(&entry.address) {
                    Some(NodeState::Done(outcome)) => outcome.clone(),
                    _ => Outcome::Noop,
                };
                (entry.address.clone(), outcome)
            })
            .collect();

        ApplyReport { outcomes }
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_node(
        &self,
        join: &mut JoinSet<(Address, Result<(), NodeError>)>,
        entry: ChangeSetEntry,
        descriptor: Option<ResourceDescriptor>,
        record: Option<StateRecord>,
        txn: Arc<Transaction>,
        semaphore: Arc<Semaphore>,
        deposed: Arc<Mutex<Vec<(Address, ResourceKind, ProviderId)>>>,
        cancel: CancelToken,
    ) {
        let provider = Arc::clone(&self.provider);
        let retry = self.retry;
        let waiter = self.waiter;

        join.spawn(async move {
            let address = entry.address.clone();
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (address, Err(NodeError::Cancelled)),
            };

            let result = run_node(
                provider.as_ref(),
                &txn,
                &entry,
                descriptor.as_ref(),
                record,
                &retry,
                &waiter,
                &cancel,
                &deposed,
            )
            .await;

            (address, result)
        });
    }

    /// After every node settled, destroy originals deposed by
    /// create-before-destroy replacements. Dependents have re-pointed
    /// by now, so removal cannot interrupt service.
    async fn destroy_deposed(
        &self,
        txn: &Transaction,
        deposed: &Mutex<Vec<(Address, ResourceKind, ProviderId)>>,
        cancel: &CancelToken,
    ) {
        let deposed_list = std::mem::take(&mut *deposed.lock());
        for (address, kind, id) in deposed_list {
            if cancel.is_cancelled() {
                break;
            }
            match delete_tolerant(self.provider.as_ref(), kind, &id, &self.retry, cancel).await {
                Ok(()) => {
                    if let Some(record) = txn.get(&address)
                        && record.deposed.as_ref() == Some(&id)
                        && let Err(e) = txn.commit(record.with_deposed(None))
                    {
                        tracing::warn!("failed to clear deposed id for `{address}`: {e}");
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to destroy deposed {kind} {id} for `{address}`: {e}");
                }
            }
        }
    }
}

fn success_outcome(action: ChangeAction) -> Outcome {
    match action {
        ChangeAction::Create => Outcome::Created,
        ChangeAction::Update => Outcome::Updated,
        ChangeAction::Replace => Outcome::Replaced,
        ChangeAction::Destroy => Outcome::Destroyed,
        ChangeAction::Noop => Outcome::Noop,
    }
}

fn block_dependents(
    failed: &Address,
    dependents: &HashMap<Address, Vec<Address>>,
    statuses: &mut HashMap<Address, NodeState>,
) {
    let mut queue: VecDeque<Address> =
        dependents.get(failed).cloned().unwrap_or_default().into();
    while let Some(address) = queue.pop_front() {
        if let Some(state @ NodeState::Pending) = statuses.get_mut(&address) {
            *state = NodeState::Done(Outcome::Blocked);
            queue.extend(dependents.get(&address).cloned().unwrap_or_default());
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_node(
    provider: &dyn Provider,
    txn: &Transaction,
    entry: &ChangeSetEntry,
    descriptor: Option<&ResourceDescriptor>,
    record: Option<StateRecord>,
    retry: &RetryPolicy,
    waiter: &WaiterConfig,
    cancel: &CancelToken,
    deposed: &Mutex<Vec<(Address, ResourceKind, ProviderId)>>,
) -> Result<(), NodeError> {
    if cancel.is_cancelled() {
        return Err(NodeError::Cancelled);
    }

    match entry.action {
        ChangeAction::Create => {
            let descriptor = descriptor.expect("create entries carry a descriptor");
            run_create(provider, txn, descriptor, retry, waiter, cancel).await
        }
        ChangeAction::Update => {
            let descriptor = descriptor.expect("update entries carry a descriptor");
            let record = record.expect("update entries have a state record");
            run_update(provider, txn, descriptor, record, retry, cancel).await
        }
        ChangeAction::Replace => {
            let descriptor = descriptor.expect("replace entries carry a descriptor");
            let record = record.expect("replace entries have a state record");
            run_replace(
                provider, txn, descriptor, record, retry, waiter, cancel, deposed,
            )
            .await
        }
        ChangeAction::Destroy => {
            let record = record.expect("destroy entries have a state record");
            run_destroy(provider, txn, record, retry, cancel).await
        }
        ChangeAction::Noop => Ok(()),
    }
}

/// Substitute every reference in the descriptor's attributes from the
/// outputs committed by its dependencies.
fn resolve_attributes(
    descriptor: &ResourceDescriptor,
    txn: &Transaction,
) -> Result<Attributes, NodeError> {
    let lookup = |address: &Address, output: &str| -> Result<Option<Value>, ResolveError> {
        let record = txn.get(address).ok_or_else(|| ResolveError::NotReady {
            address: address.clone(),
        })?;
        if !record.is_ready() {
            return Err(ResolveError::NotReady {
                address: address.clone(),
            });
        }
        Ok(record.outputs.get(output).cloned())
    };

    let mut resolved = Attributes::new();
    for (name, value) in &descriptor.attributes {
        let value =
            reference::interpolate_value(value, &lookup).map_err(|source| NodeError::Resolve {
                attribute: name.clone(),
                source,
            })?;
        resolved.insert(name.clone(), value);
    }
    Ok(resolved)
}

async fn run_create(
    provider: &dyn Provider,
    txn: &Transaction,
    descriptor: &ResourceDescriptor,
    retry: &RetryPolicy,
    waiter: &WaiterConfig,
    cancel: &CancelToken,
) -> Result<(), NodeError> {
    let resolved = resolve_attributes(descriptor, txn)?;

    // Write-ahead: record the create before calling out, so a crash
    // leaves a `creating` record instead of an untracked resource.
    let record = StateRecord::creating(descriptor);
    txn.commit(record.clone())?;

    let response = with_retries(retry, cancel, || {
        provider.create(descriptor.kind, &resolved)
    })
    .await?;

    let id = response.id.clone();
    let record = record.with_provider_id(id.clone()).with_outputs(response.outputs);

    finalize_readiness(provider, txn, descriptor.kind, record, id, waiter, cancel).await
}

/// Commit `ready`, first driving the external readiness condition to
/// completion for kinds that await one.
async fn finalize_readiness(
    provider: &dyn Provider,
    txn: &Transaction,
    kind: ResourceKind,
    record: StateRecord,
    id: ProviderId,
    waiter: &WaiterConfig,
    cancel: &CancelToken,
) -> Result<(), NodeError> {
    if !kind.awaits_condition() {
        txn.commit(record.with_status(ResourceStatus::Ready))?;
        return Ok(());
    }

    // Persist the id before waiting so an interrupted wait still knows
    // about the half-provisioned object.
    txn.commit(record.clone())?;

    match wait_for_condition(waiter, cancel, || provider.check_condition(kind, &id)).await {
        Ok(()) => {
            txn.commit(record.with_status(ResourceStatus::Ready))?;
            Ok(())
        }
        // Never fabricate readiness: the record keeps the status the
        // last successful read observed.
        Err(WaitError::Cancelled) => Err(NodeError::Cancelled),
        Err(e) => {
            txn.commit(record.with_status(ResourceStatus::Tainted))?;
            Err(e.into())
        }
    }
}

async fn run_update(
    provider: &dyn Provider,
    txn: &Transaction,
    descriptor: &ResourceDescriptor,
    record: StateRecord,
    retry: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<(), NodeError> {
    let resolved = resolve_attributes(descriptor, txn)?;
    let id = record
        .provider_id
        .clone()
        .ok_or_else(|| NodeError::MissingProviderId(record.address.clone()))?;

    let outputs = with_retries(retry, cancel, || {
        provider.update(descriptor.kind, &id, &resolved)
    })
    .await?;

    txn.commit(StateRecord {
        last_applied: descriptor.attributes.clone(),
        depends_on: descriptor.dependency_addresses(),
        outputs,
        status: ResourceStatus::Ready,
        updated_at: Utc::now(),
        ..record
    })?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_replace(
    provider: &dyn Provider,
    txn: &Transaction,
    descriptor: &ResourceDescriptor,
    record: StateRecord,
    retry: &RetryPolicy,
    waiter: &WaiterConfig,
    cancel: &CancelToken,
    deposed: &Mutex<Vec<(Address, ResourceKind, ProviderId)>>,
) -> Result<(), NodeError> {
    // Leftover from an earlier interrupted replacement.
    if let Some(leftover) = &record.deposed {
        delete_tolerant(provider, record.kind, leftover, retry, cancel).await?;
    }

    let old_id = record.provider_id.clone();

    if descriptor.lifecycle.create_before_destroy && old_id.is_some() {
        let resolved = resolve_attributes(descriptor, txn)?;

        // Write-ahead: flag the replacement on the still-current record
        // so an interrupted create is replanned as a replace.
        txn.commit(record.clone().with_status(ResourceStatus::Creating))?;

        let response = with_retries(retry, cancel, || {
            provider.create(descriptor.kind, &resolved)
        })
        .await?;

        let id = response.id.clone();
        let new_record = StateRecord::creating(descriptor)
            .with_provider_id(id.clone())
            .with_outputs(response.outputs)
            .with_deposed(old_id.clone());

        finalize_readiness(provider, txn, descriptor.kind, new_record, id, waiter, cancel)
            .await?;

        // The original is destroyed only after every node settled, once
        // dependents have re-pointed at the successor.
        if let Some(old) = old_id {
            deposed
                .lock()
                .push((descriptor.address.clone(), descriptor.kind, old));
        }
        return Ok(());
    }

    // Destroy-first replacement.
    if let Some(old) = &old_id {
        txn.commit(record.clone().with_status(ResourceStatus::Destroying))?;
        delete_tolerant(provider, record.kind, old, retry, cancel).await?;
    }
    run_create(provider, txn, descriptor, retry, waiter, cancel).await
}

async fn run_destroy(
    provider: &dyn Provider,
    txn: &Transaction,
    record: StateRecord,
    retry: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<(), NodeError> {
    // Write-ahead: mark the destroy before calling out.
    txn.commit(record.clone().with_status(ResourceStatus::Destroying))?;

    if let Some(id) = &record.provider_id {
        delete_tolerant(provider, record.kind, id, retry, cancel).await?;
    }
    if let Some(leftover) = &record.deposed {
        delete_tolerant(provider, record.kind, leftover, retry, cancel).await?;
    }

    txn.remove(&record.address)?;
    Ok(())
}

/// Delete, treating "already gone" as success; convergence is the goal.
async fn delete_tolerant(
    provider: &dyn Provider,
    kind: ResourceKind,
    id: &ProviderId,
    retry: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<(), NodeError> {
    match with_retries(retry, cancel, || provider.delete(kind, id)).await {
        Ok(()) => Ok(()),
        Err(RetryError::Provider(e)) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
