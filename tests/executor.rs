// ABOUTME: Executor integration tests against the in-memory provider.
// ABOUTME: Ordering, failure isolation, retries, waits, replace, destroy.

mod support;

use std::sync::Arc;
use std::time::Duration;
use stratus::exec::{cancel_pair, ApplyReport, Executor, Outcome, RetryPolicy, WaiterConfig};
use stratus::plan::{self, ChangeAction};
use stratus::provider::{MemoryProvider, ResourceOps};
use stratus::resource::{RawResource, ResourceKind};
use stratus::state::{ResourceStatus, StateStore};
use stratus::types::{Address, Value};
use support::{build, bucket, certificate, distribution, policy, raw, with_cbd};

fn fast_executor(provider: Arc<MemoryProvider>) -> Executor {
    Executor::new(provider)
        .with_retry_policy(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        })
        .with_waiter_config(WaiterConfig {
            poll_interval: Duration::from_millis(2),
            timeout: Duration::from_millis(200),
        })
}

async fn apply_entries(
    provider: &Arc<MemoryProvider>,
    store: &StateStore,
    entries: &[RawResource],
) -> ApplyReport {
    let (descriptors, graph) = build(entries);
    let txn = Arc::new(store.begin("test", false).unwrap());
    let state = txn.snapshot();
    let the_plan = plan::plan(&descriptors, &graph, &state);

    let (_controller, token) = cancel_pair();
    fast_executor(Arc::clone(provider))
        .apply(&the_plan, &graph, &descriptors, txn, token)
        .await
}

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

#[tokio::test]
async fn storage_certificate_distribution_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::with_condition_latency(2));

    let entries = [
        bucket("site"),
        certificate("site"),
        distribution("cdn", "site", "site"),
    ];
    let report = apply_entries(&provider, &store, &entries).await;

    assert!(report.is_success());
    for (_, outcome) in &report.outcomes {
        assert_eq!(outcome, &Outcome::Created);
    }

    // The distribution's create must wait for the certificate's
    // validation condition to hold.
    let events = provider.events();
    let condition_held = events
        .iter()
        .position(|e| e.starts_with("check_condition") && e.ends_with("true"))
        .expect("condition eventually held");
    let distribution_created = events
        .iter()
        .position(|e| e.starts_with("create distribution"))
        .expect("distribution was created");
    assert!(condition_held < distribution_created);

    // Re-planning identical input yields all-noop.
    let (descriptors, graph) = build(&entries);
    let txn = store.begin("test", false).unwrap();
    let second = plan::plan(&descriptors, &graph, &txn.snapshot());
    assert!(!second.has_changes());
    assert!(second
        .entries
        .iter()
        .all(|e| e.action == ChangeAction::Noop));
}

#[tokio::test]
async fn references_resolve_from_committed_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::new());

    let report = apply_entries(&provider, &store, &[bucket("site"), policy("site")]).await;
    assert!(report.is_success());

    let state = store.load().unwrap();
    let bucket_record = &state[&addr("storage_bucket.site")];
    let bucket_id = bucket_record.provider_id.clone().unwrap();

    // The provider saw the policy's `bucket` attribute with the real
    // id substituted, not the symbolic reference.
    let policy_id = state[&addr("bucket_policy.site")]
        .provider_id
        .clone()
        .unwrap();
    let seen = provider
        .read(ResourceKind::BucketPolicy, &policy_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        seen.get("bucket"),
        Some(&Value::String(bucket_id.as_str().to_string()))
    );

    // State keeps the reference symbolic for future diffs.
    let recorded = state[&addr("bucket_policy.site")]
        .last_applied
        .get("bucket")
        .unwrap();
    assert_eq!(
        recorded,
        &Value::String("${storage_bucket.site.id}".to_string())
    );
}

#[tokio::test]
async fn failure_blocks_dependents_but_not_independent_branches() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::new());
    provider.fail_create(ResourceKind::StorageBucket, "name", "x-content");

    let entries = [bucket("x"), policy("x"), bucket("y"), policy("y")];
    let report = apply_entries(&provider, &store, &entries).await;

    assert!(!report.is_success());
    assert!(matches!(
        report.outcome(&addr("storage_bucket.x")).unwrap(),
        Outcome::Failed(_)
    ));
    assert_eq!(
        report.outcome(&addr("bucket_policy.x")).unwrap(),
        &Outcome::Blocked
    );
    assert_eq!(
        report.outcome(&addr("storage_bucket.y")).unwrap(),
        &Outcome::Created
    );
    assert_eq!(
        report.outcome(&addr("bucket_policy.y")).unwrap(),
        &Outcome::Created
    );

    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.blocked_count(), 1);

    // The failed node's write-ahead record survives for the next plan.
    let state = store.load().unwrap();
    assert_eq!(
        state[&addr("storage_bucket.x")].status,
        ResourceStatus::Creating
    );
    assert!(state[&addr("storage_bucket.y")].is_ready());
}

#[tokio::test]
async fn condition_timeout_taints_the_resource_and_blocks_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::with_condition_never_ready());

    let entries = [
        bucket("site"),
        certificate("site"),
        distribution("cdn", "site", "site"),
    ];
    let report = apply_entries(&provider, &store, &entries).await;

    assert!(matches!(
        report.outcome(&addr("certificate.site")).unwrap(),
        Outcome::Failed(message) if message.contains("condition")
    ));
    assert_eq!(
        report.outcome(&addr("distribution.cdn")).unwrap(),
        &Outcome::Blocked
    );
    assert_eq!(
        report.outcome(&addr("storage_bucket.site")).unwrap(),
        &Outcome::Created
    );

    // Tainted, never fabricated ready; the next plan replaces it.
    let state = store.load().unwrap();
    assert_eq!(
        state[&addr("certificate.site")].status,
        ResourceStatus::Tainted
    );

    let (descriptors, graph) = build(&entries);
    let next = plan::plan(&descriptors, &graph, &state);
    assert_eq!(
        next.entry(&addr("certificate.site")).unwrap().action,
        ChangeAction::Replace
    );
    assert_eq!(
        next.entry(&addr("distribution.cdn")).unwrap().action,
        ChangeAction::Create
    );
}

#[tokio::test]
async fn transient_failures_are_retried_to_success() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::new());
    provider.fail_create_transient(ResourceKind::StorageBucket, "name", "site-content", 2);

    let report = apply_entries(&provider, &store, &[bucket("site")]).await;
    assert!(report.is_success());

    let failures = provider
        .events()
        .iter()
        .filter(|e| e.ends_with("failed"))
        .count();
    assert_eq!(failures, 2);
    assert_eq!(provider.resource_count(), 1);
}

#[tokio::test]
async fn destroy_runs_in_reverse_dependency_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::new());

    let report = apply_entries(&provider, &store, &[bucket("site"), policy("site")]).await;
    assert!(report.is_success());

    let report = apply_entries(&provider, &store, &[]).await;
    assert!(report.is_success());
    assert_eq!(
        report.outcome(&addr("bucket_policy.site")).unwrap(),
        &Outcome::Destroyed
    );
    assert_eq!(
        report.outcome(&addr("storage_bucket.site")).unwrap(),
        &Outcome::Destroyed
    );

    let events = provider.events();
    let policy_deleted = events
        .iter()
        .position(|e| e.starts_with("delete bucket_policy"))
        .unwrap();
    let bucket_deleted = events
        .iter()
        .position(|e| e.starts_with("delete storage_bucket"))
        .unwrap();
    assert!(policy_deleted < bucket_deleted);

    assert_eq!(provider.resource_count(), 0);
    assert!(store.load().unwrap().is_empty());
}

#[tokio::test]
async fn create_before_destroy_replacement_keeps_the_original_until_ready() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::new());

    let report = apply_entries(&provider, &store, &[with_cbd(bucket("site"))]).await;
    assert!(report.is_success());
    let old_id = store.load().unwrap()[&addr("storage_bucket.site")]
        .provider_id
        .clone()
        .unwrap();

    // Changing the identity-defining attribute forces a replacement.
    let renamed = with_cbd(raw(
        "storage_bucket.site",
        &[
            ("name", "renamed-content".into()),
            ("region", "eu-west-1".into()),
        ],
    ));
    let report = apply_entries(&provider, &store, &[renamed]).await;
    assert_eq!(
        report.outcome(&addr("storage_bucket.site")).unwrap(),
        &Outcome::Replaced
    );

    let events = provider.events();
    let second_create = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.starts_with("create storage_bucket"))
        .map(|(i, _)| i)
        .nth(1)
        .expect("replacement was created");
    let old_deleted = events
        .iter()
        .position(|e| *e == format!("delete storage_bucket {old_id}"))
        .expect("original was destroyed");
    assert!(second_create < old_deleted);

    let state = store.load().unwrap();
    let record = &state[&addr("storage_bucket.site")];
    assert!(record.is_ready());
    assert_ne!(record.provider_id.as_ref().unwrap(), &old_id);
    assert!(record.deposed.is_none());
    assert_eq!(provider.resource_count(), 1);
}

#[tokio::test]
async fn cancelled_apply_schedules_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state"));
    let provider = Arc::new(MemoryProvider::new());

    let (descriptors, graph) = build(&[bucket("site"), policy("site")]);
    let txn = Arc::new(store.begin("test", false).unwrap());
    let the_plan = plan::plan(&descriptors, &graph, &txn.snapshot());

    let (controller, token) = cancel_pair();
    controller.cancel();

    let report = fast_executor(Arc::clone(&provider))
        .apply(&the_plan, &graph, &descriptors, txn, token)
        .await;

    for (_, outcome) in &report.outcomes {
        assert_eq!(outcome, &Outcome::Skipped);
    }
    assert_eq!(provider.resource_count(), 0);
}
