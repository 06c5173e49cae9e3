// ABOUTME: Planner tests: diff decisions, ordering, replace and destroy.
// ABOUTME: State fixtures are built directly from records.

mod support;

use std::collections::BTreeMap;
use stratus::plan::{self, ChangeAction, StepKind};
use stratus::resource::ResourceDescriptor;
use stratus::state::{ResourceStatus, StateRecord};
use stratus::types::{Address, ProviderId, Value};
use support::{build, bucket, certificate, distribution, policy, with_cbd, with_deps};

type State = BTreeMap<Address, StateRecord>;

fn ready_record(descriptor: &ResourceDescriptor, id: &str) -> StateRecord {
    StateRecord::creating(descriptor)
        .with_provider_id(ProviderId::new(id))
        .with_status(ResourceStatus::Ready)
}

fn ready_state(descriptors: &[ResourceDescriptor]) -> State {
    descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| {
            (
                d.address.clone(),
                ready_record(d, &format!("id-{i:04}")),
            )
        })
        .collect()
}

#[test]
fn first_plan_creates_everything_in_dependency_order() {
    let (descriptors, graph) = build(&[
        distribution("cdn", "site", "site"),
        certificate("site"),
        bucket("site"),
    ]);

    let plan = plan::plan(&descriptors, &graph, &State::new());
    assert!(plan
        .entries
        .iter()
        .all(|e| e.action == ChangeAction::Create));

    let positions: Vec<&str> = plan.entries.iter().map(|e| e.address.as_str()).collect();
    let cdn = positions.iter().position(|a| *a == "distribution.cdn").unwrap();
    let cert = positions.iter().position(|a| *a == "certificate.site").unwrap();
    let storage = positions
        .iter()
        .position(|a| *a == "storage_bucket.site")
        .unwrap();
    assert!(storage < cdn);
    assert!(cert < cdn);
}

#[test]
fn unchanged_desired_state_plans_all_noop() {
    let (descriptors, graph) = build(&[bucket("site"), policy("site")]);
    let state = ready_state(&descriptors);

    let plan = plan::plan(&descriptors, &graph, &state);
    assert!(!plan.has_changes());
    assert!(plan.entries.iter().all(|e| e.action == ChangeAction::Noop));
}

#[test]
fn in_place_attribute_change_plans_update() {
    let (descriptors, graph) = build(&[distribution("cdn", "site", "site"), bucket("site"), certificate("site")]);
    let mut state = ready_state(&descriptors);

    // Recorded origin differs from desired.
    let cdn = Address::parse("distribution.cdn").unwrap();
    let record = state.get_mut(&cdn).unwrap();
    record
        .last_applied
        .insert("origin".to_string(), Value::String("old-origin".to_string()));

    let plan = plan::plan(&descriptors, &graph, &state);
    let entry = plan.entry(&cdn).unwrap();
    assert_eq!(entry.action, ChangeAction::Update);
    assert!(entry.reason.contains("origin"));
}

#[test]
fn identity_attribute_change_plans_replace() {
    let (descriptors, graph) = build(&[bucket("site")]);
    let mut state = ready_state(&descriptors);

    let address = Address::parse("storage_bucket.site").unwrap();
    let record = state.get_mut(&address).unwrap();
    record
        .last_applied
        .insert("name".to_string(), Value::String("old-name".to_string()));

    let plan = plan::plan(&descriptors, &graph, &state);
    let entry = plan.entry(&address).unwrap();
    assert_eq!(entry.action, ChangeAction::Replace);
    assert!(entry.reason.contains("name"));
}

#[test]
fn tainted_resources_are_replaced() {
    let (descriptors, graph) = build(&[certificate("site")]);
    let mut state = ready_state(&descriptors);

    let address = Address::parse("certificate.site").unwrap();
    state.get_mut(&address).unwrap().status = ResourceStatus::Tainted;

    let plan = plan::plan(&descriptors, &graph, &state);
    assert_eq!(plan.entry(&address).unwrap().action, ChangeAction::Replace);
}

#[test]
fn interrupted_create_without_id_plans_create() {
    let (descriptors, graph) = build(&[certificate("site")]);
    let address = Address::parse("certificate.site").unwrap();

    let mut state = State::new();
    state.insert(address.clone(), StateRecord::creating(&descriptors[0]));

    let plan = plan::plan(&descriptors, &graph, &state);
    assert_eq!(plan.entry(&address).unwrap().action, ChangeAction::Create);
}

#[test]
fn removed_resources_destroy_in_reverse_dependency_order() {
    // Chain: c depends on b depends on a.
    let (recorded, _) = build(&[
        bucket("a"),
        with_deps(bucket("b"), &["storage_bucket.a"]),
        with_deps(bucket("c"), &["storage_bucket.b"]),
    ]);
    let state = ready_state(&recorded);

    // Everything removed from the document.
    let (descriptors, graph) = build(&[]);
    let plan = plan::plan(&descriptors, &graph, &state);

    let order: Vec<&str> = plan.entries.iter().map(|e| e.address.as_str()).collect();
    assert_eq!(
        order,
        vec!["storage_bucket.c", "storage_bucket.b", "storage_bucket.a"]
    );
    assert!(plan
        .entries
        .iter()
        .all(|e| e.action == ChangeAction::Destroy));
}

#[test]
fn surviving_resources_order_before_destroys() {
    let (recorded, _) = build(&[bucket("old"), bucket("kept")]);
    let state = ready_state(&recorded);

    let (descriptors, graph) = build(&[bucket("kept")]);
    let plan = plan::plan(&descriptors, &graph, &state);

    assert_eq!(plan.entries.len(), 2);
    assert_eq!(plan.entries[0].action, ChangeAction::Noop);
    assert_eq!(plan.entries[1].action, ChangeAction::Destroy);
    assert_eq!(plan.entries[1].address.as_str(), "storage_bucket.old");
}

#[test]
fn replace_with_cbd_orders_create_before_destroy() {
    let (descriptors, graph) = build(&[with_cbd(certificate("site"))]);
    let mut state = ready_state(&descriptors);

    let address = Address::parse("certificate.site").unwrap();
    state
        .get_mut(&address)
        .unwrap()
        .last_applied
        .insert("domain".to_string(), Value::String("old.com".to_string()));

    let plan = plan::plan(&descriptors, &graph, &state);
    let steps = plan.steps();
    let create = steps
        .iter()
        .position(|s| s.kind == StepKind::CreateReplacement)
        .unwrap();
    let destroy = steps
        .iter()
        .position(|s| s.kind == StepKind::DestroyOriginal)
        .unwrap();
    assert!(create < destroy);
}

#[test]
fn replace_without_cbd_orders_destroy_before_create() {
    let (descriptors, graph) = build(&[certificate("site")]);
    let mut state = ready_state(&descriptors);

    let address = Address::parse("certificate.site").unwrap();
    state
        .get_mut(&address)
        .unwrap()
        .last_applied
        .insert("domain".to_string(), Value::String("old.com".to_string()));

    let plan = plan::plan(&descriptors, &graph, &state);
    let steps = plan.steps();
    assert_eq!(steps[0].kind, StepKind::DestroyOriginal);
    assert_eq!(steps[1].kind, StepKind::CreateReplacement);
}

#[test]
fn attribute_removal_counts_as_change() {
    let (descriptors, graph) = build(&[bucket("site")]);
    let mut state = ready_state(&descriptors);

    let address = Address::parse("storage_bucket.site").unwrap();
    state
        .get_mut(&address)
        .unwrap()
        .last_applied
        .insert("versioning".to_string(), Value::Bool(true));

    let plan = plan::plan(&descriptors, &graph, &state);
    let entry = plan.entry(&address).unwrap();
    assert_eq!(entry.action, ChangeAction::Update);
    assert!(entry.reason.contains("versioning"));
}
