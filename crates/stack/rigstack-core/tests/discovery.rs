mod common;

use std::fs;

use common::Harness;
use rigstack_core::{
    AttributeCategory, ComponentRegistry, ComponentRequest, Config, DefinitionSource,
    RegistryError, Stack, Value, Version,
};
use rigstack_test_fixtures::components;

fn joint_count(registry: &ComponentRegistry, version: Option<Version>) -> Value {
    let (_, attrs) = registry
        .request("joint_chain", version)
        .unwrap()
        .instantiate();
    attrs
        .get(AttributeCategory::Option, "joint_count")
        .unwrap()
        .get()
        .clone()
}

#[test]
fn core_definitions_register_every_revision() {
    let h = Harness::new();
    let mut registry = h.empty_registry();
    let report = registry.discover([components::dir("core").unwrap()]).unwrap();

    assert!(report.rejected.is_empty());
    assert_eq!(registry.identifiers(), ["joint_chain", "probe", "rig_root"]);
    assert_eq!(
        registry.versions("joint_chain"),
        vec![Version::from(1), Version::from(2), Version::from(3)]
    );
    assert_eq!(joint_count(&registry, None), Value::from(4));
    assert_eq!(joint_count(&registry, Some(Version::from(1))), Value::from(2));

    let latest = registry.request("joint_chain", None).unwrap();
    assert!(matches!(
        &latest.definition().source,
        DefinitionSource::File(path) if path.ends_with("limbs/joint_chain_v3.json")
    ));
}

#[test]
fn broken_definitions_are_rejected_not_fatal() {
    let h = Harness::new();
    let mut registry = h.empty_registry();
    let report = registry
        .discover([components::dir("broken").unwrap()])
        .unwrap();

    assert!(report.registered.is_empty());
    assert_eq!(report.rejected.len(), 3);
    assert!(report
        .rejected
        .iter()
        .any(|r| r.reason.contains("unknown builder 'spline_ik'")));
    assert!(registry.is_empty());
}

#[test]
fn a_later_definition_of_the_same_version_wins() {
    let h = Harness::new();
    let mut registry = h.empty_registry();
    registry
        .discover([
            components::dir("core").unwrap(),
            components::dir("overrides").unwrap(),
        ])
        .unwrap();

    assert_eq!(joint_count(&registry, Some(Version::from(2))), Value::from(5));
    assert_eq!(registry.versions("joint_chain").len(), 3);
}

#[test]
fn refresh_picks_up_new_files_and_keeps_code_registrations() {
    let h = Harness::new();
    let scratch = tempfile::tempdir().unwrap();
    let mut registry = h.registry();
    registry.discover([scratch.path()]).unwrap();
    assert_eq!(registry.versions("joint_chain"), vec![Version::from(1)]);

    fs::write(
        scratch.path().join("chain_v7.json"),
        r#"{ "identifier": "joint_chain", "version": 7, "options": { "joint_count": 7 } }"#,
    )
    .unwrap();
    let report = registry.refresh().unwrap();
    assert_eq!(report.registered, vec![("joint_chain".to_string(), Version::from(7))]);
    assert_eq!(joint_count(&registry, None), Value::from(7));

    fs::remove_file(scratch.path().join("chain_v7.json")).unwrap();
    registry.refresh().unwrap();
    assert_eq!(registry.versions("joint_chain"), vec![Version::from(1)]);
    assert!(registry.contains("probe"));
}

#[test]
fn unreadable_search_path_is_an_error() {
    let h = Harness::new();
    let scratch = tempfile::tempdir().unwrap();
    let mut registry = h.empty_registry();
    let err = registry
        .discover([scratch.path().join("missing")])
        .unwrap_err();
    assert!(matches!(err, RegistryError::SearchPath { .. }));
}

#[test]
fn failed_discovery_leaves_refresh_working() {
    let h = Harness::new();
    let scratch = tempfile::tempdir().unwrap();
    let mut registry = h.empty_registry();
    registry.discover([components::dir("core").unwrap()]).unwrap();

    let missing = scratch.path().join("missing");
    assert!(registry
        .discover([components::dir("overrides").unwrap(), missing])
        .is_err());
    assert_eq!(registry.search_paths(), [components::dir("core").unwrap()]);
    assert_eq!(joint_count(&registry, Some(Version::from(2))), Value::from(3));

    let report = registry.refresh().unwrap();
    assert_eq!(report.registered.len(), 5);
    assert_eq!(registry.len(), 5);
}

#[test]
fn refresh_with_a_vanished_path_keeps_previous_registrations() {
    let h = Harness::new();
    let scratch = tempfile::tempdir().unwrap();
    let extra = scratch.path().join("extra");
    fs::create_dir(&extra).unwrap();
    fs::write(
        extra.join("chain_v7.json"),
        r#"{ "identifier": "joint_chain", "version": 7, "options": { "joint_count": 7 } }"#,
    )
    .unwrap();

    let mut registry = h.empty_registry();
    registry
        .discover([components::dir("core").unwrap(), extra.clone()])
        .unwrap();
    assert_eq!(registry.len(), 6);

    fs::remove_dir_all(&extra).unwrap();
    let err = registry.refresh().unwrap_err();
    assert!(matches!(err, RegistryError::SearchPath { .. }));
    assert_eq!(registry.len(), 6);
    assert_eq!(joint_count(&registry, None), Value::from(7));
}

#[test]
fn configured_search_paths_feed_refresh() {
    let h = Harness::new();
    let mut config = Config::default();
    config
        .registry
        .search_paths
        .push(components::dir("core").unwrap());

    let mut registry = ComponentRegistry::from_config(&config.registry);
    h.install_builders(&mut registry);
    assert!(registry.is_empty());
    registry.refresh().unwrap();
    assert_eq!(registry.len(), 5);
}

#[test]
fn stacks_use_the_newest_revision_unless_pinned() {
    let h = Harness::new();
    let mut registry = h.empty_registry();
    registry.discover([components::dir("core").unwrap()]).unwrap();
    let mut stack = Stack::new(registry);

    let newest = stack
        .add_component(ComponentRequest::new("joint_chain", "spine"))
        .unwrap();
    let pinned = stack
        .add_component(ComponentRequest::new("joint_chain", "tail").version(1))
        .unwrap();
    assert_eq!(stack.component(newest).unwrap().version(), Version::from(3));
    assert_eq!(stack.component(pinned).unwrap().version(), Version::from(1));

    let err = stack
        .add_component(ComponentRequest::new("joint_chain", "x").version(9))
        .unwrap_err();
    assert!(err.to_string().contains("has no version 9"));
}
