use serde_json::json;
use zenv_primitives::System;

use crate::manifest::{Manifest, Options};
use crate::testing::manifest;

#[test]
fn test_descriptor_table_keeps_declaration_order() {
    let manifest = manifest(json!({
        "install": {
            "zsh": null,
            "hello": null,
            "curl": null,
        },
    }));

    let iids: Vec<&String>
        = manifest.descriptors().keys().collect();

    assert_eq!(iids, ["zsh", "hello", "curl"]);
}

#[test]
fn test_groups_form_in_order_of_first_appearance() {
    let manifest = manifest(json!({
        "install": {
            "hello": { "group": "blue" },
            "curl": null,
            "zsh": { "group": "blue" },
            "jq": { "group": "red" },
        },
    }));

    let groups = manifest.grouped_descriptors();

    let names: Vec<&String> = groups.keys().collect();
    assert_eq!(names, ["blue", "default", "red"]);

    let blue: Vec<&String> = groups["blue"].keys().collect();
    assert_eq!(blue, ["hello", "zsh"]);
}

#[test]
fn test_descriptors_without_a_group_share_the_default_group() {
    let manifest = manifest(json!({
        "install": {
            "hello": null,
            "curl": null,
        },
    }));

    let groups = manifest.grouped_descriptors();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups["default"].len(), 2);
}

#[test]
fn test_systems_default_to_the_host() {
    let manifest = manifest(json!({}));

    assert_eq!(manifest.systems(), vec![System::current()]);
}

#[test]
fn test_systems_are_taken_from_the_manifest_when_declared() {
    let manifest = manifest(json!({
        "systems": ["x86_64-linux", "aarch64-darwin"],
    }));

    assert_eq!(manifest.systems(), vec![
        System::new("x86_64-linux"),
        System::new("aarch64-darwin"),
    ]);
}

#[test]
fn test_invalid_descriptor_fails_manifest_construction() {
    let raw = serde_json::from_value(json!({
        "install": {
            "hello": { "semver": "not a range" },
        },
    })).unwrap();

    assert!(Manifest::new(raw).is_err());
}

fn options(value: serde_json::Value) -> Options {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_options_merge_clobbers_key_by_key() {
    let mut merged = options(json!({
        "allow": { "unfree": false, "broken": false },
        "semver": { "prefer-pre-releases": false },
    }));

    merged.merge(&options(json!({
        "allow": { "unfree": true },
    })));

    // Only the keys the overlay sets are replaced.
    let allow = merged.allow.as_ref().unwrap();
    assert_eq!(allow.unfree, Some(true));
    assert_eq!(allow.broken, Some(false));

    let semver = merged.semver.as_ref().unwrap();
    assert_eq!(semver.prefer_pre_releases, Some(false));
}

#[test]
fn test_options_merge_fills_unset_sections() {
    let mut merged = Options::default();

    merged.merge(&options(json!({
        "allow": { "licenses": ["MIT"] },
    })));

    assert_eq!(merged.allow.unwrap().licenses, Some(vec!["MIT".to_string()]));
}
