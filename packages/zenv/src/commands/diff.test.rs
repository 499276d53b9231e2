use serde_json::json;

use crate::commands::diff::{diff_manifests, KeyChanges, ManifestDiff};
use crate::manifest::ManifestRaw;

fn raw(value: serde_json::Value) -> ManifestRaw {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_identical_manifests_diff_empty() {
    let manifest = raw(json!({
        "registry": {
            "inputs": {
                "a": { "from": { "type": "github", "owner": "example", "repo": "pkgs-a" } },
            },
        },
        "install": { "hello": null },
        "systems": ["x86_64-linux"],
    }));

    assert_eq!(diff_manifests(&manifest, &manifest), ManifestDiff {
        install: KeyChanges::default(),
        registry: KeyChanges::default(),
        options_changed: false,
        systems_changed: false,
    });
}

#[test]
fn test_install_changes_are_partitioned() {
    let old = raw(json!({
        "install": { "hello": null, "curl": null, "jq": null },
    }));

    let new = raw(json!({
        "install": { "hello": { "semver": "^2" }, "jq": null, "zsh": null },
    }));

    let diff = diff_manifests(&old, &new);

    assert_eq!(diff.install.added, ["zsh"]);
    assert_eq!(diff.install.removed, ["curl"]);
    assert_eq!(diff.install.changed, ["hello"]);
}

#[test]
fn test_registry_reference_changes_are_reported() {
    let old = raw(json!({
        "registry": {
            "inputs": {
                "a": { "from": { "type": "github", "owner": "example", "repo": "pkgs-a", "ref": "main" } },
            },
        },
    }));

    let new = raw(json!({
        "registry": {
            "inputs": {
                "a": { "from": { "type": "github", "owner": "example", "repo": "pkgs-a", "ref": "stable" } },
                "b": { "from": { "type": "github", "owner": "example", "repo": "pkgs-b" } },
            },
        },
    }));

    let diff = diff_manifests(&old, &new);

    assert_eq!(diff.registry.added, ["b"]);
    assert_eq!(diff.registry.changed, ["a"]);
    assert!(diff.registry.removed.is_empty());
}

#[test]
fn test_option_and_system_edits_set_their_flags() {
    let old = raw(json!({
        "options": { "allow": { "unfree": true } },
        "systems": ["x86_64-linux"],
    }));

    let new = raw(json!({
        "options": { "allow": { "unfree": false } },
        "systems": ["x86_64-linux", "aarch64-darwin"],
    }));

    let diff = diff_manifests(&old, &new);

    assert!(diff.options_changed);
    assert!(diff.systems_changed);
}

#[test]
fn test_missing_sections_compare_as_empty() {
    let old = raw(json!({}));
    let new = raw(json!({ "install": { "hello": null } }));

    let diff = diff_manifests(&old, &new);

    assert_eq!(diff.install.added, ["hello"]);
    assert!(!diff.options_changed);
    assert!(!diff.systems_changed);
}
