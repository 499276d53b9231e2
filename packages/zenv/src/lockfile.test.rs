use serde_json::json;

use crate::lockfile::{Lockfile, LockfileRaw, LOCKFILE_VERSION};
use crate::testing::lockfile;

const REV_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const REV_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn locked_github(repo: &str, rev: &str) -> serde_json::Value {
    json!({
        "from": {
            "type": "github",
            "owner": "example",
            "repo": repo,
            "rev": rev,
        },
    })
}

fn sample() -> Lockfile {
    lockfile(json!({
        "lockfile-version": LOCKFILE_VERSION,
        "manifest": {
            "install": { "hello": null },
            "systems": ["x86_64-linux"],
        },
        "registry": {
            "inputs": {
                "zeta": locked_github("pkgs-a", REV_A),
                "alpha": locked_github("pkgs-b", REV_B),
            },
        },
        "packages": {
            "x86_64-linux": {
                "hello": {
                    "input": {
                        "url": format!("github:example/pkgs-a/{}", REV_A),
                        "rev": REV_A,
                    },
                    "attr-path": ["packages", "x86_64-linux", "hello"],
                    "priority": 5,
                    "info": { "pname": "hello", "version": "2.12.1" },
                },
                "optdep": null,
            },
        },
    }))
}

#[test]
fn test_descriptor_table_is_parsed_from_the_embedded_manifest() {
    let lockfile = sample();

    assert_eq!(lockfile.descriptors().len(), 1);
    assert_eq!(lockfile.descriptors()["hello"].name.as_deref(), Some("hello"));
}

#[test]
fn test_serialization_uses_wire_names_and_null_markers() {
    let rendered = sample().to_json_string().unwrap();

    assert!(rendered.contains("\"lockfile-version\": 1"));
    assert!(rendered.contains("\"attr-path\""));
    assert!(rendered.contains("\"optdep\": null"));
    assert!(rendered.ends_with('\n'));
}

#[test]
fn test_registry_is_emitted_sorted_by_name() {
    let rendered = sample().to_json_string().unwrap();

    let alpha = rendered.find("\"alpha\"").unwrap();
    let zeta = rendered.find("\"zeta\"").unwrap();

    assert!(alpha < zeta);
}

#[test]
fn test_serialization_round_trips() {
    let lockfile = sample();

    let rendered = lockfile.to_json_string().unwrap();
    let reparsed: LockfileRaw = serde_json::from_str(&rendered).unwrap();

    assert_eq!(&reparsed, lockfile.raw());
}

#[test]
fn test_remove_unused_inputs_drops_orphans_and_keeps_referenced_ones() {
    let mut lockfile = sample();

    lockfile.remove_unused_inputs();

    let registry = lockfile.registry();
    assert!(registry.inputs.contains_key("zeta"));
    assert!(!registry.inputs.contains_key("alpha"));
}

#[test]
fn test_remove_unused_inputs_keeps_inputs_used_by_any_system() {
    let mut lockfile = lockfile(json!({
        "manifest": { "install": { "hello": null } },
        "registry": {
            "inputs": {
                "a": locked_github("pkgs-a", REV_A),
            },
        },
        "packages": {
            "x86_64-linux": { "hello": null },
            "aarch64-darwin": {
                "hello": {
                    "input": {
                        "url": format!("github:example/pkgs-a/{}", REV_A),
                        "rev": REV_A,
                    },
                    "attr-path": ["packages", "aarch64-darwin", "hello"],
                    "priority": 5,
                    "info": {},
                },
            },
        },
    }));

    lockfile.remove_unused_inputs();

    assert!(lockfile.registry().inputs.contains_key("a"));
}

#[test]
fn test_missing_lockfile_version_defaults() {
    let lockfile = lockfile(json!({
        "manifest": {},
    }));

    assert_eq!(lockfile.raw().lockfile_version, LOCKFILE_VERSION);
}
