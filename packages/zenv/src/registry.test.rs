use serde_json::json;
use zenv_primitives::InputRef;

use crate::error::Error;
use crate::registry::{InputLocker, RegistryRaw};
use crate::testing::PinnedLocker;

const REV_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const REV_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn registry(value: serde_json::Value) -> RegistryRaw {
    serde_json::from_value(value).unwrap()
}

fn github(owner_repo_ref: &str) -> serde_json::Value {
    let mut parts = owner_repo_ref.split('/');

    json!({
        "from": {
            "type": "github",
            "owner": parts.next().unwrap(),
            "repo": parts.next().unwrap(),
            "ref": parts.next().unwrap(),
        },
    })
}

#[test]
fn test_merge_replaces_in_place_and_appends_new_names() {
    let mut merged = registry(json!({
        "inputs": {
            "a": github("example/pkgs-a/main"),
            "b": github("example/pkgs-b/main"),
        },
    }));

    merged.merge(registry(json!({
        "inputs": {
            "b": github("example/pkgs-b/stable"),
            "c": github("example/pkgs-c/main"),
        },
    })));

    let names: Vec<&String> = merged.inputs.keys().collect();
    assert_eq!(names, ["a", "b", "c"]);

    assert_eq!(merged.inputs["b"].from.url(), "github:example/pkgs-b/stable");
}

#[test]
fn test_lock_pins_every_input() {
    let mut combined = registry(json!({
        "inputs": {
            "a": github("example/pkgs-a/main"),
            "b": github("example/pkgs-b/main"),
        },
    }));

    let locker = PinnedLocker::new()
        .with_pin("github:example/pkgs-a/main", REV_A)
        .with_pin("github:example/pkgs-b/main", REV_B);

    combined.lock(None, &locker).unwrap();

    assert!(combined.inputs.values().all(|input| input.from.is_locked()));
    assert_eq!(combined.inputs["a"].from.locked().unwrap().rev, REV_A);
    assert_eq!(locker.calls(), ["a", "b"]);
}

#[test]
fn test_lock_reuses_prior_pins_without_invoking_the_locker() {
    let mut combined = registry(json!({
        "inputs": {
            "a": github("example/pkgs-a/main"),
            "b": github("example/pkgs-b/main"),
        },
    }));

    let prior = registry(json!({
        "inputs": {
            "a": {
                "from": {
                    "type": "github",
                    "owner": "example",
                    "repo": "pkgs-a",
                    "ref": "main",
                    "rev": REV_A,
                },
            },
        },
    }));

    // Only `b` has a pin registered; locking `a` would fail, proving it
    // is never attempted.
    let locker = PinnedLocker::new()
        .with_pin("github:example/pkgs-b/main", REV_B);

    combined.lock(Some(&prior), &locker).unwrap();

    assert_eq!(combined.inputs["a"].from.locked().unwrap().rev, REV_A);
    assert_eq!(combined.inputs["b"].from.locked().unwrap().rev, REV_B);
    assert_eq!(locker.calls(), ["b"]);
}

#[test]
fn test_lock_ignores_unlocked_prior_entries() {
    let mut combined = registry(json!({
        "inputs": {
            "a": github("example/pkgs-a/main"),
        },
    }));

    let prior = registry(json!({
        "inputs": {
            "a": github("example/pkgs-a/main"),
        },
    }));

    let locker = PinnedLocker::new()
        .with_pin("github:example/pkgs-a/main", REV_A);

    combined.lock(Some(&prior), &locker).unwrap();

    assert_eq!(combined.inputs["a"].from.locked().unwrap().rev, REV_A);
    assert_eq!(locker.calls(), ["a"]);
}

#[test]
fn test_lock_propagates_locker_failures() {
    let mut combined = registry(json!({
        "inputs": {
            "a": github("example/pkgs-a/main"),
        },
    }));

    let result
        = combined.lock(None, &PinnedLocker::new());

    assert!(matches!(result, Err(Error::InputLockingFailed(name, _)) if name == "a"));
}

#[test]
fn test_lock_rejects_a_locker_that_returns_an_unlocked_reference() {
    struct BrokenLocker;

    impl InputLocker for BrokenLocker {
        fn lock(&self, _name: &str, input: &InputRef) -> Result<InputRef, Error> {
            Ok(input.clone())
        }
    }

    let mut combined = registry(json!({
        "inputs": {
            "a": github("example/pkgs-a/main"),
        },
    }));

    assert!(matches!(
        combined.lock(None, &BrokenLocker),
        Err(Error::InputLockingFailed(..)),
    ));
}
