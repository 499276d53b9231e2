use serde_json::{json, Value};
use zenv_primitives::testing::sys;

use crate::error::Error;
use crate::lockfile::Lockfile;
use crate::manifest::Manifest;
use crate::resolve::{Resolver, UpgradeSelector};
use crate::testing::{catalog, lockfile, manifest, row, PinnedLocker, StaticProvider};

const REV_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const REV_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

const LINUX: &str = "x86_64-linux";
const DARWIN: &str = "aarch64-darwin";

fn github_unlocked(repo: &str) -> Value {
    json!({ "type": "github", "owner": "example", "repo": repo, "ref": "main" })
}

fn github_locked(repo: &str, rev: &str) -> Value {
    json!({ "type": "github", "owner": "example", "repo": repo, "ref": "main", "rev": rev })
}

fn unlocked_url(repo: &str) -> String {
    format!("github:example/{}/main", repo)
}

fn locked_url(repo: &str, rev: &str) -> String {
    format!("github:example/{}/{}", repo, rev)
}

fn manifest_json_one(install: Value) -> Value {
    json!({
        "registry": { "inputs": { "a": { "from": github_unlocked("pkgs-a") } } },
        "install": install,
        "systems": [LINUX],
    })
}

fn manifest_one(install: Value) -> Manifest {
    manifest(manifest_json_one(install))
}

fn manifest_two(install: Value) -> Manifest {
    manifest(json!({
        "registry": {
            "inputs": {
                "a": { "from": github_unlocked("pkgs-a") },
                "b": { "from": github_unlocked("pkgs-b") },
            },
        },
        "install": install,
        "systems": [LINUX],
    }))
}

fn locker_ab() -> PinnedLocker {
    PinnedLocker::new()
        .with_pin(&unlocked_url("pkgs-a"), REV_A)
        .with_pin(&unlocked_url("pkgs-b"), REV_B)
}

fn provider_ab() -> StaticProvider {
    StaticProvider::new()
        .with_catalog(&locked_url("pkgs-a", REV_A), catalog(&[LINUX, DARWIN], vec![
            row(LINUX, "packages", &["hello"], "2.12.1"),
            row(LINUX, "packages", &["world"], "1.0.0"),
            row(LINUX, "packages", &["linuxonly"], "1.0.0"),
            row(DARWIN, "packages", &["hello"], "2.12.1"),
        ]))
        .with_catalog(&locked_url("pkgs-b", REV_B), catalog(&[LINUX, DARWIN], vec![
            row(LINUX, "packages", &["hello"], "2.12.1"),
            row(LINUX, "packages", &["world"], "1.0.0"),
            row(LINUX, "packages", &["newpkg"], "0.1.0"),
        ]))
}

/// A prior lockfile whose manifest is `manifest_json_one(install)` and
/// whose packages pin the given install ids to `pkgs-a` at `REV_A`.
fn prior_lockfile_one(install: Value, packages: &[&str]) -> Lockfile {
    let system_packages: Value = packages.iter()
        .map(|iid| (iid.to_string(), json!({
            "input": { "url": locked_url("pkgs-a", REV_A), "rev": REV_A },
            "attr-path": ["packages", LINUX, iid],
            "priority": 5,
            "info": { "pname": iid, "version": "1.0.0", "broken": false, "unfree": false },
        })))
        .collect::<serde_json::Map<String, Value>>()
        .into();

    lockfile(json!({
        "lockfile-version": 1,
        "manifest": manifest_json_one(install),
        "registry": { "inputs": { "a": { "from": github_locked("pkgs-a", REV_A) } } },
        "packages": { LINUX: system_packages },
    }))
}

#[test]
fn test_fresh_resolve_single_input_single_group() {
    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_one(json!({ "hello": null })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();
    let raw = lockfile.raw();

    let package = raw.packages[&sys(LINUX)]["hello"].as_ref().unwrap();

    assert_eq!(package.input.url, locked_url("pkgs-a", REV_A));
    assert_eq!(package.input.rev, REV_A);
    assert_eq!(package.attr_path, ["packages", LINUX, "hello"]);
    assert_eq!(package.priority, 5);

    assert_eq!(package.info["pname"], "hello");
    assert_eq!(package.info["version"], "2.12.1");

    // The catalog position fields are stripped from the payload.
    for stripped in ["absPath", "relPath", "subtree", "id", "system"] {
        assert!(!package.info.contains_key(stripped));
    }

    // The manifest is carried verbatim and the used input survives.
    assert_eq!(raw.manifest, *resolver.manifest().raw());
    assert!(raw.registry.inputs.contains_key("a"));
}

#[test]
fn test_optional_descriptor_without_a_match_resolves_to_null() {
    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_one(json!({
            "hello": null,
            "nosuch": { "optional": true },
        })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();
    let packages = &lockfile.raw().packages[&sys(LINUX)];

    assert!(packages["hello"].is_some());
    assert!(packages["nosuch"].is_none());
}

#[test]
fn test_required_descriptor_without_a_match_reports_every_input_tried() {
    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_two(json!({ "nosuch": null })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let error = resolver.create_lockfile().unwrap_err();

    let Error::ResolutionFailed(failures) = error else {
        panic!("expected a resolution failure, got {error:?}");
    };

    assert_eq!(failures.0.len(), 1);

    let failure = &failures.0[0];
    assert_eq!(failure.group, "default");

    let attempts: Vec<(&str, &str)> = failure.attempts.iter()
        .map(|attempt| (attempt.install_id.as_str(), attempt.input_url.as_str()))
        .collect();

    assert_eq!(attempts, [
        ("nosuch", locked_url("pkgs-a", REV_A).as_str()),
        ("nosuch", locked_url("pkgs-b", REV_B).as_str()),
    ]);

    let rendered = failures.to_string();
    assert!(rendered.contains("failed to resolve some package(s):"));
    assert!(rendered.contains("in 'default':"));
    assert!(rendered.contains("failed to resolve 'nosuch' in input"));
}

#[test]
fn test_prior_lock_is_reused_verbatim_without_relocking() {
    let install = json!({ "hello": null });
    let prior = prior_lockfile_one(install.clone(), &["hello"]);

    // No pins registered: locking anything would fail loudly.
    let locker = PinnedLocker::new();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_one(install),
        Some(prior.clone()),
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();

    assert_eq!(lockfile.raw(), prior.raw());
    assert!(locker.calls().is_empty());
}

#[test]
fn test_group_is_upgraded_to_another_input_when_a_new_member_is_missing() {
    let prior = prior_lockfile_one(json!({ "hello": null, "world": null }), &["hello", "world"]);

    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_two(json!({ "hello": null, "world": null, "newpkg": null })),
        Some(prior),
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();
    let packages = &lockfile.raw().packages[&sys(LINUX)];

    for iid in ["hello", "world", "newpkg"] {
        let package = packages[iid].as_ref().unwrap();
        assert_eq!(package.input.url, locked_url("pkgs-b", REV_B));
    }

    // The abandoned input is pruned.
    let names: Vec<&String> = lockfile.registry().inputs.keys().collect();
    assert_eq!(names, ["b"]);
}

#[test]
fn test_system_exclusion_yields_null_without_failing_the_group() {
    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest(json!({
            "registry": { "inputs": { "a": { "from": github_unlocked("pkgs-a") } } },
            "install": {
                "hello": null,
                "linuxonly": { "systems": [LINUX] },
            },
            "systems": [LINUX, DARWIN],
        })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();
    let raw = lockfile.raw();

    assert!(raw.packages[&sys(LINUX)]["linuxonly"].is_some());
    assert!(raw.packages[&sys(LINUX)]["hello"].is_some());

    assert!(raw.packages[&sys(DARWIN)]["linuxonly"].is_none());
    assert!(raw.packages[&sys(DARWIN)]["hello"].is_some());
}

#[test]
fn test_empty_registry_is_reported_distinctly() {
    let locker = PinnedLocker::new();
    let provider = StaticProvider::new();

    let resolver = Resolver::new(
        None,
        manifest(json!({
            "install": { "hello": null },
            "systems": [LINUX],
        })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    assert!(matches!(
        resolver.create_lockfile(),
        Err(Error::EmptyRegistry),
    ));
}

#[test]
fn test_resolution_is_idempotent() {
    let install = json!({ "hello": null, "world": { "group": "tools" } });

    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_one(install.clone()),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let first = resolver.create_lockfile().unwrap();

    let relock_locker = PinnedLocker::new();
    let resolver = Resolver::new(
        None,
        manifest_one(install),
        Some(Lockfile::new(first.raw().clone()).unwrap()),
        UpgradeSelector::default(),
        &relock_locker,
        &provider,
    ).unwrap();

    let second = resolver.create_lockfile().unwrap();

    assert_eq!(second.to_json_string().unwrap(), first.to_json_string().unwrap());
    assert!(relock_locker.calls().is_empty());
}

#[test]
fn test_unused_inputs_are_pruned_and_used_ones_kept() {
    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_two(json!({ "hello": null })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();

    // `hello` resolves in `a` (registry order); `b` is never referenced.
    let names: Vec<&String> = lockfile.registry().inputs.keys().collect();
    assert_eq!(names, ["a"]);
}

#[test]
fn test_copied_locked_packages_pick_up_the_manifest_priority() {
    let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

    let locker = PinnedLocker::new();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_one(json!({ "hello": { "priority": 7 } })),
        Some(prior.clone()),
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();
    let package = lockfile.raw().packages[&sys(LINUX)]["hello"].as_ref().unwrap();

    // Same lock as before, only the priority is refreshed.
    assert_eq!(package.priority, 7);
    assert_eq!(package.attr_path, prior.raw().packages[&sys(LINUX)]["hello"].as_ref().unwrap().attr_path);
    assert!(locker.calls().is_empty());
}

#[test]
fn test_input_restricted_descriptor_forces_its_group_to_that_input() {
    let locker = locker_ab();
    let provider = provider_ab();

    let resolver = Resolver::new(
        None,
        manifest_two(json!({ "hello": { "input": "b" } })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    ).unwrap();

    let lockfile = resolver.create_lockfile().unwrap();
    let package = lockfile.raw().packages[&sys(LINUX)]["hello"].as_ref().unwrap();

    assert_eq!(package.input.url, locked_url("pkgs-b", REV_B));
}

#[test]
fn test_missing_scrape_for_a_requested_system_fails_construction() {
    let locker = locker_ab();

    let provider = StaticProvider::new()
        .with_catalog(&locked_url("pkgs-a", REV_A), catalog(&[LINUX], Vec::new()));

    let result = Resolver::new(
        None,
        manifest(json!({
            "registry": { "inputs": { "a": { "from": github_unlocked("pkgs-a") } } },
            "install": { "hello": null },
            "systems": ["riscv64-linux"],
        })),
        None,
        UpgradeSelector::default(),
        &locker,
        &provider,
    );

    assert!(matches!(result, Err(Error::SystemNotScraped(_))));
}

mod group_lock_checks {
    use super::*;

    /// Builds a resolver over `install` with `prior` as the old
    /// lockfile, then reports whether every group is considered locked
    /// for the linux system.
    fn all_groups_locked(install: Value, prior: Lockfile, upgrades: UpgradeSelector) -> bool {
        let locker = locker_ab();
        let provider = provider_ab();

        let resolver = Resolver::new(
            None,
            manifest_one(install),
            Some(prior),
            upgrades,
            &locker,
            &provider,
        ).unwrap();

        let system = sys(LINUX);

        resolver.manifest().grouped_descriptors().iter()
            .all(|(name, group)| resolver.group_is_locked(name, group, &system))
    }

    #[test]
    fn test_unchanged_descriptor_stays_locked() {
        let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

        assert!(all_groups_locked(json!({ "hello": null }), prior, UpgradeSelector::default()));
    }

    #[test]
    fn test_explicitly_requiring_the_locked_system_stays_locked() {
        let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

        assert!(all_groups_locked(
            json!({ "hello": { "systems": [LINUX] } }),
            prior,
            UpgradeSelector::default(),
        ));
    }

    #[test]
    fn test_disabling_the_locked_system_unlocks() {
        let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

        assert!(!all_groups_locked(
            json!({ "hello": { "systems": [] } }),
            prior,
            UpgradeSelector::default(),
        ));
    }

    #[test]
    fn test_moving_to_another_group_unlocks() {
        let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

        assert!(!all_groups_locked(
            json!({ "hello": { "group": "red" } }),
            prior,
            UpgradeSelector::default(),
        ));
    }

    #[test]
    fn test_a_new_group_member_unlocks() {
        let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

        assert!(!all_groups_locked(
            json!({ "hello": null, "world": null }),
            prior,
            UpgradeSelector::default(),
        ));
    }

    #[test]
    fn test_changing_an_identity_field_unlocks() {
        let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

        assert!(!all_groups_locked(
            json!({ "hello": { "name": "hello", "semver": "^2" } }),
            prior,
            UpgradeSelector::default(),
        ));
    }

    #[test]
    fn test_priority_changes_do_not_unlock() {
        let prior = prior_lockfile_one(json!({ "hello": null }), &["hello"]);

        assert!(all_groups_locked(
            json!({ "hello": { "priority": 9 } }),
            prior,
            UpgradeSelector::default(),
        ));
    }

    #[test]
    fn test_upgrade_selector_unlocks_matching_groups() {
        let install = json!({ "hello": null });

        let prior = prior_lockfile_one(install.clone(), &["hello"]);
        assert!(!all_groups_locked(install.clone(), prior, UpgradeSelector::All));

        let prior = prior_lockfile_one(install.clone(), &["hello"]);
        assert!(!all_groups_locked(
            install.clone(),
            prior,
            UpgradeSelector::Groups(vec!["default".to_string()]),
        ));

        let prior = prior_lockfile_one(install.clone(), &["hello"]);
        assert!(all_groups_locked(
            install,
            prior,
            UpgradeSelector::Groups(vec!["other".to_string()]),
        ));
    }
}

mod group_input_reuse {
    use super::*;

    /// A prior lockfile with `x` and `y` locked to different inputs,
    /// under the given old group names.
    fn prior_with_two_groups(x_group: &str, y_group: &str) -> Lockfile {
        lockfile(json!({
            "lockfile-version": 1,
            "manifest": {
                "install": {
                    "x": { "group": x_group },
                    "y": { "group": y_group },
                },
                "systems": [LINUX],
            },
            "registry": {
                "inputs": {
                    "a": { "from": github_locked("pkgs-a", REV_A) },
                    "b": { "from": github_locked("pkgs-b", REV_B) },
                },
            },
            "packages": {
                LINUX: {
                    "x": {
                        "input": { "url": locked_url("pkgs-a", REV_A), "rev": REV_A },
                        "attr-path": ["packages", LINUX, "x"],
                        "priority": 5,
                        "info": {},
                    },
                    "y": {
                        "input": { "url": locked_url("pkgs-b", REV_B), "rev": REV_B },
                        "attr-path": ["packages", LINUX, "y"],
                        "priority": 5,
                        "info": {},
                    },
                },
            },
        }))
    }

    fn group_input_for(install: Value, prior: Lockfile) -> Option<String> {
        let locker = locker_ab();
        let provider = provider_ab();

        let resolver = Resolver::new(
            None,
            manifest_two(install),
            Some(prior),
            UpgradeSelector::default(),
            &locker,
            &provider,
        ).unwrap();

        let groups = resolver.manifest().grouped_descriptors();
        let (_, group) = groups.first().unwrap();

        resolver.group_input(group, &sys(LINUX))
            .map(|locked| locked.url)
    }

    #[test]
    fn test_same_group_match_wins_even_when_found_later() {
        // `x` moved out of its old group, `y` stayed in `g3`.
        let prior = prior_with_two_groups("g1", "g3");

        let reused = group_input_for(
            json!({
                "x": { "group": "g3" },
                "y": { "group": "g3" },
            }),
            prior,
        );

        assert_eq!(reused, Some(locked_url("pkgs-b", REV_B)));
    }

    #[test]
    fn test_first_wrong_group_fallback_is_returned_otherwise() {
        // Both members came from other groups; `x` is encountered
        // first.
        let prior = prior_with_two_groups("g1", "g2");

        let reused = group_input_for(
            json!({
                "x": { "group": "g3" },
                "y": { "group": "g3" },
            }),
            prior,
        );

        assert_eq!(reused, Some(locked_url("pkgs-a", REV_A)));
    }

    #[test]
    fn test_changed_packages_are_not_reused() {
        let prior = prior_with_two_groups("g3", "g2");

        // `x` now requests a different package, so only `y`'s
        // wrong-group input remains.
        let reused = group_input_for(
            json!({
                "x": { "group": "g3", "semver": "^2" },
                "y": { "group": "g3" },
            }),
            prior,
        );

        assert_eq!(reused, Some(locked_url("pkgs-b", REV_B)));
    }

    #[test]
    fn test_nothing_is_reused_without_prior_packages() {
        let prior = lockfile(json!({
            "lockfile-version": 1,
            "manifest": { "install": { "x": null } },
            "registry": { "inputs": {} },
            "packages": {},
        }));

        assert_eq!(group_input_for(json!({ "x": null }), prior), None);
    }
}
