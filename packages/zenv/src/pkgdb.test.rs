use rstest::rstest;
use zenv_primitives::testing::sys;

use crate::pkgdb::{CatalogRow, PackageDb, PkgQueryArgs};
use crate::testing::{catalog, row};

fn args_for(name: &str) -> PkgQueryArgs {
    PkgQueryArgs {
        name: Some(name.to_string()),
        systems: vec![sys("x86_64-linux")],
        ..PkgQueryArgs::default()
    }
}

fn versions(rows: Vec<CatalogRow>, args: &PkgQueryArgs) -> Vec<String> {
    let db = catalog(&["x86_64-linux"], rows);

    db.query(args).unwrap().into_iter()
        .map(|id| {
            let payload = db.get_package(id).unwrap();
            payload["version"].as_str().unwrap().to_string()
        })
        .collect()
}

#[test]
fn test_rank_prefers_higher_versions() {
    let rows = vec![
        row("x86_64-linux", "packages", &["hello"], "1.0.0"),
        row("x86_64-linux", "packages", &["hello"], "2.4.0"),
        row("x86_64-linux", "packages", &["hello"], "2.12.1"),
    ];

    assert_eq!(versions(rows, &args_for("hello")), ["2.12.1", "2.4.0", "1.0.0"]);
}

#[test]
fn test_rank_puts_pre_releases_after_releases_by_default() {
    let rows = vec![
        row("x86_64-linux", "packages", &["hello"], "3.0.0-rc.1"),
        row("x86_64-linux", "packages", &["hello"], "2.12.1"),
    ];

    assert_eq!(versions(rows, &args_for("hello")), ["2.12.1", "3.0.0-rc.1"]);
}

#[test]
fn test_rank_honors_prefer_pre_releases() {
    let rows = vec![
        row("x86_64-linux", "packages", &["hello"], "3.0.0-rc.1"),
        row("x86_64-linux", "packages", &["hello"], "2.12.1"),
    ];

    let args = PkgQueryArgs {
        prefer_pre_releases: true,
        ..args_for("hello")
    };

    assert_eq!(versions(rows, &args), ["3.0.0-rc.1", "2.12.1"]);
}

#[test]
fn test_rank_puts_non_semver_versions_last() {
    let rows = vec![
        row("x86_64-linux", "packages", &["hello"], "2021-10-02"),
        row("x86_64-linux", "packages", &["hello"], "1.0.0"),
    ];

    assert_eq!(versions(rows, &args_for("hello")), ["1.0.0", "2021-10-02"]);
}

#[test]
fn test_rank_breaks_version_ties_by_attribute_path() {
    let rows = vec![
        row("x86_64-linux", "packages", &["zsh", "hello"], "1.0.0"),
        row("x86_64-linux", "packages", &["apps", "hello"], "1.0.0"),
    ];

    let db = catalog(&["x86_64-linux"], rows);
    let ids = db.query(&args_for("hello")).unwrap();

    let first = db.get_package(ids[0]).unwrap();
    assert_eq!(first["relPath"][0], "apps");
}

#[test]
fn test_rank_breaks_full_ties_by_subtree_precedence() {
    let rows = vec![
        row("x86_64-linux", "legacy", &["hello"], "1.0.0"),
        row("x86_64-linux", "packages", &["hello"], "1.0.0"),
    ];

    let db = catalog(&["x86_64-linux"], rows);

    let args = PkgQueryArgs {
        subtrees: Some(vec!["packages".to_string(), "legacy".to_string()]),
        ..args_for("hello")
    };

    let ids = db.query(&args).unwrap();
    let first = db.get_package(ids[0]).unwrap();

    assert_eq!(first["subtree"], "packages");
}

#[rstest]
#[case(args_for("hello"), true)]
#[case(args_for("nosuch"), false)]
#[case(PkgQueryArgs { pkg_path: Some(vec!["hello".to_string()]), ..args_for("hello") }, true)]
#[case(PkgQueryArgs { pkg_path: Some(vec!["apps".to_string(), "hello".to_string()]), ..args_for("hello") }, false)]
#[case(PkgQueryArgs { version: Some("2.12.1".to_string()), ..args_for("hello") }, true)]
#[case(PkgQueryArgs { version: Some("2.12.2".to_string()), ..args_for("hello") }, false)]
#[case(PkgQueryArgs { semver: Some("^2".to_string()), ..args_for("hello") }, true)]
#[case(PkgQueryArgs { semver: Some("^3".to_string()), ..args_for("hello") }, false)]
#[case(PkgQueryArgs { subtrees: Some(vec!["legacy".to_string()]), ..args_for("hello") }, false)]
#[case(PkgQueryArgs { systems: vec![sys("aarch64-darwin")], ..args_for("hello") }, false)]
fn test_query_filters(#[case] args: PkgQueryArgs, #[case] expected: bool) {
    let db = catalog(&["x86_64-linux", "aarch64-darwin"], vec![
        row("x86_64-linux", "packages", &["hello"], "2.12.1"),
    ]);

    assert_eq!(!db.query(&args).unwrap().is_empty(), expected);
}

#[test]
fn test_broken_rows_are_hidden_unless_allowed() {
    let mut broken
        = row("x86_64-linux", "packages", &["hello"], "2.12.1");
    broken.broken = Some(true);

    let db = catalog(&["x86_64-linux"], vec![broken]);

    assert!(db.query(&args_for("hello")).unwrap().is_empty());

    let args = PkgQueryArgs {
        allow_broken: true,
        ..args_for("hello")
    };

    assert!(!db.query(&args).unwrap().is_empty());
}

#[test]
fn test_unfree_rows_are_visible_unless_disallowed() {
    let mut unfree
        = row("x86_64-linux", "packages", &["hello"], "2.12.1");
    unfree.unfree = Some(true);

    let db = catalog(&["x86_64-linux"], vec![unfree]);

    assert!(!db.query(&args_for("hello")).unwrap().is_empty());

    let args = PkgQueryArgs {
        allow_unfree: false,
        ..args_for("hello")
    };

    assert!(db.query(&args).unwrap().is_empty());
}

#[test]
fn test_license_allow_list_filters_known_licenses_only() {
    let mut licensed
        = row("x86_64-linux", "packages", &["hello"], "2.12.1");
    licensed.license = Some("GPL-3.0-or-later".to_string());

    let unlicensed
        = row("x86_64-linux", "packages", &["world"], "1.0.0");

    let db = catalog(&["x86_64-linux"], vec![licensed, unlicensed]);

    let args = PkgQueryArgs {
        licenses: Some(vec!["MIT".to_string()]),
        ..args_for("hello")
    };

    assert!(db.query(&args).unwrap().is_empty());

    // Rows without license metadata pass the allow-list.
    let args = PkgQueryArgs {
        licenses: Some(vec!["MIT".to_string()]),
        ..args_for("world")
    };

    assert!(!db.query(&args).unwrap().is_empty());
}

#[test]
fn test_get_package_payload_carries_catalog_position() {
    let db = catalog(&["x86_64-linux"], vec![
        row("x86_64-linux", "packages", &["hello"], "2.12.1"),
    ]);

    let ids = db.query(&args_for("hello")).unwrap();
    let payload = db.get_package(ids[0]).unwrap();

    assert_eq!(payload["absPath"], serde_json::json!(["packages", "x86_64-linux", "hello"]));
    assert_eq!(payload["relPath"], serde_json::json!(["hello"]));
    assert_eq!(payload["subtree"], "packages");
    assert_eq!(payload["system"], "x86_64-linux");
    assert_eq!(payload["pname"], "hello");
    assert_eq!(payload["id"], serde_json::json!(ids[0]));
}

#[test]
fn test_scrape_systems_rejects_unindexed_systems() {
    let db = catalog(&["x86_64-linux"], Vec::new());

    assert!(db.scrape_systems(&[sys("x86_64-linux")]).is_ok());
    assert!(db.scrape_systems(&[sys("aarch64-darwin")]).is_err());
}
