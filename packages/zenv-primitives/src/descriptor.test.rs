use rstest::rstest;

use crate::testing::{descriptor, sys};
use crate::{ManifestDescriptor, ManifestDescriptorRaw, PkgPathField, DEFAULT_GROUP};

#[test]
fn test_null_descriptor_requests_the_install_id_by_name() {
    let parsed = ManifestDescriptor::from_raw("hello", None).unwrap();

    assert_eq!(parsed.name.as_deref(), Some("hello"));
    assert_eq!(parsed.pkg_path, None);
    assert_eq!(parsed.priority, 5);
    assert!(!parsed.optional);
    assert_eq!(parsed.group_name(), DEFAULT_GROUP);
}

#[test]
fn test_explicit_name_is_not_overridden_by_the_install_id() {
    let raw = ManifestDescriptorRaw {
        name: Some("gnu-hello".to_string()),
        ..ManifestDescriptorRaw::default()
    };

    let parsed = ManifestDescriptor::from_raw("hello", Some(&raw)).unwrap();

    assert_eq!(parsed.name.as_deref(), Some("gnu-hello"));
}

#[test]
fn test_pkg_path_alone_suppresses_the_name_default() {
    let raw = ManifestDescriptorRaw {
        pkg_path: Some(PkgPathField::Dotted("python3.pkgs.requests".to_string())),
        ..ManifestDescriptorRaw::default()
    };

    let parsed = ManifestDescriptor::from_raw("requests", Some(&raw)).unwrap();

    assert_eq!(parsed.name, None);
    assert_eq!(parsed.pkg_path, Some(vec![
        "python3".to_string(),
        "pkgs".to_string(),
        "requests".to_string(),
    ]));
}

#[rstest]
#[case(PkgPathField::Dotted("a.b.c".to_string()), vec!["a", "b", "c"])]
#[case(PkgPathField::Components(vec!["a".to_string(), "b.c".to_string()]), vec!["a", "b.c"])]
fn test_pkg_path_forms(#[case] field: PkgPathField, #[case] expected: Vec<&str>) {
    assert_eq!(field.components(), expected);
}

#[test]
fn test_invalid_semver_range_is_rejected() {
    let raw = ManifestDescriptorRaw {
        semver: Some("not a range".to_string()),
        ..ManifestDescriptorRaw::default()
    };

    assert!(ManifestDescriptor::from_raw("hello", Some(&raw)).is_err());
}

#[test]
fn test_excludes_system() {
    let mut restricted = descriptor("hello");
    restricted.systems = Some(vec![sys("x86_64-linux")]);

    assert!(!restricted.excludes_system(&sys("x86_64-linux")));
    assert!(restricted.excludes_system(&sys("aarch64-darwin")));

    // No restriction excludes nothing.
    assert!(!descriptor("hello").excludes_system(&sys("aarch64-darwin")));
}

#[test]
fn test_same_package_ignores_behavioral_fields() {
    let base = descriptor("hello");

    let mut behavioral = base.clone();
    behavioral.optional = true;
    behavioral.group = Some("red".to_string());
    behavioral.priority = 9;
    behavioral.systems = Some(vec![sys("x86_64-linux")]);

    assert!(base.same_package(&behavioral));
    assert!(!base.same_lock_keys(&behavioral));
}

#[rstest]
#[case({ let mut d = descriptor("hello"); d.version = Some("2.12".to_string()); d })]
#[case({ let mut d = descriptor("hello"); d.semver = Some("^2".to_string()); d })]
#[case({ let mut d = descriptor("hello"); d.subtree = Some("packages".to_string()); d })]
#[case({ let mut d = descriptor("hello"); d.input = Some("nixpkgs".to_string()); d })]
#[case({ let mut d = descriptor("hello"); d.pkg_path = Some(vec!["hello".to_string()]); d })]
#[case(descriptor("world"))]
fn test_same_package_notices_identity_fields(#[case] changed: ManifestDescriptor) {
    assert!(!descriptor("hello").same_package(&changed));
}

#[test]
fn test_same_lock_keys_ignores_priority_and_systems() {
    let base = descriptor("hello");

    let mut changed = base.clone();
    changed.priority = 100;
    changed.systems = Some(vec![sys("x86_64-linux")]);

    assert!(base.same_lock_keys(&changed));
}
