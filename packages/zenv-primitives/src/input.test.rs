use std::str::FromStr;

use rstest::rstest;

use crate::{is_revision, InputRef};

const REV: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

#[rstest]
#[case("github:NixOS/nixpkgs")]
#[case("github:NixOS/nixpkgs/master")]
#[case("git+https://example.com/pkgs.git")]
#[case("git+https://example.com/pkgs.git#main")]
#[case("path:./catalog")]
fn test_input_ref_round_trip(#[case] url: &str) {
    let input = InputRef::from_str(url).unwrap();

    assert_eq!(input.url(), url);
    assert!(!input.is_locked());
}

#[rstest]
#[case("nixpkgs")]
#[case("github:")]
#[case("github:NixOS")]
#[case("git+")]
#[case("path:")]
fn test_input_ref_rejects(#[case] url: &str) {
    assert!(InputRef::from_str(url).is_err());
}

#[test]
fn test_github_treeish_is_parsed_as_revision_when_it_looks_like_one() {
    let input
        = InputRef::from_str(&format!("github:NixOS/nixpkgs/{}", REV)).unwrap();

    assert!(input.is_locked());
    assert_eq!(input.locked().unwrap().rev, REV);
}

#[test]
fn test_git_treeish_is_parsed_as_revision_when_it_looks_like_one() {
    let input
        = InputRef::from_str(&format!("git+https://example.com/pkgs.git#{}", REV)).unwrap();

    assert!(input.is_locked());
}

#[test]
fn test_pin_produces_a_locked_ref_with_an_embedded_revision() {
    let input = InputRef::from_str("github:NixOS/nixpkgs/master").unwrap();
    let pinned = input.pin(REV);

    assert!(pinned.is_locked());

    let locked = pinned.locked().unwrap();
    assert_eq!(locked.url, format!("github:NixOS/nixpkgs/{}", REV));
    assert_eq!(locked.rev, REV);

    // The canonical locked url parses back to the same pinned source.
    assert_eq!(locked.to_input_ref().unwrap().locked().unwrap(), locked);
}

#[test]
fn test_pin_path_sets_a_fingerprint() {
    let input = InputRef::from_str("path:./catalog").unwrap();
    let pinned = input.pin("0123abcd");

    assert!(pinned.is_locked());
    assert_eq!(pinned.url(), "path:./catalog#0123abcd");
    assert_eq!(pinned.locked().unwrap().rev, "0123abcd");
}

#[test]
fn test_unlocked_ref_has_no_locked_projection() {
    let input = InputRef::from_str("github:NixOS/nixpkgs").unwrap();

    assert_eq!(input.locked(), None);
}

#[rstest]
#[case(REV, true)]
#[case("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", false)]
#[case("main", false)]
#[case("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", false)]
fn test_is_revision(#[case] treeish: &str, #[case] expected: bool) {
    assert_eq!(is_revision(treeish), expected);
}

#[test]
fn test_serde_round_trip_preserves_lock_status() {
    let pinned
        = InputRef::from_str("github:NixOS/nixpkgs/master").unwrap().pin(REV);

    let json = serde_json::to_string(&pinned).unwrap();
    let parsed: InputRef = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, pinned);
    assert!(json.contains("\"type\":\"github\""));
    assert!(json.contains("\"ref\":\"master\""));
}
