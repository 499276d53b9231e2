//! Terse fixture builders shared by test modules across the workspace.

use std::str::FromStr;

use crate::{InputRef, LockedInputRef, ManifestDescriptor, System};

pub fn sys(system: &str) -> System {
    System::new(system)
}

/// A descriptor requesting `name`, everything else defaulted.
pub fn descriptor(name: &str) -> ManifestDescriptor {
    ManifestDescriptor::from_raw(name, None).unwrap()
}

pub fn input_ref(url: &str) -> InputRef {
    InputRef::from_str(url).unwrap()
}

pub fn locked_ref(url: &str) -> LockedInputRef {
    input_ref(url).locked().unwrap()
}
