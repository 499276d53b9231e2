use serde::{Deserialize, Serialize};

use crate::System;

#[cfg(test)]
#[path = "./descriptor.test.rs"]
mod descriptor_tests;

/// The manifest-unique key identifying an install descriptor.
pub type InstallId = String;

/// The name of a group of descriptors resolved against a single input.
pub type GroupName = String;

pub const DEFAULT_GROUP: &str = "default";
pub const DEFAULT_PRIORITY: u64 = 5;

#[derive(thiserror::Error, Clone, Debug)]
pub enum DescriptorError {
    #[error("Invalid semver range for '{0}' ({1})")]
    InvalidSemverRange(InstallId, String),
}

/// The `pkg-path` manifest field, accepted either as a dotted string or
/// as a list of attribute components.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PkgPathField {
    Dotted(String),
    Components(Vec<String>),
}

impl PkgPathField {
    pub fn components(&self) -> Vec<String> {
        match self {
            PkgPathField::Dotted(path) => path.split('.').map(str::to_string).collect(),
            PkgPathField::Components(components) => components.clone(),
        }
    }
}

/// An install descriptor as written in the manifest. `install.<iid>` may
/// also be `null`, which stands for `{ "name": "<iid>" }`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ManifestDescriptorRaw {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkg_path: Option<PkgPathField>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semver: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtree: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupName>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systems: Option<Vec<System>>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u64>,
}

/// A declared request for a package, with manifest defaults applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestDescriptor {
    pub name: Option<String>,
    pub pkg_path: Option<Vec<String>>,
    pub version: Option<String>,
    pub semver: Option<String>,
    pub subtree: Option<String>,
    pub input: Option<String>,
    pub group: Option<GroupName>,
    pub systems: Option<Vec<System>>,
    pub optional: bool,
    pub priority: u64,
}

impl ManifestDescriptor {
    pub fn from_raw(iid: &str, raw: Option<&ManifestDescriptorRaw>) -> Result<ManifestDescriptor, DescriptorError> {
        let raw = raw.cloned().unwrap_or_default();

        if let Some(semver) = &raw.semver {
            semver::VersionReq::parse(semver)
                .map_err(|_| DescriptorError::InvalidSemverRange(iid.to_string(), semver.clone()))?;
        }

        let pkg_path
            = raw.pkg_path.as_ref().map(PkgPathField::components);

        // A descriptor with no match criteria requests the package named
        // after its install id.
        let name = match raw.name.is_none() && pkg_path.is_none() {
            true => Some(iid.to_string()),
            false => raw.name,
        };

        Ok(ManifestDescriptor {
            name,
            pkg_path,
            version: raw.version,
            semver: raw.semver,
            subtree: raw.subtree,
            input: raw.input,
            group: raw.group,
            systems: raw.systems,
            optional: raw.optional.unwrap_or(false),
            priority: raw.priority.unwrap_or(DEFAULT_PRIORITY),
        })
    }

    pub fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or(DEFAULT_GROUP)
    }

    /// True when a `systems` restriction is present and `system` is not
    /// in it.
    pub fn excludes_system(&self, system: &System) -> bool {
        self.systems.as_ref()
            .is_some_and(|systems| !systems.contains(system))
    }

    /// True when `other` requests the same package: every field that
    /// controls what the package *is* compares equal. `optional`,
    /// `systems`, `group`, and `priority` change behavior around the
    /// package without changing the package itself.
    pub fn same_package(&self, other: &ManifestDescriptor) -> bool {
        self.name == other.name
            && self.pkg_path == other.pkg_path
            && self.version == other.version
            && self.semver == other.semver
            && self.subtree == other.subtree
            && self.input == other.input
    }

    /// True when a prior lock of `other` still satisfies this
    /// descriptor, `systems` handling aside.
    pub fn same_lock_keys(&self, other: &ManifestDescriptor) -> bool {
        self.same_package(other)
            && self.group == other.group
            && self.optional == other.optional
    }
}
