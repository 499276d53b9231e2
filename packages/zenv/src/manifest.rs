use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use zenv_primitives::{GroupName, InstallId, ManifestDescriptor, ManifestDescriptorRaw, System};

use crate::{error::Error, registry::RegistryRaw};

#[cfg(test)]
#[path = "./manifest.test.rs"]
mod manifest_tests;

/// The descriptor table of a manifest, in declaration order.
pub type InstallDescriptors = IndexMap<InstallId, ManifestDescriptor>;

/// Descriptors partitioned by group, groups in order of first
/// appearance. Each group resolves atomically against a single input.
pub type Groups = IndexMap<GroupName, InstallDescriptors>;

/// Options steering package queries. Merging clobbers key by key, so a
/// higher-authority manifest can override a single knob without
/// restating the rest.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Options {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<Allows>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semver: Option<SemverOptions>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Allows {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfree: Option<bool>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken: Option<bool>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SemverOptions {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_pre_releases: Option<bool>,
}

impl Options {
    /// Overlays `other` onto `self`, key by key. Only keys `other`
    /// actually sets are clobbered.
    pub fn merge(&mut self, other: &Options) {
        if let Some(other_allow) = &other.allow {
            let allow = self.allow.get_or_insert_with(Allows::default);

            if other_allow.unfree.is_some() {
                allow.unfree = other_allow.unfree;
            }
            if other_allow.broken.is_some() {
                allow.broken = other_allow.broken;
            }
            if other_allow.licenses.is_some() {
                allow.licenses = other_allow.licenses.clone();
            }
        }

        if let Some(other_semver) = &other.semver {
            let semver = self.semver.get_or_insert_with(SemverOptions::default);

            if other_semver.prefer_pre_releases.is_some() {
                semver.prefer_pre_releases = other_semver.prefer_pre_releases;
            }
        }
    }
}

/// An environment manifest as authored, carried verbatim into the
/// lockfile.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestRaw {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryRaw>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<IndexMap<InstallId, Option<ManifestDescriptorRaw>>>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systems: Option<Vec<System>>,
}

impl ManifestRaw {
    pub fn registry_raw(&self) -> RegistryRaw {
        self.registry.clone().unwrap_or_default()
    }

    /// Builds the typed descriptor table, applying per-descriptor
    /// defaults in declaration order.
    pub fn descriptors(&self) -> Result<InstallDescriptors, Error> {
        let mut descriptors = InstallDescriptors::new();

        if let Some(install) = &self.install {
            for (iid, raw) in install {
                let descriptor
                    = ManifestDescriptor::from_raw(iid, raw.as_ref())?;

                descriptors.insert(iid.clone(), descriptor);
            }
        }

        Ok(descriptors)
    }
}

/// Baseline registry and options shared by every environment on a
/// machine. Same schema as the manifest minus `install` and `systems`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalManifestRaw {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryRaw>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
}

impl GlobalManifestRaw {
    pub fn registry_raw(&self) -> RegistryRaw {
        self.registry.clone().unwrap_or_default()
    }

    pub fn from_file(path: &Path) -> Result<GlobalManifestRaw, Error> {
        parse_json_file(path)
    }
}

/// A validated manifest: the raw document plus its typed descriptor
/// table.
#[derive(Clone, Debug)]
pub struct Manifest {
    raw: ManifestRaw,
    descriptors: InstallDescriptors,
}

impl Manifest {
    pub fn new(raw: ManifestRaw) -> Result<Manifest, Error> {
        let descriptors = raw.descriptors()?;

        Ok(Manifest { raw, descriptors })
    }

    pub fn from_file(path: &Path) -> Result<Manifest, Error> {
        if !path.exists() {
            return Err(Error::ManifestNotFound(path.to_path_buf()));
        }

        Manifest::new(parse_json_file(path)?)
    }

    pub fn raw(&self) -> &ManifestRaw {
        &self.raw
    }

    pub fn descriptors(&self) -> &InstallDescriptors {
        &self.descriptors
    }

    /// The systems to resolve for; a manifest that names none targets
    /// the host system.
    pub fn systems(&self) -> Vec<System> {
        self.raw.systems.clone()
            .unwrap_or_else(|| vec![System::current()])
    }

    /// Partitions the descriptor table by group name.
    pub fn grouped_descriptors(&self) -> Groups {
        let mut groups = Groups::new();

        for (iid, descriptor) in &self.descriptors {
            groups.entry(descriptor.group_name().to_string())
                .or_default()
                .insert(iid.clone(), descriptor.clone());
        }

        groups
    }
}

pub(crate) fn parse_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let text = fs::read_to_string(path)
        .map_err(|inner| Error::FileReadError {
            path: path.to_path_buf(),
            inner: Arc::new(inner),
        })?;

    Ok(serde_json::from_str(&text)?)
}
