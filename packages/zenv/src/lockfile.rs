use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use zenv_primitives::{InstallId, LockedInputRef, System};

use crate::error::Error;
use crate::manifest::{parse_json_file, InstallDescriptors, ManifestRaw};
use crate::registry::{RegistryInput, RegistryRaw};

#[cfg(test)]
#[path = "./lockfile.test.rs"]
mod lockfile_tests;

pub const LOCKFILE_VERSION: u64 = 1;

/// One resolved package: the locked input that provides it, where it
/// lives in that input's catalog, and the catalog metadata worth
/// keeping.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LockedPackage {
    pub input: LockedInputRef,
    pub attr_path: Vec<String>,
    pub priority: u64,
    pub info: Map<String, Value>,
}

/// Per-system resolution results. `None` marks a descriptor that is
/// optional-and-unresolved or excluded from this system.
pub type SystemPackages = BTreeMap<InstallId, Option<LockedPackage>>;

/// The lockfile document: the manifest it was resolved from (verbatim),
/// the locked registry, and the per-system packages.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LockfileRaw {
    #[serde(default = "default_lockfile_version")]
    pub lockfile_version: u64,

    #[serde(default)]
    pub manifest: ManifestRaw,

    #[serde(default)]
    #[serde(serialize_with = "serialize_registry_sorted")]
    pub registry: RegistryRaw,

    #[serde(default)]
    pub packages: BTreeMap<System, SystemPackages>,
}

fn default_lockfile_version() -> u64 {
    LOCKFILE_VERSION
}

impl Default for LockfileRaw {
    fn default() -> LockfileRaw {
        LockfileRaw {
            lockfile_version: LOCKFILE_VERSION,
            manifest: ManifestRaw::default(),
            registry: RegistryRaw::default(),
            packages: BTreeMap::new(),
        }
    }
}

/// The registry keeps declaration order in memory (it drives input
/// trying order), but the emitted lockfile is canonical: keys sorted.
fn serialize_registry_sorted<S: Serializer>(registry: &RegistryRaw, serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Sorted<'a> {
        inputs: BTreeMap<&'a String, &'a RegistryInput>,
    }

    Sorted {
        inputs: registry.inputs.iter().collect(),
    }.serialize(serializer)
}

/// A parsed lockfile: the raw document plus the descriptor table of its
/// embedded manifest, used for lock-equivalence checks.
#[derive(Clone, Debug)]
pub struct Lockfile {
    raw: LockfileRaw,
    descriptors: InstallDescriptors,
}

impl Lockfile {
    pub fn new(raw: LockfileRaw) -> Result<Lockfile, Error> {
        let descriptors = raw.manifest.descriptors()?;

        Ok(Lockfile { raw, descriptors })
    }

    pub fn from_file(path: &Path) -> Result<Lockfile, Error> {
        if !path.exists() {
            return Err(Error::LockfileNotFound(path.to_path_buf()));
        }

        Lockfile::new(parse_json_file(path)?)
    }

    pub fn raw(&self) -> &LockfileRaw {
        &self.raw
    }

    /// The descriptor table the lockfile was resolved from.
    pub fn descriptors(&self) -> &InstallDescriptors {
        &self.descriptors
    }

    pub fn registry(&self) -> &RegistryRaw {
        &self.raw.registry
    }

    pub fn set_registry(&mut self, registry: RegistryRaw) {
        self.raw.registry = registry;
    }

    /// Drops registry inputs no locked package references.
    pub fn remove_unused_inputs(&mut self) {
        let used: BTreeSet<LockedInputRef> = self.raw.packages
            .values()
            .flat_map(BTreeMap::values)
            .flatten()
            .map(|package| package.input.clone())
            .collect();

        self.raw.registry.inputs.retain(|_, input| {
            input.from.locked()
                .is_some_and(|locked| used.contains(&locked))
        });
    }

    /// The canonical serialized form: pretty JSON, maps sorted by key,
    /// trailing newline.
    pub fn to_json_string(&self) -> Result<String, Error> {
        let mut rendered
            = serde_json::to_string_pretty(&self.raw)?;

        rendered.push('\n');

        Ok(rendered)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, self.to_json_string()?)
            .map_err(|inner| Error::FileWriteError {
                path: path.to_path_buf(),
                inner: Arc::new(inner),
            })
    }
}
