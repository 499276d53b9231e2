use std::path::{Path, PathBuf};

use clap::Args;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Error;
use crate::manifest::{parse_json_file, ManifestRaw};

#[cfg(test)]
#[path = "./diff.test.rs"]
mod diff_tests;

#[derive(Args)]
pub struct DiffArgs {
    /// Path to the environment manifest.
    #[arg(long, default_value = "manifest.json")]
    pub manifest: PathBuf,

    /// Path to the manifest to compare against.
    #[arg(long)]
    pub old_manifest: PathBuf,
}

/// Per-key changes between two maps of the same shape, keys sorted.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct KeyChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

/// A structural comparison of two manifests. This looks at the raw
/// documents only; nothing here consults the registry, the resolver,
/// or a lockfile.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestDiff {
    pub install: KeyChanges,
    pub registry: KeyChanges,
    pub options_changed: bool,
    pub systems_changed: bool,
}

fn key_changes<V: PartialEq>(old: &IndexMap<String, V>, new: &IndexMap<String, V>) -> KeyChanges {
    let mut changes = KeyChanges::default();

    for (key, value) in new {
        match old.get(key) {
            None => changes.added.push(key.clone()),
            Some(old_value) if old_value != value => changes.changed.push(key.clone()),
            Some(_) => {},
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            changes.removed.push(key.clone());
        }
    }

    changes.added.sort();
    changes.removed.sort();
    changes.changed.sort();

    changes
}

pub fn diff_manifests(old: &ManifestRaw, new: &ManifestRaw) -> ManifestDiff {
    let empty = IndexMap::new();

    let old_install = old.install.as_ref().unwrap_or(&empty);
    let new_install = new.install.as_ref().unwrap_or(&empty);

    let old_registry = old.registry_raw();
    let new_registry = new.registry_raw();

    ManifestDiff {
        install: key_changes(old_install, new_install),
        registry: key_changes(&old_registry.inputs, &new_registry.inputs),
        options_changed: old.options != new.options,
        systems_changed: old.systems != new.systems,
    }
}

fn read_manifest_raw(path: &Path) -> Result<ManifestRaw, Error> {
    if !path.exists() {
        return Err(Error::ManifestNotFound(path.to_path_buf()));
    }

    parse_json_file(path)
}

pub fn run(args: DiffArgs) -> Result<(), Error> {
    let old = read_manifest_raw(&args.old_manifest)?;
    let new = read_manifest_raw(&args.manifest)?;

    let diff = diff_manifests(&old, &new);

    println!("{}", serde_json::to_string_pretty(&diff)?);

    Ok(())
}
