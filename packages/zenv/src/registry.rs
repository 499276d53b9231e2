use std::path::Path;
use std::process::Command;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use zenv_primitives::{is_revision, InputRef};

use crate::error::Error;
use crate::pkgdb::catalog_file;

#[cfg(test)]
#[path = "./registry.test.rs"]
mod registry_tests;

type Blake2b256 = Blake2b<U32>;

/// A named package source in a registry: where to fetch it from, and
/// which subtrees of its catalog to search (in precedence order).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryInput {
    pub from: InputRef,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtrees: Option<Vec<String>>,
}

/// An ordered name-to-input mapping. Order is semantic: inputs are
/// tried in registry order during resolution.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RegistryRaw {
    #[serde(default)]
    pub inputs: IndexMap<String, RegistryInput>,
}

impl RegistryRaw {
    /// Overlays `other` onto `self`. Existing names are replaced in
    /// place (keeping their position); new names append in `other`'s
    /// order.
    pub fn merge(&mut self, other: RegistryRaw) {
        for (name, input) in other.inputs {
            self.inputs.insert(name, input);
        }
    }

    /// Pins every input. Inputs still present in `prior` by name reuse
    /// the prior locked reference; everything else goes through the
    /// locker. On success every input in the registry is locked.
    pub fn lock(&mut self, prior: Option<&RegistryRaw>, locker: &dyn InputLocker) -> Result<(), Error> {
        for (name, input) in self.inputs.iter_mut() {
            let pinned = prior
                .and_then(|registry| registry.inputs.get(name))
                .filter(|prior_input| prior_input.from.is_locked());

            if let Some(pinned) = pinned {
                input.from = pinned.from.clone();
                continue;
            }

            let locked
                = locker.lock(name, &input.from)?;

            if !locked.is_locked() {
                return Err(Error::InputLockingFailed(
                    name.clone(),
                    "locker returned an unlocked reference".to_string(),
                ));
            }

            input.from = locked;
        }

        Ok(())
    }
}

/// Converts an unlocked input reference into a revision-pinned one.
/// Implementations must be idempotent: locking a locked reference
/// returns it unchanged.
pub trait InputLocker {
    fn lock(&self, name: &str, input: &InputRef) -> Result<InputRef, Error>;
}

/// Pins git-backed references with `git ls-remote` and `path:`
/// references by fingerprinting their catalog file.
pub struct GitCliLocker;

impl InputLocker for GitCliLocker {
    fn lock(&self, name: &str, input: &InputRef) -> Result<InputRef, Error> {
        if input.is_locked() {
            return Ok(input.clone());
        }

        let revision = match input {
            InputRef::Github { owner, repo, reference, .. } => {
                let url
                    = format!("https://github.com/{}/{}.git", owner, repo);

                ls_remote(name, &url, reference.as_deref())?
            },

            InputRef::Git { url, reference, .. } => {
                ls_remote(name, url, reference.as_deref())?
            },

            InputRef::Path { path, .. } => {
                fingerprint_path(name, Path::new(path))?
            },
        };

        Ok(input.pin(revision))
    }
}

fn ls_remote(name: &str, url: &str, reference: Option<&str>) -> Result<String, Error> {
    let output = Command::new("git")
        .arg("ls-remote")
        .arg(url)
        .arg(reference.unwrap_or("HEAD"))
        .output()
        .map_err(|inner| Error::InputLockingFailed(name.to_string(), inner.to_string()))?;

    if !output.status.success() {
        let stderr
            = String::from_utf8_lossy(&output.stderr).trim().to_string();

        return Err(Error::InputLockingFailed(name.to_string(), stderr));
    }

    let stdout
        = String::from_utf8_lossy(&output.stdout);

    let revision = stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .find(|candidate| is_revision(candidate));

    match revision {
        Some(revision) => Ok(revision.to_string()),

        None => Err(Error::InputLockingFailed(
            name.to_string(),
            format!("no revision found for '{}'", reference.unwrap_or("HEAD")),
        )),
    }
}

fn fingerprint_path(name: &str, path: &Path) -> Result<String, Error> {
    let file
        = catalog_file(path);

    let data = std::fs::read(&file)
        .map_err(|inner| Error::InputLockingFailed(name.to_string(), inner.to_string()))?;

    let mut hasher = Blake2b256::new();
    hasher.update(&data);

    Ok(hex::encode(hasher.finalize()))
}
