//! Test collaborators: a locker answering from canned pins and a
//! provider serving in-memory catalogs. No subprocesses, no disk.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Map;
use zenv_primitives::{InputRef, LockedInputRef, System};

use crate::error::Error;
use crate::lockfile::Lockfile;
use crate::manifest::Manifest;
use crate::pkgdb::{CatalogDb, CatalogRow, DbProvider, PackageDb};
use crate::registry::InputLocker;

/// Locks inputs from a fixed url-to-revision table, recording which
/// names it was asked to lock.
#[derive(Default)]
pub struct PinnedLocker {
    pins: BTreeMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl PinnedLocker {
    pub fn new() -> PinnedLocker {
        PinnedLocker::default()
    }

    pub fn with_pin(mut self, url: &str, rev: &str) -> PinnedLocker {
        self.pins.insert(url.to_string(), rev.to_string());
        self
    }

    /// The names this locker was actually asked to lock.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl InputLocker for PinnedLocker {
    fn lock(&self, name: &str, input: &InputRef) -> Result<InputRef, Error> {
        if input.is_locked() {
            return Ok(input.clone());
        }

        self.calls.lock().unwrap().push(name.to_string());

        match self.pins.get(&input.url()) {
            Some(rev) => Ok(input.pin(rev)),
            None => Err(Error::InputLockingFailed(name.to_string(), "no pin registered".to_string())),
        }
    }
}

/// Serves catalogs from memory, keyed by locked input url.
#[derive(Default)]
pub struct StaticProvider {
    catalogs: BTreeMap<String, Arc<CatalogDb>>,
}

impl StaticProvider {
    pub fn new() -> StaticProvider {
        StaticProvider::default()
    }

    pub fn with_catalog(mut self, url: &str, db: CatalogDb) -> StaticProvider {
        self.catalogs.insert(url.to_string(), Arc::new(db));
        self
    }
}

impl DbProvider for StaticProvider {
    fn open(&self, name: Option<&str>, locked: &LockedInputRef) -> Result<Arc<dyn PackageDb>, Error> {
        match self.catalogs.get(&locked.url) {
            Some(db) => Ok(db.clone()),

            None => Err(Error::CatalogNotFound {
                input: name.unwrap_or(&locked.url).to_string(),
                path: PathBuf::from(&locked.url),
            }),
        }
    }
}

/// A catalog row for `path` at `version`, with unremarkable metadata.
pub fn row(system: &str, subtree: &str, path: &[&str], version: &str) -> CatalogRow {
    let abs_path = [subtree, system].iter()
        .chain(path)
        .map(|part| part.to_string())
        .collect();

    CatalogRow {
        abs_path,
        subtree: subtree.to_string(),
        system: System::new(system),
        pname: path.last().map(|name| name.to_string()),
        version: Some(version.to_string()),
        broken: Some(false),
        unfree: Some(false),
        license: None,
        description: None,
        extra: Map::new(),
    }
}

pub fn catalog(systems: &[&str], rows: Vec<CatalogRow>) -> CatalogDb {
    let systems
        = systems.iter().map(System::new).collect();

    CatalogDb::new(systems, rows)
}

pub fn manifest(value: serde_json::Value) -> Manifest {
    Manifest::new(serde_json::from_value(value).unwrap()).unwrap()
}

pub fn lockfile(value: serde_json::Value) -> Lockfile {
    Lockfile::new(serde_json::from_value(value).unwrap()).unwrap()
}
