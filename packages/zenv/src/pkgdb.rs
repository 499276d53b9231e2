use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zenv_primitives::{InputRef, LockedInputRef, ManifestDescriptor, System};

use crate::error::Error;
use crate::manifest::{parse_json_file, Options};

#[cfg(test)]
#[path = "./pkgdb.test.rs"]
mod pkgdb_tests;

/// Identifies one row of a package database for the duration of a
/// resolution run.
pub type RowId = u64;

/// The arguments of one package query: the merged option baseline,
/// input defaults, and descriptor criteria, layered in that order.
#[derive(Clone, Debug, PartialEq)]
pub struct PkgQueryArgs {
    pub name: Option<String>,
    pub pkg_path: Option<Vec<String>>,
    pub version: Option<String>,
    pub semver: Option<String>,
    pub subtrees: Option<Vec<String>>,
    pub systems: Vec<System>,
    pub allow_unfree: bool,
    pub allow_broken: bool,
    pub licenses: Option<Vec<String>>,
    pub prefer_pre_releases: bool,
}

impl Default for PkgQueryArgs {
    fn default() -> PkgQueryArgs {
        PkgQueryArgs {
            name: None,
            pkg_path: None,
            version: None,
            semver: None,
            subtrees: None,
            systems: Vec::new(),
            allow_unfree: true,
            allow_broken: false,
            licenses: None,
            prefer_pre_releases: false,
        }
    }
}

impl PkgQueryArgs {
    /// The base query arguments projected from merged options.
    pub fn from_options(options: &Options) -> PkgQueryArgs {
        let allow
            = options.allow.clone().unwrap_or_default();
        let semver
            = options.semver.clone().unwrap_or_default();

        PkgQueryArgs {
            allow_unfree: allow.unfree.unwrap_or(true),
            allow_broken: allow.broken.unwrap_or(false),
            licenses: allow.licenses,
            prefer_pre_releases: semver.prefer_pre_releases.unwrap_or(false),
            ..PkgQueryArgs::default()
        }
    }

    /// Layers a descriptor's match criteria over the current arguments.
    pub fn fill_from_descriptor(&mut self, descriptor: &ManifestDescriptor) {
        if descriptor.name.is_some() {
            self.name = descriptor.name.clone();
        }
        if descriptor.pkg_path.is_some() {
            self.pkg_path = descriptor.pkg_path.clone();
        }
        if descriptor.version.is_some() {
            self.version = descriptor.version.clone();
        }
        if descriptor.semver.is_some() {
            self.semver = descriptor.semver.clone();
        }
        if let Some(subtree) = &descriptor.subtree {
            self.subtrees = Some(vec![subtree.clone()]);
        }
    }
}

/// The read-only contract a scraped package database satisfies.
///
/// `query` must be deterministic for identical arguments and contents;
/// its ranking is the database's documented one and is not re-ranked by
/// callers.
pub trait PackageDb {
    /// Ensures the given systems are indexed before querying.
    fn scrape_systems(&self, systems: &[System]) -> Result<(), Error>;

    /// Matching rows, best match first.
    fn query(&self, args: &PkgQueryArgs) -> Result<Vec<RowId>, Error>;

    /// The full payload of one row.
    fn get_package(&self, row: RowId) -> Result<Map<String, Value>, Error>;
}

/// A registry input with its database opened: what resolution actually
/// runs against.
#[derive(Clone)]
pub struct PkgDbInput {
    pub name: Option<String>,
    pub locked_ref: LockedInputRef,
    pub subtrees: Option<Vec<String>>,
    pub db: Arc<dyn PackageDb>,
}

impl PkgDbInput {
    /// Layers this input's defaults over the base query arguments.
    pub fn fill_query_args(&self, args: &mut PkgQueryArgs) {
        if args.subtrees.is_none() {
            args.subtrees = self.subtrees.clone();
        }
    }
}

/// Opens the package database behind a locked input reference.
pub trait DbProvider {
    fn open(&self, name: Option<&str>, locked: &LockedInputRef) -> Result<Arc<dyn PackageDb>, Error>;
}

/// One scraped package: its catalog position plus whatever metadata the
/// scraper recorded.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRow {
    pub abs_path: Vec<String>,
    pub subtree: String,
    pub system: System,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pname: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken: Option<bool>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfree: Option<bool>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogRow {
    /// The attribute path relative to its subtree and system prefix.
    pub fn rel_path(&self) -> &[String] {
        self.abs_path.get(2..).unwrap_or(&[])
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CatalogFile {
    #[serde(default)]
    systems: Vec<System>,

    #[serde(default)]
    packages: Vec<CatalogRow>,
}

/// An in-memory package database backed by a scraped catalog.
#[derive(Debug)]
pub struct CatalogDb {
    systems: Vec<System>,
    rows: Vec<CatalogRow>,
}

impl CatalogDb {
    pub fn new(systems: Vec<System>, rows: Vec<CatalogRow>) -> CatalogDb {
        CatalogDb { systems, rows }
    }

    pub fn from_file(path: &Path) -> Result<CatalogDb, Error> {
        let file: CatalogFile
            = parse_json_file(path)?;

        let systems = match file.systems.is_empty() {
            true => file.packages.iter()
                .map(|row| row.system.clone())
                .unique()
                .collect(),
            false => file.systems,
        };

        Ok(CatalogDb::new(systems, file.packages))
    }

    fn matches(&self, row: &CatalogRow, args: &PkgQueryArgs) -> bool {
        if !args.systems.contains(&row.system) {
            return false;
        }

        if let Some(subtrees) = &args.subtrees {
            if !subtrees.contains(&row.subtree) {
                return false;
            }
        }

        if let Some(name) = &args.name {
            let basename
                = row.rel_path().last();

            if row.pname.as_ref() != Some(name) && basename != Some(name) {
                return false;
            }
        }

        if let Some(pkg_path) = &args.pkg_path {
            if row.rel_path() != pkg_path.as_slice() {
                return false;
            }
        }

        if let Some(version) = &args.version {
            if row.version.as_ref() != Some(version) {
                return false;
            }
        }

        if let Some(range) = &args.semver {
            let Ok(range) = semver::VersionReq::parse(range) else {
                return false;
            };

            let version = row.version.as_deref()
                .and_then(|version| semver::Version::parse(version).ok());

            let Some(version) = version else {
                return false;
            };

            if !range.matches(&version) {
                return false;
            }
        }

        if !args.allow_unfree && row.unfree == Some(true) {
            return false;
        }

        if !args.allow_broken && row.broken == Some(true) {
            return false;
        }

        if let Some(licenses) = &args.licenses {
            if let Some(license) = &row.license {
                if !licenses.contains(license) {
                    return false;
                }
            }
        }

        true
    }

    /// The documented rank: best version first (semver before
    /// non-semver, releases before pre-releases unless requested
    /// otherwise), then attribute path, then subtree precedence.
    fn rank(&self, first: &CatalogRow, second: &CatalogRow, args: &PkgQueryArgs) -> Ordering {
        compare_versions(first.version.as_deref(), second.version.as_deref(), args.prefer_pre_releases)
            .then_with(|| first.rel_path().cmp(second.rel_path()))
            .then_with(|| subtree_precedence(&first.subtree, args).cmp(&subtree_precedence(&second.subtree, args)))
    }
}

impl PackageDb for CatalogDb {
    fn scrape_systems(&self, systems: &[System]) -> Result<(), Error> {
        for system in systems {
            if !self.systems.contains(system) {
                return Err(Error::SystemNotScraped(system.clone()));
            }
        }

        Ok(())
    }

    fn query(&self, args: &PkgQueryArgs) -> Result<Vec<RowId>, Error> {
        let rows = self.rows.iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row, args))
            .sorted_by(|(_, first), (_, second)| self.rank(first, second, args))
            .map(|(id, _)| id as RowId)
            .collect();

        Ok(rows)
    }

    fn get_package(&self, row: RowId) -> Result<Map<String, Value>, Error> {
        let catalog_row = self.rows.get(row as usize)
            .ok_or(Error::Internal("package row out of bounds"))?;

        let value
            = serde_json::to_value(catalog_row)?;

        let Value::Object(mut payload) = value else {
            return Err(Error::Internal("catalog row did not serialize to an object"));
        };

        payload.insert("relPath".to_string(), serde_json::to_value(catalog_row.rel_path())?);
        payload.insert("id".to_string(), Value::from(row));

        Ok(payload)
    }
}

fn compare_versions(first: Option<&str>, second: Option<&str>, prefer_pre_releases: bool) -> Ordering {
    let parsed_first
        = first.and_then(|version| semver::Version::parse(version).ok());
    let parsed_second
        = second.and_then(|version| semver::Version::parse(version).ok());

    match (parsed_first, parsed_second) {
        (Some(first), Some(second)) => {
            if !prefer_pre_releases {
                let first_is_release = first.pre.is_empty();
                let second_is_release = second.pre.is_empty();

                if first_is_release != second_is_release {
                    return match first_is_release {
                        true => Ordering::Less,
                        false => Ordering::Greater,
                    };
                }
            }

            second.cmp(&first)
        },

        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,

        (None, None) => second.unwrap_or("").cmp(first.unwrap_or("")),
    }
}

fn subtree_precedence(subtree: &str, args: &PkgQueryArgs) -> usize {
    args.subtrees.as_ref()
        .and_then(|subtrees| subtrees.iter().position(|candidate| candidate == subtree))
        .unwrap_or(usize::MAX)
}

/// The catalog file behind a `path:` input: the path itself when it is
/// a file, `<path>/catalog.json` when it is a directory.
pub fn catalog_file(path: &Path) -> PathBuf {
    match path.is_dir() {
        true => path.join("catalog.json"),
        false => path.to_path_buf(),
    }
}

/// Opens catalogs scraped to disk: `path:` inputs read their catalog in
/// place, git-backed inputs read `<cache_dir>/<rev>.json`. This layer
/// never fetches; a missing catalog means the scraper has not run.
pub struct CatalogProvider {
    cache_dir: PathBuf,
}

impl CatalogProvider {
    pub fn new<P: Into<PathBuf>>(cache_dir: P) -> CatalogProvider {
        CatalogProvider { cache_dir: cache_dir.into() }
    }
}

impl DbProvider for CatalogProvider {
    fn open(&self, name: Option<&str>, locked: &LockedInputRef) -> Result<Arc<dyn PackageDb>, Error> {
        let input
            = InputRef::from_str(&locked.url)?;

        let file = match &input {
            InputRef::Path { path, .. } => catalog_file(Path::new(path)),
            _ => self.cache_dir.join(format!("{}.json", locked.rev)),
        };

        if !file.exists() {
            return Err(Error::CatalogNotFound {
                input: name.unwrap_or(&locked.url).to_string(),
                path: file,
            });
        }

        Ok(Arc::new(CatalogDb::from_file(&file)?))
    }
}
