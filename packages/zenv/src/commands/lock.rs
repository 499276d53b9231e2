use std::path::PathBuf;

use clap::Args;

use crate::error::Error;
use crate::lockfile::Lockfile;
use crate::manifest::{GlobalManifestRaw, Manifest};
use crate::pkgdb::CatalogProvider;
use crate::registry::GitCliLocker;
use crate::report;
use crate::resolve::{Resolver, UpgradeSelector};

pub const LOCKFILE_NAME: &str = "manifest.lock";

#[derive(Args)]
pub struct LockArgs {
    /// Path to the environment manifest.
    #[arg(long, default_value = "manifest.json")]
    pub manifest: PathBuf,

    /// Path to a global manifest supplying baseline registry and
    /// options.
    #[arg(long)]
    pub global_manifest: Option<PathBuf>,

    /// Path of the lockfile to read pins from and write to. Defaults to
    /// `manifest.lock` next to the manifest.
    #[arg(long)]
    pub lockfile: Option<PathBuf>,

    /// Directory holding scraped catalogs, keyed by revision.
    #[arg(long, default_value = ".zenv/catalogs")]
    pub catalog_dir: PathBuf,

    /// Print the lockfile to stdout instead of writing it.
    #[arg(long)]
    pub no_write: bool,
}

impl LockArgs {
    pub fn lockfile_path(&self) -> PathBuf {
        self.lockfile.clone()
            .unwrap_or_else(|| self.manifest.with_file_name(LOCKFILE_NAME))
    }

    pub fn read_manifest(&self) -> Result<Manifest, Error> {
        Manifest::from_file(&self.manifest)
    }

    pub fn read_global_manifest(&self) -> Result<Option<GlobalManifestRaw>, Error> {
        self.global_manifest.as_deref()
            .map(GlobalManifestRaw::from_file)
            .transpose()
    }

    pub fn read_old_lockfile(&self) -> Result<Option<Lockfile>, Error> {
        let path = self.lockfile_path();

        match path.exists() {
            true => Ok(Some(Lockfile::from_file(&path)?)),
            false => Ok(None),
        }
    }
}

pub fn run(args: LockArgs) -> Result<(), Error> {
    lock_with(args, UpgradeSelector::default())
}

pub(crate) fn lock_with(args: LockArgs, upgrades: UpgradeSelector) -> Result<(), Error> {
    let manifest = args.read_manifest()?;
    let global_manifest = args.read_global_manifest()?;
    let old_lockfile = args.read_old_lockfile()?;

    let locker = GitCliLocker;
    let provider = CatalogProvider::new(args.catalog_dir.clone());

    let resolver = Resolver::new(
        global_manifest,
        manifest,
        old_lockfile,
        upgrades,
        &locker,
        &provider,
    )?;

    let lockfile
        = resolver.create_lockfile()?;

    if args.no_write {
        print!("{}", lockfile.to_json_string()?);
        return Ok(());
    }

    let path = args.lockfile_path();
    lockfile.write_to_file(&path)?;

    report::info(&format!("wrote {}", path.display()));

    Ok(())
}
