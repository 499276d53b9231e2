use clap::Args;

use crate::commands::lock::LockArgs;
use crate::error::Error;
use crate::registry::GitCliLocker;

#[derive(Args)]
pub struct RegistryArgs {
    #[command(flatten)]
    pub lock: LockArgs,
}

/// Prints the effective locked registry: global and environment
/// registries merged, prior pins applied, everything else locked.
pub fn run(args: RegistryArgs) -> Result<(), Error> {
    let manifest = args.lock.read_manifest()?;
    let global_manifest = args.lock.read_global_manifest()?;
    let old_lockfile = args.lock.read_old_lockfile()?;

    let mut registry = global_manifest.as_ref()
        .map(|global| global.registry_raw())
        .unwrap_or_default();

    registry.merge(manifest.raw().registry_raw());
    registry.lock(old_lockfile.as_ref().map(|lockfile| lockfile.registry()), &GitCliLocker)?;

    println!("{}", serde_json::to_string_pretty(&registry)?);

    Ok(())
}
