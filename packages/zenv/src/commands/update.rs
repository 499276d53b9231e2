use clap::Args;

use crate::commands::lock::LockArgs;
use crate::error::Error;
use crate::registry::{GitCliLocker, InputLocker};
use crate::report;

#[derive(Args)]
pub struct UpdateArgs {
    /// Inputs to refresh. With no names, every input is refreshed.
    pub inputs: Vec<String>,

    #[command(flatten)]
    pub lock: LockArgs,
}

/// Re-pins registry inputs in an existing lockfile. Packages keep their
/// current locks; groups pick up the new pins on their next upgrade.
pub fn run(args: UpdateArgs) -> Result<(), Error> {
    let manifest = args.lock.read_manifest()?;
    let global_manifest = args.lock.read_global_manifest()?;

    let path = args.lock.lockfile_path();
    let mut lockfile = match args.lock.read_old_lockfile()? {
        Some(lockfile) => lockfile,
        None => return Err(Error::LockfileNotFound(path)),
    };

    let mut registry = global_manifest.as_ref()
        .map(|global| global.registry_raw())
        .unwrap_or_default();

    registry.merge(manifest.raw().registry_raw());

    for name in &args.inputs {
        if !registry.inputs.contains_key(name) {
            return Err(Error::UnknownInput(name.clone()));
        }
    }

    let locker = GitCliLocker;
    let prior = lockfile.registry().clone();

    for (name, input) in registry.inputs.iter_mut() {
        let refresh
            = args.inputs.is_empty() || args.inputs.contains(name);

        if !refresh {
            let pinned = prior.inputs.get(name)
                .filter(|prior_input| prior_input.from.is_locked());

            if let Some(pinned) = pinned {
                input.from = pinned.from.clone();
                continue;
            }
        }

        input.from = locker.lock(name, &input.from)?;
    }

    lockfile.set_registry(registry);
    lockfile.write_to_file(&path)?;

    report::info(&format!("wrote {}", path.display()));

    Ok(())
}
