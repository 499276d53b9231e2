use std::collections::BTreeMap;

use log::{debug, info};
use zenv_primitives::{GroupName, InstallId, LockedInputRef, ManifestDescriptor, System};

use crate::error::Error;
use crate::lockfile::{LockedPackage, Lockfile, LockfileRaw, SystemPackages, LOCKFILE_VERSION};
use crate::manifest::{GlobalManifestRaw, InstallDescriptors, Manifest};
use crate::pkgdb::{DbProvider, PackageDb, PkgDbInput, PkgQueryArgs, RowId};
use crate::registry::{InputLocker, RegistryRaw};
use crate::report::{FailedAttempt, ResolutionFailure, ResolutionFailures};

#[cfg(test)]
#[path = "./resolve.test.rs"]
mod resolve_tests;

/// Which groups an invocation wants re-resolved even where the prior
/// lock would still satisfy them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeSelector {
    All,
    Groups(Vec<GroupName>),
}

impl Default for UpgradeSelector {
    fn default() -> UpgradeSelector {
        UpgradeSelector::Groups(Vec::new())
    }
}

impl UpgradeSelector {
    pub fn upgrading_group(&self, name: &str) -> bool {
        match self {
            UpgradeSelector::All => true,
            UpgradeSelector::Groups(groups) => groups.iter().any(|group| group == name),
        }
    }
}

/// Outcome of resolving one group against one input: either every
/// member resolved (or is legitimately absent), or the first install id
/// that did not. Not finding a package in one input is ordinary control
/// flow, not an error.
enum GroupResolution {
    Resolved(SystemPackages),
    FirstFailure(InstallId),
}

/// Outcome of resolving one group across every candidate input.
enum GroupOutcome {
    Resolved(SystemPackages),
    Failed(ResolutionFailure),
}

/// The resolution engine. Construction merges the registries and
/// options, locks every input, and opens and scrapes the package
/// databases; the resulting context is immutable for the lifetime of
/// the run.
pub struct Resolver<'a> {
    manifest: Manifest,
    old_lockfile: Option<Lockfile>,
    upgrades: UpgradeSelector,
    registry: RegistryRaw,
    base_query_args: PkgQueryArgs,
    inputs: Vec<PkgDbInput>,
    provider: &'a dyn DbProvider,
}

impl<'a> Resolver<'a> {
    pub fn new(
        global_manifest: Option<GlobalManifestRaw>,
        manifest: Manifest,
        old_lockfile: Option<Lockfile>,
        upgrades: UpgradeSelector,
        locker: &dyn InputLocker,
        provider: &'a dyn DbProvider,
    ) -> Result<Resolver<'a>, Error> {
        // Registries combine low to high priority, then prior pins are
        // reused for any input still present by name; the rest lock.
        let mut registry = global_manifest.as_ref()
            .map(GlobalManifestRaw::registry_raw)
            .unwrap_or_default();

        registry.merge(manifest.raw().registry_raw());
        registry.lock(old_lockfile.as_ref().map(Lockfile::registry), locker)?;

        // Options clobber key by key, in order of increasing authority.
        let mut options = global_manifest.as_ref()
            .and_then(|global| global.options.clone())
            .unwrap_or_default();

        if let Some(old_options) = old_lockfile.as_ref().and_then(|lockfile| lockfile.raw().manifest.options.as_ref()) {
            options.merge(old_options);
        }
        if let Some(manifest_options) = &manifest.raw().options {
            options.merge(manifest_options);
        }

        let base_query_args
            = PkgQueryArgs::from_options(&options);

        // Open one database per registry input and make sure the
        // manifest's systems are indexed before any query runs.
        let systems = manifest.systems();
        let mut inputs = Vec::with_capacity(registry.inputs.len());

        for (name, registry_input) in &registry.inputs {
            let locked_ref = registry_input.from.locked()
                .ok_or(Error::Internal("combined registry contains an unlocked input"))?;

            let db = provider.open(Some(name), &locked_ref)?;
            db.scrape_systems(&systems)?;

            inputs.push(PkgDbInput {
                name: Some(name.clone()),
                locked_ref,
                subtrees: registry_input.subtrees.clone(),
                db,
            });
        }

        Ok(Resolver {
            manifest,
            old_lockfile,
            upgrades,
            registry,
            base_query_args,
            inputs,
            provider,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The effective locked registry for this run.
    pub fn registry(&self) -> &RegistryRaw {
        &self.registry
    }

    /// Resolves every system and assembles the lockfile: manifest
    /// carried verbatim, locked registry attached, unused inputs pruned
    /// at the end.
    pub fn create_lockfile(&self) -> Result<Lockfile, Error> {
        let mut packages = BTreeMap::new();

        for system in self.manifest.systems() {
            let system_packages
                = self.lock_system(&system)?;

            packages.insert(system, system_packages);
        }

        let mut lockfile = Lockfile::new(LockfileRaw {
            lockfile_version: LOCKFILE_VERSION,
            manifest: self.manifest.raw().clone(),
            registry: self.registry.clone(),
            packages,
        })?;

        lockfile.remove_unused_inputs();

        Ok(lockfile)
    }

    /// Resolves one system: re-resolves every group whose prior lock no
    /// longer holds, then copies still-locked groups over from the old
    /// lockfile (with the manifest's current priority).
    ///
    /// Every group is attempted before failing so the final message
    /// names them all.
    fn lock_system(&self, system: &System) -> Result<SystemPackages, Error> {
        let groups
            = self.manifest.grouped_descriptors();

        let mut packages = SystemPackages::new();
        let mut failures = ResolutionFailures::default();

        for (name, group) in &groups {
            if self.group_is_locked(name, group, system) {
                continue;
            }

            match self.try_resolve_group(name, group, system)? {
                GroupOutcome::Resolved(resolved) => {
                    packages.extend(resolved);
                },

                GroupOutcome::Failed(failure) => {
                    // No attempts recorded means there was nothing to
                    // try: the registry is empty.
                    if failure.attempts.is_empty() {
                        return Err(Error::EmptyRegistry);
                    }

                    failures.push(failure);
                },
            }
        }

        if !failures.is_empty() {
            return Err(Error::ResolutionFailed(failures));
        }

        if let Some(old_lockfile) = &self.old_lockfile {
            if let Some(old_system_packages) = old_lockfile.raw().packages.get(system) {
                for (name, group) in &groups {
                    if !self.group_is_locked(name, group, system) {
                        continue;
                    }

                    for (iid, descriptor) in group {
                        let Some(old_entry) = old_system_packages.get(iid) else {
                            continue;
                        };

                        let mut entry = old_entry.clone();

                        if let Some(package) = &mut entry {
                            package.priority = descriptor.priority;
                        }

                        packages.insert(iid.clone(), entry);
                    }
                }
            }
        }

        Ok(packages)
    }

    /// Whether `group` is already locked satisfactorily by the old
    /// lockfile for `system`.
    fn group_is_locked(&self, name: &str, group: &InstallDescriptors, system: &System) -> bool {
        let Some(old_lockfile) = &self.old_lockfile else {
            return false;
        };

        if self.upgrades.upgrading_group(name) {
            return false;
        }

        let Some(old_system_packages) = old_lockfile.raw().packages.get(system) else {
            return false;
        };

        let old_descriptors
            = old_lockfile.descriptors();

        for (iid, descriptor) in group {
            let Some(old_descriptor) = old_descriptors.get(iid) else {
                return false;
            };

            if !descriptor.same_lock_keys(old_descriptor) {
                return false;
            }

            // `systems` edits only matter for the system being locked;
            // other systems re-resolve independently.
            if descriptor.excludes_system(system) != old_descriptor.excludes_system(system) {
                return false;
            }

            if !old_system_packages.contains_key(iid) {
                return false;
            }
        }

        true
    }

    /// The input the group was previously locked to, if any member's
    /// prior lock still describes the same package. A member whose old
    /// descriptor sat in the same group wins outright; otherwise the
    /// first wrong-group match stands in.
    fn group_input(&self, group: &InstallDescriptors, system: &System) -> Option<LockedInputRef> {
        let old_lockfile = self.old_lockfile.as_ref()?;
        let old_system_packages = old_lockfile.raw().packages.get(system)?;

        let old_descriptors
            = old_lockfile.descriptors();

        let mut wrong_group_input = None;

        for (iid, descriptor) in group {
            let Some(Some(old_package)) = old_system_packages.get(iid) else {
                continue;
            };

            let Some(old_descriptor) = old_descriptors.get(iid) else {
                continue;
            };

            if !descriptor.same_package(old_descriptor) {
                continue;
            }

            if descriptor.group == old_descriptor.group {
                return Some(old_package.input.clone());
            }

            if wrong_group_input.is_none() {
                wrong_group_input = Some(old_package.input.clone());
            }
        }

        wrong_group_input
    }

    /// Resolves one group: the previously used input first (unless
    /// upgrading), then every registry input in order. The first input
    /// that satisfies the whole group wins.
    fn try_resolve_group(&self, name: &str, group: &InstallDescriptors, system: &System) -> Result<GroupOutcome, Error> {
        let mut failure = ResolutionFailure {
            group: name.to_string(),
            attempts: Vec::new(),
        };

        let mut old_group_input = None;

        if !self.upgrades.upgrading_group(name) {
            if let Some(locked_ref) = self.group_input(group, system) {
                debug!("group '{}' previously resolved in '{}'", name, locked_ref);

                let input
                    = self.open_candidate(&locked_ref, system)?;

                match self.try_resolve_group_in(group, &input, system)? {
                    GroupResolution::Resolved(resolved) => {
                        return Ok(GroupOutcome::Resolved(resolved));
                    },

                    GroupResolution::FirstFailure(iid) => {
                        failure.attempts.push(FailedAttempt {
                            install_id: iid,
                            input_url: locked_ref.url.clone(),
                        });
                    },
                }

                old_group_input = Some(input);
            }
        }

        for input in &self.inputs {
            // The reused input was already tried above.
            if old_group_input.as_ref().is_some_and(|old| old.locked_ref == input.locked_ref) {
                continue;
            }

            match self.try_resolve_group_in(group, input, system)? {
                GroupResolution::Resolved(resolved) => {
                    if old_group_input.is_some() {
                        info!("upgrading group '{}' to avoid resolution failure", name);
                    }

                    return Ok(GroupOutcome::Resolved(resolved));
                },

                GroupResolution::FirstFailure(iid) => {
                    failure.attempts.push(FailedAttempt {
                        install_id: iid,
                        input_url: input.locked_ref.url.clone(),
                    });
                },
            }
        }

        Ok(GroupOutcome::Failed(failure))
    }

    /// Resolves every descriptor of a group against a single input.
    /// Descriptors excluded from `system` and unmatched optional ones
    /// record an explicit absent marker; the first unmatched required
    /// descriptor fails the whole attempt.
    fn try_resolve_group_in(&self, group: &InstallDescriptors, input: &PkgDbInput, system: &System) -> Result<GroupResolution, Error> {
        let mut rows: Vec<(&InstallId, &ManifestDescriptor, Option<RowId>)>
            = Vec::with_capacity(group.len());

        for (iid, descriptor) in group {
            if descriptor.excludes_system(system) {
                rows.push((iid, descriptor, None));
                continue;
            }

            debug!("resolving install id '{}'", iid);

            let row
                = self.try_resolve_descriptor_in(descriptor, input, system)?;

            if row.is_none() && !descriptor.optional {
                return Ok(GroupResolution::FirstFailure(iid.clone()));
            }

            rows.push((iid, descriptor, row));
        }

        let mut packages = SystemPackages::new();

        for (iid, descriptor, row) in rows {
            let package = match row {
                Some(row) => Some(lock_package(&input.locked_ref, input.db.as_ref(), row, descriptor.priority)?),
                None => None,
            };

            packages.insert(iid.clone(), package);
        }

        Ok(GroupResolution::Resolved(packages))
    }

    /// Resolves one descriptor against one input: base arguments, input
    /// defaults, descriptor criteria, system restriction, first row
    /// wins. Ranking is the database's documented contract.
    fn try_resolve_descriptor_in(&self, descriptor: &ManifestDescriptor, input: &PkgDbInput, system: &System) -> Result<Option<RowId>, Error> {
        if descriptor.excludes_system(system) {
            return Ok(None);
        }

        // An `input` restriction makes every other input a non-match.
        if let Some(required) = &descriptor.input {
            if input.name.as_deref() != Some(required.as_str()) {
                return Ok(None);
            }
        }

        let mut args = self.base_query_args.clone();
        input.fill_query_args(&mut args);
        args.fill_from_descriptor(descriptor);
        args.systems = vec![system.clone()];

        let rows = input.db.query(&args)?;

        Ok(rows.first().copied())
    }

    /// A database handle for the input a group was previously locked
    /// to: the registry's own handle when the pin still appears there,
    /// a freshly opened one otherwise.
    fn open_candidate(&self, locked_ref: &LockedInputRef, system: &System) -> Result<PkgDbInput, Error> {
        if let Some(existing) = self.inputs.iter().find(|input| &input.locked_ref == locked_ref) {
            return Ok(existing.clone());
        }

        let db = self.provider.open(None, locked_ref)?;
        db.scrape_systems(std::slice::from_ref(system))?;

        Ok(PkgDbInput {
            name: None,
            locked_ref: locked_ref.clone(),
            subtrees: None,
            db,
        })
    }
}

/// Converts a matched row into a locked package, stripping the payload
/// fields the lockfile already encodes elsewhere.
fn lock_package(input: &LockedInputRef, db: &dyn PackageDb, row: RowId, priority: u64) -> Result<LockedPackage, Error> {
    let mut info
        = db.get_package(row)?;

    let attr_path = match info.remove("absPath") {
        Some(value) => serde_json::from_value(value)?,
        None => return Err(Error::Internal("package payload is missing its attribute path")),
    };

    for key in ["relPath", "subtree", "id", "system"] {
        info.remove(key);
    }

    Ok(LockedPackage {
        input: input.clone(),
        attr_path,
        priority,
        info,
    })
}
