use clap::Args;
use zenv_primitives::GroupName;

use crate::commands::lock::{lock_with, LockArgs};
use crate::error::Error;
use crate::resolve::UpgradeSelector;

#[derive(Args)]
pub struct UpgradeArgs {
    /// Groups to upgrade. With no names, every group is upgraded.
    pub groups: Vec<GroupName>,

    #[command(flatten)]
    pub lock: LockArgs,
}

pub fn run(args: UpgradeArgs) -> Result<(), Error> {
    let upgrades = match args.groups.is_empty() {
        true => UpgradeSelector::All,
        false => UpgradeSelector::Groups(args.groups),
    };

    lock_with(args.lock, upgrades)
}
