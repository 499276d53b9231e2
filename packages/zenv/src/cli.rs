use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::{commands, report};

#[derive(Parser)]
#[command(name = "zenv", version, about = "Resolve package environments into deterministic lockfiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the manifest and write the lockfile.
    Lock(commands::lock::LockArgs),

    /// Compare two manifests structurally.
    Diff(commands::diff::DiffArgs),

    /// Re-resolve groups even where the prior lock still satisfies
    /// them.
    Upgrade(commands::upgrade::UpgradeArgs),

    /// Refresh registry input pins without re-resolving packages.
    Update(commands::update::UpdateArgs),

    /// Print the effective locked registry.
    Registry(commands::registry::RegistryArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Lock(args) => commands::lock::run(args),
        Commands::Diff(args) => commands::diff::run(args),
        Commands::Upgrade(args) => commands::upgrade::run(args),
        Commands::Update(args) => commands::update::run(args),
        Commands::Registry(args) => commands::registry::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,

        Err(error) => {
            report::error(&error.to_string());
            ExitCode::FAILURE
        },
    }
}
