mod deploy;
mod destroy;
mod runner;
mod settings;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::Input;
use tracing::info;

use crate::deploy::Action;
use crate::runner::SystemRunner;
use crate::settings::Settings;

/// Provision, inspect and tear down the product ETL infrastructure.
#[derive(Debug, Parser)]
#[command(name = "ops", version)]
struct Cli {
    /// Directory holding the Terraform configuration.
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Operator settings file, relative to --dir.
    #[arg(long, default_value = "ops.yml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a Terraform deployment step.
    Deploy {
        #[arg(value_enum)]
        action: Action,
    },
    /// Empty buckets, clean the Athena workgroup, destroy everything and
    /// remove local Terraform state.
    Destroy {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    shared::log::init_cli(shared::log::parse_level(
        std::env::var("LOG_LEVEL").ok().as_deref(),
    ));

    let cli = Cli::parse();
    let settings = Settings::load(&cli.dir.join(&cli.config))?;
    let runner = SystemRunner::new(&cli.dir);

    match cli.command {
        Command::Deploy { action } => deploy::deploy(&runner, &cli.dir, action),
        Command::Destroy { yes } => {
            info!("WARNING: This will delete ALL infrastructure and data!");
            if !yes {
                let answer: String = Input::new()
                    .with_prompt("Are you sure you want to destroy everything? (type 'yes' to continue)")
                    .allow_empty(true)
                    .interact_text()?;
                if !destroy::confirmed(&answer) {
                    info!("Destruction cancelled");
                    return Ok(());
                }
            }
            destroy::destroy(&runner, &cli.dir, &settings)
        }
    }
}
