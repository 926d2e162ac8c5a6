use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use tracing::{info, warn};

use crate::runner::{command_line, CommandRunner};
use crate::settings::{TFVARS, TFVARS_EXAMPLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Init,
    Plan,
    Apply,
    Output,
}

impl Action {
    /// Terraform invocations, in order.
    pub fn steps(self) -> &'static [&'static [&'static str]] {
        match self {
            Action::Init => &[&["init"]],
            Action::Plan => &[&["init"], &["plan"]],
            Action::Apply => &[&["init"], &["apply"]],
            Action::Output => &[&["output"]],
        }
    }
}

pub fn check_tools(runner: &dyn CommandRunner) -> Result<()> {
    if runner.capture("terraform", &["version"]).is_err() {
        bail!("Terraform not found");
    }
    if runner.capture("aws", &["--version"]).is_err() {
        bail!("AWS CLI not found");
    }
    Ok(())
}

/// Seeds `terraform.tfvars` from the example file on first use.
pub fn ensure_tfvars(dir: &Path) -> Result<()> {
    let tfvars = dir.join(TFVARS);
    if tfvars.exists() {
        return Ok(());
    }

    let example = dir.join(TFVARS_EXAMPLE);
    if example.exists() {
        fs::copy(&example, &tfvars)
            .with_context(|| format!("failed to create {}", tfvars.display()))?;
        info!("Created {} from example", TFVARS);
    } else {
        warn!("{} not found", TFVARS_EXAMPLE);
    }
    Ok(())
}

pub fn deploy(runner: &dyn CommandRunner, dir: &Path, action: Action) -> Result<()> {
    info!("Action: {:?}", action);
    check_tools(runner)?;
    ensure_tfvars(dir)?;

    for args in action.steps() {
        let line = command_line("terraform", args);
        info!("Running: {}", line);
        if !runner.stream("terraform", args)? {
            bail!("Command failed: {line}");
        }
    }

    info!("Done");
    Ok(())
}
