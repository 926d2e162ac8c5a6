use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools. Arguments are passed as-is, never through a shell.
/// `Err` means the program could not be started at all.
pub trait CommandRunner {
    /// Output goes straight to the terminal.
    fn stream(&self, program: &str, args: &[&str]) -> Result<bool>;

    fn capture(&self, program: &str, args: &[&str]) -> Result<Output>;
}

pub struct SystemRunner {
    dir: PathBuf,
}

impl SystemRunner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut command = Command::new(program);
        command.args(args).current_dir(&self.dir);
        command
    }
}

impl CommandRunner for SystemRunner {
    fn stream(&self, program: &str, args: &[&str]) -> Result<bool> {
        let status = self
            .command(program, args)
            .stdin(Stdio::inherit())
            .status()
            .with_context(|| format!("failed to start {program}"))?;

        Ok(status.success())
    }

    fn capture(&self, program: &str, args: &[&str]) -> Result<Output> {
        let output = self
            .command(program, args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to start {program}"))?;

        Ok(Output {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
