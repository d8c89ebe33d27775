use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::debug;

use super::{option_flags, PackageManager};
use crate::manifest::{PackageKind, PackageSpec};
use crate::process::{CommandLine, CommandRunner};

/// Official Homebrew install script.
pub const INSTALL_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

/// Tap providing `brew cu`, the optional cask upgrade helper.
pub const CASK_UPGRADE_TAP: &str = "buo/cask-upgrade";

/// Drives the `brew` executable.
pub struct Homebrew<'a> {
    program: PathBuf,
    runner: &'a dyn CommandRunner,
}

impl<'a> Homebrew<'a> {
    pub fn new(program: impl Into<PathBuf>, runner: &'a dyn CommandRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    fn brew(&self) -> CommandLine {
        CommandLine::new(&self.program)
    }

    /// Long-running commands stream to the terminal; the index refresh is
    /// left to the update stage.
    fn run_streaming(&self, command: CommandLine) -> Result<()> {
        let command = command.env("HOMEBREW_NO_AUTO_UPDATE", "1");
        self.runner.stream(&command)?.check(&command)?;
        Ok(())
    }

    fn listed(&self, command: CommandLine) -> Result<bool> {
        let output = self.runner.output(&command)?;
        Ok(output.success && !output.stdout.trim().is_empty())
    }

    fn tapped(&self, name: &str) -> Result<bool> {
        let command = self.brew().arg("tap");
        let output = self.runner.output(&command)?.check(&command)?;
        Ok(output
            .stdout
            .lines()
            .any(|tap| tap.trim().eq_ignore_ascii_case(name)))
    }
}

impl PackageManager for Homebrew<'_> {
    fn is_installed(&self, spec: &PackageSpec) -> Result<bool> {
        let installed = match spec.kind {
            PackageKind::Tap => self.tapped(&spec.name)?,
            PackageKind::Formula => self.listed(
                self.brew()
                    .args(["list", "--formula", "--versions"])
                    .arg(&spec.name),
            )?,
            PackageKind::Cask | PackageKind::Font => self.listed(
                self.brew()
                    .args(["list", "--cask", "--versions"])
                    .arg(&spec.name),
            )?,
        };
        debug!(package = %spec.name, kind = %spec.kind, installed, "queried install state");
        Ok(installed)
    }

    fn install(&self, spec: &PackageSpec) -> Result<()> {
        let command = match spec.kind {
            PackageKind::Tap => {
                let mut command = self.brew().arg("tap").arg(&spec.name);
                if let Some(url) = spec.options.get("url") {
                    command = command.arg(url);
                }
                command
            }
            PackageKind::Formula => self
                .brew()
                .args(["install", "--formula"])
                .args(option_flags(spec))
                .arg(&spec.name),
            PackageKind::Cask | PackageKind::Font => self
                .brew()
                .args(["install", "--cask"])
                .args(option_flags(spec))
                .arg(&spec.name),
        };
        self.run_streaming(command)
    }

    fn refresh_index(&self) -> Result<()> {
        let command = self.brew().arg("update");
        self.runner.stream(&command)?.check(&command)?;
        Ok(())
    }

    fn upgrade_formulae(&self) -> Result<()> {
        self.run_streaming(self.brew().args(["upgrade", "--formula"]))
    }

    fn has_cask_upgrader(&self) -> Result<bool> {
        let command = self.brew().args(["commands", "--quiet"]);
        let output = self.runner.output(&command)?.check(&command)?;
        Ok(output.stdout.lines().any(|line| line.trim() == "cu"))
    }

    fn upgrade_casks(&self) -> Result<()> {
        self.run_streaming(self.brew().args(["cu", "--all", "--yes"]))
    }
}

/// Fetch the official installer and run it non-interactively.
pub fn bootstrap(runner: &dyn CommandRunner) -> Result<()> {
    let fetch = CommandLine::new("curl").arg("-fsSL").arg(INSTALL_SCRIPT_URL);
    let script = runner.output(&fetch)?.check(&fetch)?.stdout;
    if script.trim().is_empty() {
        bail!("{INSTALL_SCRIPT_URL} returned an empty install script");
    }

    let command = CommandLine::new("/bin/bash")
        .arg("-c")
        .arg(script)
        .env("NONINTERACTIVE", "1");
    let output = runner.stream(&command)?;
    if !output.success {
        let status = output
            .code
            .map(|code| format!("exit status {code}"))
            .unwrap_or_else(|| "a signal".to_string());
        bail!("Homebrew install script failed with {status}");
    }
    Ok(())
}
