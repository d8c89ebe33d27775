use anyhow::Context;
use tracing::{info, warn};

use crate::config::EnvManagerChoice;
use crate::environment::EnvironmentSpec;
use crate::error::ProvisionError;
use crate::installers::{homebrew, Conda, Homebrew, Installer, PackageManager};
use crate::manifest::Manifest;
use crate::probe::{probe, ToolAvailability, ToolLocator};
use crate::process::CommandRunner;
use crate::stage::{Stage, StageResult, StageRun, StageStatus};
use crate::sync::{EnvironmentManager, Synchronizer};
use crate::update::UpdateOrchestrator;
use crate::workspace::{Workspace, WorkspacePath};

/// Stages a single invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSelection {
    Probe,
    Bundle,
    Env,
    Update,
    /// Probe, bundle, then env.
    All,
}

/// Sequences the provisioning stages against the host.
pub struct Provisioner<'a> {
    workspace: &'a Workspace,
    runner: &'a dyn CommandRunner,
    locator: &'a dyn ToolLocator,
    tools: ToolAvailability,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        workspace: &'a Workspace,
        runner: &'a dyn CommandRunner,
        locator: &'a dyn ToolLocator,
    ) -> Self {
        let tools = probe(locator, runner);
        Self {
            workspace,
            runner,
            locator,
            tools,
        }
    }

    pub fn tools(&self) -> &ToolAvailability {
        &self.tools
    }

    pub fn run(&mut self, selection: StageSelection) -> Vec<StageResult> {
        match selection {
            StageSelection::Probe => self.probe_stage(),
            StageSelection::Bundle => self.bundle_stage(),
            StageSelection::Env => vec![self.env_stage()],
            StageSelection::Update => self.update_stage(),
            StageSelection::All => {
                let mut results = self.probe_stage();
                results.extend(self.bundle_stage());
                // The bundle may have installed conda or mamba.
                self.reprobe();
                results.push(self.env_stage());
                results
            }
        }
    }

    /// Report prerequisites, bootstrapping Homebrew when it is missing.
    pub fn probe_stage(&mut self) -> Vec<StageResult> {
        let mut results = Vec::new();

        results.push(StageRun::new(Stage::Prober, "compiler toolchain").run(|| {
            if self.tools.compiler_toolchain {
                Ok(StageResult::skipped(Stage::Prober, "compiler toolchain present"))
            } else {
                Err(ProvisionError::prerequisite(
                    "compiler toolchain",
                    "run `xcode-select --install` and re-run macstrap",
                ))
            }
        }));

        let bootstrap = StageRun::new(Stage::Prober, "Homebrew").run(|| {
            if self.tools.package_manager {
                return Ok(StageResult::skipped(Stage::Prober, "Homebrew present"));
            }
            info!("Homebrew not found; running the official installer");
            homebrew::bootstrap(self.runner)
                .map_err(|err| ProvisionError::install("Homebrew", err))?;
            Ok(StageResult::installed(Stage::Prober, "Homebrew"))
        });
        let bootstrapped = bootstrap.status == StageStatus::Installed;
        results.push(bootstrap);

        if bootstrapped {
            self.reprobe();
            if !self.tools.package_manager {
                results.push(StageResult::failed(
                    Stage::Prober,
                    "Homebrew installer finished but brew was not found",
                ));
            }
        }

        if let Some(brew) = self.tools.brew.clone() {
            let profile = self.workspace.shell_profile();
            let mut lines = vec![profile.shell().brew_shellenv(&brew)];
            lines.extend(self.workspace.config().shell.lines.iter().cloned());
            results.push(StageRun::new(Stage::Prober, "shell profile").run(|| {
                let mut added = 0;
                for line in &lines {
                    if profile
                        .ensure_line(line)
                        .map_err(|err| ProvisionError::install("shell profile", err))?
                    {
                        added += 1;
                    }
                }
                let path = profile.path().display();
                Ok(if added == 0 {
                    StageResult::skipped(Stage::Prober, format!("{path} up to date"))
                } else {
                    StageResult::updated(Stage::Prober, format!("added {added} line(s) to {path}"))
                })
            }));
        }

        if !self.tools.env_manager {
            results.push(StageResult::skipped(
                Stage::Prober,
                "conda/mamba not found; add the `miniforge` cask to enable the env stage",
            ));
        }

        results
    }

    fn reprobe(&mut self) {
        self.tools = probe(self.locator, self.runner);
    }

    /// Install every package declared in the manifests.
    pub fn bundle_stage(&self) -> Vec<StageResult> {
        let Some(program) = self.tools.brew.clone() else {
            let err = ProvisionError::prerequisite("Homebrew", "run `macstrap probe` to install it");
            return vec![StageResult::from_error(Stage::Bundle, &err)];
        };

        let dir = self.workspace.path(WorkspacePath::Manifests);
        let manifest = match Manifest::load_from_dir(&dir) {
            Ok(manifest) => manifest,
            Err(err) => return vec![StageResult::failed(Stage::Bundle, format!("{err:#}"))],
        };
        if manifest.is_empty() {
            return vec![StageResult::skipped(
                Stage::Bundle,
                format!("no packages declared in {}", dir.display()),
            )];
        }

        info!(packages = manifest.len(), "installing bundle");
        let brew = Homebrew::new(program, self.runner);
        Installer::new(&brew).install_all(manifest.packages())
    }

    /// Create or update the declared Conda environment.
    pub fn env_stage(&self) -> StageResult {
        let spec = match self.environment_spec() {
            Some(Ok(spec)) => spec,
            Some(Err(err)) => return StageResult::failed(Stage::Env, format!("{err:#}")),
            None => return StageResult::skipped(Stage::Env, "no environment file declared"),
        };
        match self.env_manager() {
            Ok(manager) => Synchronizer::new(&manager).sync_environment(&spec),
            Err(err) => StageResult::from_error(Stage::Env, &err),
        }
    }

    /// Upgrade everything previously installed.
    pub fn update_stage(&self) -> Vec<StageResult> {
        let brew = self
            .tools
            .brew
            .clone()
            .map(|program| Homebrew::new(program, self.runner));
        let conda = self.env_manager().ok();
        let packages: Option<&dyn PackageManager> =
            brew.as_ref().map(|brew| brew as &dyn PackageManager);
        let environments: Option<&dyn EnvironmentManager> =
            conda.as_ref().map(|conda| conda as &dyn EnvironmentManager);
        UpdateOrchestrator::new(packages, environments, self.environment_spec()).update_all()
    }

    fn environment_spec(&self) -> Option<anyhow::Result<EnvironmentSpec>> {
        let path = self.workspace.path(WorkspacePath::EnvironmentFile);
        if !path.exists() {
            warn!(path = %path.display(), "environment file not found");
            return None;
        }
        Some(EnvironmentSpec::load(&path).context("Cannot synchronize environment"))
    }

    fn env_manager(&self) -> Result<Conda<'a>, ProvisionError> {
        let choice = self.workspace.config().env_manager;
        let program = match choice {
            EnvManagerChoice::Auto => self.tools.mamba.clone().or_else(|| self.tools.conda.clone()),
            EnvManagerChoice::Mamba => self.tools.mamba.clone(),
            EnvManagerChoice::Conda => self.tools.conda.clone(),
        };
        program
            .map(|program| Conda::new(program, self.runner))
            .ok_or_else(|| {
                let tool = match choice {
                    EnvManagerChoice::Mamba => "mamba",
                    EnvManagerChoice::Conda => "conda",
                    EnvManagerChoice::Auto => "conda/mamba",
                };
                ProvisionError::prerequisite(
                    tool,
                    "add the `miniforge` cask to packages.toml and run `macstrap bundle`",
                )
            })
    }
}
