use anyhow::Result;
use tracing::info;

use crate::environment::EnvironmentSpec;
use crate::error::ProvisionError;
use crate::installers::homebrew::CASK_UPGRADE_TAP;
use crate::installers::PackageManager;
use crate::stage::{Stage, StageResult, StageRun};
use crate::sync::{EnvironmentManager, Synchronizer};

/// Re-runs upgrades for everything previously provisioned.
///
/// Collaborators that are missing on the host are `None`; the steps that need
/// them report a missing prerequisite and the remaining steps still run.
pub struct UpdateOrchestrator<'a> {
    packages: Option<&'a dyn PackageManager>,
    environments: Option<&'a dyn EnvironmentManager>,
    environment: Option<Result<EnvironmentSpec>>,
}

impl<'a> UpdateOrchestrator<'a> {
    pub fn new(
        packages: Option<&'a dyn PackageManager>,
        environments: Option<&'a dyn EnvironmentManager>,
        environment: Option<Result<EnvironmentSpec>>,
    ) -> Self {
        Self {
            packages,
            environments,
            environment,
        }
    }

    /// Run every update step in order. A failed step never blocks the next one.
    pub fn update_all(&self) -> Vec<StageResult> {
        info!("running update stages");
        vec![
            self.step("refresh package index", |brew| {
                brew.refresh_index()?;
                Ok("package index refreshed")
            }),
            self.step("upgrade formulae", |brew| {
                brew.upgrade_formulae()?;
                Ok("formulae upgraded")
            }),
            self.upgrade_casks(),
            self.upgrade_env_manager(),
            self.resync_environment(),
        ]
    }

    fn brew(&self) -> Result<&'a dyn PackageManager, ProvisionError> {
        self.packages.ok_or_else(|| {
            ProvisionError::prerequisite("Homebrew", "run `macstrap probe` to install it")
        })
    }

    fn env_manager(&self) -> Result<&'a dyn EnvironmentManager, ProvisionError> {
        self.environments.ok_or_else(|| {
            ProvisionError::prerequisite(
                "conda/mamba",
                "add the `miniforge` cask to packages.toml and run `macstrap bundle`",
            )
        })
    }

    fn step<F>(&self, label: &str, action: F) -> StageResult
    where
        F: FnOnce(&dyn PackageManager) -> Result<&'static str>,
    {
        StageRun::new(Stage::Update, label).run(|| {
            let brew = self.brew()?;
            let detail = action(brew).map_err(|err| ProvisionError::install(label, err))?;
            Ok(StageResult::updated(Stage::Update, detail))
        })
    }

    fn upgrade_casks(&self) -> StageResult {
        StageRun::new(Stage::Update, "upgrade casks").run(|| {
            let brew = self.brew()?;
            let available = brew
                .has_cask_upgrader()
                .map_err(|err| ProvisionError::install("cask upgrades", err))?;
            if !available {
                return Err(ProvisionError::BestEffortSkipped {
                    what: format!("cask upgrades (`brew cu` missing; tap {CASK_UPGRADE_TAP})"),
                });
            }
            brew.upgrade_casks()
                .map_err(|err| ProvisionError::install("cask upgrades", err))?;
            Ok(StageResult::updated(Stage::Update, "casks upgraded"))
        })
    }

    fn upgrade_env_manager(&self) -> StageResult {
        StageRun::new(Stage::Update, "upgrade environment manager").run(|| {
            let manager = self.env_manager()?;
            manager
                .self_update()
                .map_err(|err| ProvisionError::install(manager.name(), err))?;
            Ok(StageResult::updated(
                Stage::Update,
                format!("{} upgraded", manager.name()),
            ))
        })
    }

    fn resync_environment(&self) -> StageResult {
        let manager = match self.env_manager() {
            Ok(manager) => manager,
            Err(err) => return StageResult::from_error(Stage::Env, &err),
        };
        match &self.environment {
            Some(Ok(spec)) => Synchronizer::new(manager).sync_environment(spec),
            Some(Err(err)) => StageResult::failed(Stage::Env, format!("{err:#}")),
            None => StageResult::skipped(Stage::Env, "no environment file declared"),
        }
    }
}
