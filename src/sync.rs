use anyhow::Result;
use tracing::{info, warn};

use crate::environment::EnvironmentSpec;
use crate::error::ProvisionError;
use crate::stage::{Stage, StageResult, StageRun};

/// Contract of a Conda-style environment manager.
pub trait EnvironmentManager {
    /// Executable name, e.g. `conda` or `mamba`.
    fn name(&self) -> &str;
    /// Names of all existing environments.
    fn list_environments(&self) -> Result<Vec<String>>;
    fn create(&self, name: &str, spec: &EnvironmentSpec) -> Result<()>;
    /// Update in place; with `prune`, packages absent from the file are removed.
    fn update(&self, name: &str, spec: &EnvironmentSpec, prune: bool) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
    /// Reclaim package cache space.
    fn clean(&self) -> Result<()>;
    /// Upgrade the manager itself in the base environment.
    fn self_update(&self) -> Result<()>;
}

/// Reconciles a named environment with its declared spec.
pub struct Synchronizer<'a> {
    manager: &'a dyn EnvironmentManager,
}

impl<'a> Synchronizer<'a> {
    pub fn new(manager: &'a dyn EnvironmentManager) -> Self {
        Self { manager }
    }

    /// Create the environment if absent, otherwise update it with `--prune`.
    ///
    /// A failed create removes whatever was partially built so the host is
    /// left as it was.
    pub fn sync_environment(&self, spec: &EnvironmentSpec) -> StageResult {
        let name = spec.resolved_name().to_string();
        StageRun::new(Stage::Env, format!("environment {name}")).run(|| {
            let existing = self
                .manager
                .list_environments()
                .map_err(|err| ProvisionError::sync(&name, err))?;

            let result = if environment_exists(&existing, &name) {
                info!(environment = %name, manager = self.manager.name(), "updating environment");
                self.manager
                    .update(&name, spec, true)
                    .map_err(|err| ProvisionError::sync(&name, err))?;
                StageResult::updated(Stage::Env, format!("environment {name} updated (pruned)"))
            } else {
                info!(environment = %name, manager = self.manager.name(), "creating environment");
                if let Err(err) = self.manager.create(&name, spec) {
                    self.discard_partial(&name);
                    return Err(ProvisionError::sync(&name, err));
                }
                StageResult::installed(Stage::Env, format!("environment {name} created"))
            };

            if let Err(err) = self.manager.clean() {
                warn!("cache cleanup after syncing '{name}' failed: {err:#}");
            }
            Ok(result)
        })
    }

    fn discard_partial(&self, name: &str) {
        let leftover = match self.manager.list_environments() {
            Ok(existing) => environment_exists(&existing, name),
            Err(err) => {
                warn!("could not list environments after failed create: {err:#}");
                return;
            }
        };
        if leftover {
            warn!(environment = %name, "removing partially created environment");
            if let Err(err) = self.manager.remove(name) {
                warn!("failed to remove partial environment '{name}': {err:#}");
            }
        }
    }
}

/// Exact-token match; `dev-old` and `devtools` never match `dev`.
pub fn environment_exists(existing: &[String], name: &str) -> bool {
    existing.iter().any(|candidate| candidate == name)
}


#[cfg(test)]
mod tests {
    use super::testing::FakeEnvManager;
    use super::*;
    use crate::environment::DEFAULT_ENVIRONMENT;
    use crate::stage::StageStatus;
    use std::path::Path;

    fn spec(yaml: &str) -> EnvironmentSpec {
        EnvironmentSpec::parse(yaml, Path::new("environment.yml")).unwrap()
    }

    #[test]
    fn exact_match_never_touches_similar_names() {
        let manager = FakeEnvManager::with_envs(&[("dev-old", &["a"]), ("devtools", &["b"])]);
        let result = Synchronizer::new(&manager).sync_environment(&spec(
            "name: dev\ndependencies: [python, numpy]\n",
        ));

        assert_eq!(result.status, StageStatus::Installed);
        assert_eq!(manager.packages("dev").unwrap(), vec!["numpy", "python"]);
        assert_eq!(manager.packages("dev-old").unwrap(), vec!["a"]);
        assert_eq!(manager.packages("devtools").unwrap(), vec!["b"]);
        assert!(!manager
            .calls
            .borrow()
            .iter()
            .any(|call| call.starts_with("update")));
    }

    #[test]
    fn update_prunes_undeclared_packages() {
        let manager = FakeEnvManager::with_envs(&[("ds", &["a", "b", "c"])]);
        let result =
            Synchronizer::new(&manager).sync_environment(&spec("name: ds\ndependencies: [a, b]\n"));

        assert_eq!(result.status, StageStatus::Updated);
        assert_eq!(manager.packages("ds").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unnamed_spec_uses_default_environment() {
        let manager = FakeEnvManager::default();
        let result =
            Synchronizer::new(&manager).sync_environment(&spec("name:\ndependencies: [python]\n"));

        assert_eq!(result.status, StageStatus::Installed);
        assert!(manager.packages(DEFAULT_ENVIRONMENT).is_some());
        assert!(manager.packages("").is_none());
    }

    #[test]
    fn failed_create_leaves_no_environment() {
        let manager = FakeEnvManager {
            fail_create: true,
            ..FakeEnvManager::default()
        };
        let result = Synchronizer::new(&manager)
            .sync_environment(&spec("name: ml\ndependencies: [pytorch]\n"));

        assert_eq!(result.status, StageStatus::Failed);
        assert!(result.detail.contains("could not solve"));
        assert!(manager.packages("ml").is_none());
        assert!(!manager.calls.borrow().contains(&"clean".to_string()));
    }

    #[test]
    fn clean_failure_is_not_fatal() {
        let manager = FakeEnvManager {
            fail_clean: true,
            ..FakeEnvManager::with_envs(&[("ds", &["a"])])
        };
        let result =
            Synchronizer::new(&manager).sync_environment(&spec("name: ds\ndependencies: [a]\n"));
        assert_eq!(result.status, StageStatus::Updated);
    }

    #[test]
    fn exact_match_helper() {
        let existing = vec!["base".to_string(), "dev-old".to_string()];
        assert!(!environment_exists(&existing, "dev"));
        assert!(!environment_exists(&existing, "dev-"));
        assert!(environment_exists(&existing, "base"));
    }
}
