use anyhow::Result;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::manifest::{PackageKind, PackageSpec};
use crate::stage::{Stage, StageResult, StageRun};

pub mod conda;
pub mod homebrew;

pub use conda::Conda;
pub use homebrew::Homebrew;

/// Options that describe a package but are never passed to the install command.
const NON_FLAG_OPTIONS: &[&str] = &["auto_updates", "url"];

/// Query/install/upgrade contract of the system package manager.
pub trait PackageManager {
    fn is_installed(&self, spec: &PackageSpec) -> Result<bool>;
    fn install(&self, spec: &PackageSpec) -> Result<()>;
    fn refresh_index(&self) -> Result<()>;
    fn upgrade_formulae(&self) -> Result<()>;
    /// Whether the optional cask upgrade helper is available.
    fn has_cask_upgrader(&self) -> Result<bool>;
    fn upgrade_casks(&self) -> Result<()>;
}

/// Installs declared packages, skipping anything already present.
///
/// One installer lives for one run and remembers the outcome of every spec it
/// has handled, so a package is never attempted twice per run.
pub struct Installer<'a> {
    manager: &'a dyn PackageManager,
    handled: HashMap<(PackageKind, String), StageResult>,
}

impl<'a> Installer<'a> {
    pub fn new(manager: &'a dyn PackageManager) -> Self {
        Self {
            manager,
            handled: HashMap::new(),
        }
    }

    pub fn ensure_installed(&mut self, spec: &PackageSpec) -> StageResult {
        let key = (spec.kind, spec.name.clone());
        if let Some(earlier) = self.handled.get(&key) {
            // A failure stays a failure for the rest of the run.
            if earlier.is_failure() {
                return earlier.clone();
            }
            return StageResult::skipped(Stage::Bundle, format!("{spec} already handled this run"));
        }

        let manager = self.manager;
        let result = StageRun::new(Stage::Bundle, spec.to_string()).run(|| {
            let present = manager
                .is_installed(spec)
                .map_err(|err| ProvisionError::install(spec.to_string(), err))?;
            if present {
                return Ok(StageResult::skipped(
                    Stage::Bundle,
                    format!("{spec} already installed"),
                ));
            }

            info!(package = %spec.name, kind = %spec.kind, "installing");
            manager
                .install(spec)
                .map_err(|err| ProvisionError::install(spec.to_string(), err))?;
            Ok(StageResult::installed(Stage::Bundle, spec.to_string()))
        });
        self.handled.insert(key, result.clone());
        result
    }

    /// Install every spec independently; failures are collected, not short-circuited.
    pub fn install_all<'s, I>(&mut self, specs: I) -> Vec<StageResult>
    where
        I: IntoIterator<Item = &'s PackageSpec>,
    {
        specs
            .into_iter()
            .map(|spec| {
                let result = self.ensure_installed(spec);
                if result.is_failure() {
                    warn!(package = %spec.name, "{}", result.detail);
                }
                result
            })
            .collect()
    }
}

/// Map manifest options to command-line flags.
///
/// `true` becomes `--key`, `false` is dropped, anything else becomes
/// `--key=value`. Underscores in keys turn into hyphens.
pub(crate) fn option_flags(spec: &PackageSpec) -> Vec<String> {
    spec.options
        .iter()
        .filter(|(key, _)| !NON_FLAG_OPTIONS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            let flag = key.replace('_', "-");
            match value.as_str() {
                "true" => Some(format!("--{flag}")),
                "false" => None,
                other => Some(format!("--{flag}={other}")),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::PackageManager;
    use crate::manifest::{PackageKind, PackageSpec};
    use anyhow::{bail, Result};
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    /// In-memory package manager that remembers what it installed.
    #[derive(Default)]
    pub(crate) struct FakeManager {
        pub(crate) installed: RefCell<HashSet<(PackageKind, String)>>,
        pub(crate) failing: HashSet<String>,
        pub(crate) install_calls: RefCell<Vec<String>>,
        pub(crate) cask_upgrader: bool,
        pub(crate) fail_refresh: bool,
        pub(crate) upgrades: Cell<u32>,
    }

    impl PackageManager for FakeManager {
        fn is_installed(&self, spec: &PackageSpec) -> Result<bool> {
            Ok(self
                .installed
                .borrow()
                .contains(&(spec.kind, spec.name.clone())))
        }

        fn install(&self, spec: &PackageSpec) -> Result<()> {
            self.install_calls.borrow_mut().push(spec.name.clone());
            if self.failing.contains(&spec.name) {
                bail!("No available formula with the name \"{}\"", spec.name);
            }
            self.installed
                .borrow_mut()
                .insert((spec.kind, spec.name.clone()));
            Ok(())
        }

        fn refresh_index(&self) -> Result<()> {
            if self.fail_refresh {
                bail!("fatal: unable to access 'https://github.com/Homebrew/brew/'");
            }
            Ok(())
        }

        fn upgrade_formulae(&self) -> Result<()> {
            self.upgrades.set(self.upgrades.get() + 1);
            Ok(())
        }

        fn has_cask_upgrader(&self) -> Result<bool> {
            Ok(self.cask_upgrader)
        }

        fn upgrade_casks(&self) -> Result<()> {
            self.upgrades.set(self.upgrades.get() + 1);
            Ok(())
        }
    }
}
