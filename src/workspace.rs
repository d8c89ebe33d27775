use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::shell_profile::{Shell, ShellProfile};

/// Workspace path types
#[derive(Debug, Clone, Copy)]
pub enum WorkspacePath {
    /// Settings file: $XDG_CONFIG_HOME/macstrap/config.toml
    ConfigFile,
    /// Directory holding packages.toml and its variants
    Manifests,
    /// Conda environment file
    EnvironmentFile,
}

/// Resolved locations and settings for one invocation.
#[derive(Debug)]
pub struct Workspace {
    config_dir: PathBuf,
    home_dir: PathBuf,
    config: Config,
}

impl Workspace {
    /// Load the workspace rooted at `$XDG_CONFIG_HOME/macstrap` (default `~/.config/macstrap`).
    pub fn new() -> Result<Self> {
        let home_dir = home_dir()?;
        let base = env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir.join(".config"));
        Self::with_dirs(base.join("macstrap"), home_dir)
    }

    pub fn with_dirs(config_dir: PathBuf, home_dir: PathBuf) -> Result<Self> {
        let config = Config::load(&config_dir.join("config.toml"))?;
        Ok(Self {
            config_dir,
            home_dir,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get path for a specific workspace location
    pub fn path(&self, path_type: WorkspacePath) -> PathBuf {
        match path_type {
            WorkspacePath::ConfigFile => self.config_dir.join("config.toml"),
            WorkspacePath::Manifests => self
                .config
                .manifest_dir
                .as_deref()
                .map(|dir| self.resolve(dir))
                .unwrap_or_else(|| self.config_dir.clone()),
            WorkspacePath::EnvironmentFile => self.resolve(
                self.config
                    .environment_file
                    .as_deref()
                    .unwrap_or("environment.yml"),
            ),
        }
    }

    /// Shell profile to edit: configured override, else the detected shell's login profile.
    pub fn shell_profile(&self) -> ShellProfile {
        let shell = Shell::detect();
        match self.config.shell.profile.as_deref() {
            Some(path) => ShellProfile::new(shell, self.resolve(path)),
            None => ShellProfile::for_shell(shell, &self.home_dir),
        }
    }

    /// Expand `~`/`$VAR` and anchor relative paths at the config directory.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let expanded = shellexpand::full_with_context_no_errors(
            raw,
            || Some(self.home_dir.to_string_lossy().into_owned()),
            |var| env::var(var).ok(),
        );
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

fn home_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .context("Failed to get home directory")
        .map(|dirs| dirs.home_dir().to_path_buf())
}
