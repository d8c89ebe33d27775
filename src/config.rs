use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Which environment manager binary to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvManagerChoice {
    /// Prefer `mamba` when present, otherwise `conda`.
    #[default]
    Auto,
    Conda,
    Mamba,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ShellConfig {
    /// Profile file to edit; defaults to the login profile of the detected shell.
    #[serde(default)]
    pub profile: Option<String>,
    /// Extra lines ensured in the profile during the prober stage.
    #[serde(default)]
    pub lines: Vec<String>,
}

/// User settings from `$XDG_CONFIG_HOME/macstrap/config.toml`.
///
/// Paths may use `~` and `$VAR`; relative paths are resolved against the
/// config directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding `packages.toml` and its variants.
    #[serde(default)]
    pub manifest_dir: Option<String>,
    /// Conda environment file.
    #[serde(default)]
    pub environment_file: Option<String>,
    #[serde(default)]
    pub env_manager: EnvManagerChoice,
    #[serde(default)]
    pub shell: ShellConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {:?}", path))
    }
}
