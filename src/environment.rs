use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment name used when the environment file does not declare one.
pub const DEFAULT_ENVIRONMENT: &str = "workstation";

/// A dependency line in an environment file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    /// Conda match spec, e.g. `python=3.12` or `conda-forge::numpy`.
    Package(String),
    /// Nested installer section such as `pip: [requests]`.
    Nested(std::collections::BTreeMap<String, Vec<String>>),
}

impl Dependency {
    /// Package name without version constraints or channel prefix.
    pub fn name(&self) -> Option<&str> {
        match self {
            Dependency::Package(spec) => {
                let spec = spec.rsplit("::").next().unwrap_or(spec);
                let end = spec
                    .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | ' ' | '['))
                    .unwrap_or(spec.len());
                Some(spec[..end].trim())
            }
            Dependency::Nested(_) => None,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Package(spec) => f.write_str(spec),
            Dependency::Nested(sections) => {
                let parts: Vec<String> = sections
                    .iter()
                    .map(|(installer, packages)| format!("{installer}: [{}]", packages.join(", ")))
                    .collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}

/// Declared state of a named virtual environment.
///
/// Owned by the external environment manager; this tool only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub name: Option<String>,
    pub channels: Vec<String>,
    pub dependencies: Vec<Dependency>,
    /// File the definition was read from; handed to the manager for create/update.
    pub source: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnvironment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    channels: Option<Vec<String>>,
    #[serde(default)]
    dependencies: Option<Vec<Dependency>>,
}

impl EnvironmentSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read environment file {:?}", path))?;
        Self::parse(&contents, path)
            .with_context(|| format!("Failed to parse environment file {:?}", path))
    }

    pub fn parse(contents: &str, source: &Path) -> Result<Self> {
        let raw: RawEnvironment = if contents.trim().is_empty() {
            RawEnvironment::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        Ok(Self {
            name: raw.name,
            channels: raw.channels.unwrap_or_default(),
            dependencies: raw.dependencies.unwrap_or_default(),
            source: source.to_path_buf(),
        })
    }

    /// The declared name, or [`DEFAULT_ENVIRONMENT`] when it is missing, null or blank.
    pub fn resolved_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_ENVIRONMENT)
    }

    /// Names of the top-level conda packages, in declaration order.
    pub fn package_names(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter_map(Dependency::name)
            .filter(|name| !name.is_empty())
            .collect()
    }
}
