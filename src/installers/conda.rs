use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::environment::EnvironmentSpec;
use crate::process::{CommandLine, CommandRunner};
use crate::sync::EnvironmentManager;

/// Drives `conda` or `mamba`; both accept the same `env` subcommands.
pub struct Conda<'a> {
    program: PathBuf,
    name: String,
    runner: &'a dyn CommandRunner,
}

#[derive(Debug, Deserialize)]
struct EnvList {
    #[serde(default)]
    envs: Vec<PathBuf>,
}

impl<'a> Conda<'a> {
    pub fn new(program: impl Into<PathBuf>, runner: &'a dyn CommandRunner) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "conda".to_string());
        Self {
            program,
            name,
            runner,
        }
    }

    fn command(&self) -> CommandLine {
        CommandLine::new(&self.program)
    }

    fn stream(&self, command: CommandLine) -> Result<()> {
        self.runner.stream(&command)?.check(&command)?;
        Ok(())
    }

    fn file_arg(spec: &EnvironmentSpec) -> String {
        spec.source.display().to_string()
    }
}

impl EnvironmentManager for Conda<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_environments(&self) -> Result<Vec<String>> {
        let command = self.command().args(["env", "list", "--json"]);
        let output = self.runner.output(&command)?.check(&command)?;
        parse_env_list(&output.stdout)
            .with_context(|| format!("Failed to parse `{command}` output"))
    }

    fn create(&self, name: &str, spec: &EnvironmentSpec) -> Result<()> {
        self.stream(
            self.command()
                .args(["env", "create", "--name", name, "--file"])
                .arg(Self::file_arg(spec)),
        )
    }

    fn update(&self, name: &str, spec: &EnvironmentSpec, prune: bool) -> Result<()> {
        let mut command = self
            .command()
            .args(["env", "update", "--name", name, "--file"])
            .arg(Self::file_arg(spec));
        if prune {
            command = command.arg("--prune");
        }
        self.stream(command)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.stream(
            self.command()
                .args(["env", "remove", "--name", name, "--yes"]),
        )
    }

    fn clean(&self) -> Result<()> {
        self.stream(self.command().args(["clean", "--all", "--yes"]))
    }

    fn self_update(&self) -> Result<()> {
        let name = self.name.clone();
        self.stream(
            self.command()
                .args(["update", "--name", "base", "--yes"])
                .arg(name),
        )
    }
}

/// Environment names from `env list --json`.
///
/// Named environments live under an `envs/` directory; the first prefix
/// outside one is the root install and is reported as `base`. Prefix-only
/// environments elsewhere have no name and are left out.
pub(crate) fn parse_env_list(json: &str) -> Result<Vec<String>> {
    let list: EnvList = serde_json::from_str(json)?;
    let mut names = Vec::new();
    let mut seen_root = false;
    for prefix in &list.envs {
        if parent_is_envs_dir(prefix) {
            if let Some(name) = prefix.file_name() {
                names.push(name.to_string_lossy().into_owned());
            }
        } else if !seen_root {
            seen_root = true;
            names.push("base".to_string());
        }
    }
    Ok(names)
}

fn parent_is_envs_dir(prefix: &Path) -> bool {
    prefix
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "envs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;

    const ENV_LIST: &str = r#"{
  "envs": [
    "/opt/homebrew/Caskroom/miniforge/base",
    "/opt/homebrew/Caskroom/miniforge/base/envs/dev-old",
    "/opt/homebrew/Caskroom/miniforge/base/envs/devtools",
    "/Users/me/projects/site/.venv-conda"
  ]
}"#;

    fn spec() -> EnvironmentSpec {
        EnvironmentSpec::parse("name: dev\n", Path::new("/tmp/environment.yml")).unwrap()
    }

    #[test]
    fn parses_named_environments() {
        assert_eq!(
            parse_env_list(ENV_LIST).unwrap(),
            vec!["base", "dev-old", "devtools"]
        );
    }

    #[test]
    fn rejects_garbage_listing() {
        assert!(parse_env_list("# conda environments:").is_err());
    }

    #[test]
    fn lists_through_runner() {
        let runner = ScriptedRunner::new();
        runner.ok("mamba env list --json", ENV_LIST);
        let mamba = Conda::new("/opt/homebrew/bin/mamba", &runner);
        assert_eq!(mamba.name(), "mamba");
        assert_eq!(mamba.list_environments().unwrap().len(), 3);
    }

    #[test]
    fn create_and_update_commands() {
        let runner = ScriptedRunner::new();
        let conda = Conda::new("conda", &runner);
        conda.create("dev", &spec()).unwrap();
        conda.update("dev", &spec(), true).unwrap();
        conda.clean().unwrap();
        conda.self_update().unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "conda env create --name dev --file /tmp/environment.yml",
                "conda env update --name dev --file /tmp/environment.yml --prune",
                "conda clean --all --yes",
                "conda update --name base --yes conda",
            ]
        );
    }

    #[test]
    fn failed_update_is_an_error() {
        let runner = ScriptedRunner::new();
        runner.fail("conda env update", "PackagesNotFoundError");
        let conda = Conda::new("conda", &runner);
        let err = conda.update("dev", &spec(), true).unwrap_err();
        assert!(err.to_string().contains("PackagesNotFoundError"));
    }
}
