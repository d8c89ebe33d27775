use crate::environment::EnvironmentSpec;
use crate::manifest::{Manifest, PackageKind};
use crate::workspace::WorkspacePath;
use crate::{ui, Workspace};
use anyhow::Result;
use std::process::ExitCode;

pub fn execute(workspace: &Workspace) -> Result<ExitCode> {
    let mut issues = Vec::new();

    let config_file = workspace.path(WorkspacePath::ConfigFile);
    if config_file.exists() {
        ui::status("Config", config_file.display());
    } else {
        ui::info(format!("No config file at {}; using defaults", config_file.display()));
    }

    let manifest_dir = workspace.path(WorkspacePath::Manifests);
    match Manifest::load_from_dir(&manifest_dir) {
        Ok(manifest) if manifest.is_empty() => {
            ui::warn(format!("No packages declared in {}", manifest_dir.display()));
        }
        Ok(manifest) => {
            let counts: Vec<String> = PackageKind::ALL
                .iter()
                .map(|kind| format!("{} {kind}(s)", manifest.of_kind(*kind).count()))
                .collect();
            for file in manifest.files() {
                ui::status(
                    "Manifest",
                    format!("{} ({} entries)", file.path.display(), file.entries().len()),
                );
            }
            ui::success("Packages", counts.join(", "));
        }
        Err(err) => issues.push(format!("{err:#}")),
    }

    let env_file = workspace.path(WorkspacePath::EnvironmentFile);
    if env_file.exists() {
        match EnvironmentSpec::load(&env_file) {
            Ok(spec) => {
                if spec.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
                    ui::info(format!(
                        "{} has no name; using '{}'",
                        env_file.display(),
                        spec.resolved_name()
                    ));
                }
                let packages = spec.package_names();
                if !packages.is_empty() {
                    ui::status("Conda", packages.join(", "));
                }
                ui::success(
                    "Environment",
                    format!(
                        "{} ({} dependencies, channels: {})",
                        spec.resolved_name(),
                        spec.dependencies.len(),
                        spec.channels.join(", ")
                    ),
                );
            }
            Err(err) => issues.push(format!("{err:#}")),
        }
    } else {
        ui::info(format!("No environment file at {}", env_file.display()));
    }

    if issues.is_empty() {
        ui::success("Check", "Configuration is valid.");
        Ok(ExitCode::SUCCESS)
    } else {
        for issue in &issues {
            ui::error(issue);
        }
        anyhow::bail!("Configuration check failed ({} issue(s)).", issues.len());
    }
}
