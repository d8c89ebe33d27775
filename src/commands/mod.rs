use crate::cli::{Cli, Commands};
use crate::probe::PathLocator;
use crate::process::SystemRunner;
use crate::provision::{Provisioner, StageSelection};
use crate::stage::{any_failed, StageResult};
use crate::{ui, Workspace};
use anyhow::Result;
use std::process::ExitCode;

mod check;
mod stages;

pub fn execute(cli: Cli) -> Result<ExitCode> {
    let workspace = Workspace::new()?;

    let selection = match cli.command {
        Commands::Check => return check::execute(&workspace),
        Commands::Probe => StageSelection::Probe,
        Commands::Bundle => StageSelection::Bundle,
        Commands::Env => StageSelection::Env,
        Commands::Update => StageSelection::Update,
        Commands::All => StageSelection::All,
    };

    let runner = SystemRunner;
    let locator = PathLocator;
    let mut provisioner = Provisioner::new(&workspace, &runner, &locator);
    let results = stages::execute(&mut provisioner, selection);
    Ok(finish(&results))
}

/// Print the run report; any failed result makes the exit code non-zero.
fn finish(results: &[StageResult]) -> ExitCode {
    ui::report(results);
    if any_failed(results) {
        ui::error("One or more stages failed; fix the errors above and re-run.");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
