use crate::provision::{Provisioner, StageSelection};
use crate::stage::{any_failed, StageResult};
use crate::ui;

pub fn execute(provisioner: &mut Provisioner<'_>, selection: StageSelection) -> Vec<StageResult> {
    ui::status("Probe", provisioner.tools().summary());

    let label = match selection {
        StageSelection::Probe => "Probe",
        StageSelection::Bundle => "Bundle",
        StageSelection::Env => "Env",
        StageSelection::Update => "Update",
        StageSelection::All => "All",
    };
    let progress = ui::Progress::new(label, format!("{} stage(s)", label.to_lowercase()));
    let results = provisioner.run(selection);
    if any_failed(&results) {
        progress.fail("Finished");
    } else {
        progress.success("Finished");
    }
    results
}
