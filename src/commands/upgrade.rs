use crate::upgrade::{UpgradeOptions, Upgrader};
use crate::workspace::WorkspacePath;
use crate::{ui, Pip, Prompt, RunLog, Workspace};
use anyhow::Result;

pub fn execute(
    workspace: &Workspace,
    pip: &Pip,
    prompt: &mut Box<dyn Prompt>,
    max_repair_rounds: usize,
) -> Result<()> {
    let log = RunLog::open(&workspace.path(WorkspacePath::Logs));
    if let Some(path) = log.path() {
        ui::info(format!("Logging to {}", path.display()));
    }
    log.record(format!("Using interpreter: {}", pip.python()));

    let config_path = workspace.path(WorkspacePath::ConfigFile);
    let mut upgrader = Upgrader::new(pip, prompt, &log, &config_path);
    let report = upgrader.run(UpgradeOptions { max_repair_rounds })?;

    if report.cancelled {
        return Ok(());
    }
    if !report.remaining_conflicts.is_empty() {
        ui::warn(format!(
            "{} dependency conflict(s) remain; run `pipkeeper check` for details.",
            report.remaining_conflicts.len()
        ));
    }
    if let Some(path) = log.path() {
        ui::success("Logged", path.display());
    }
    Ok(())
}
