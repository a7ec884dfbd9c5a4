use crate::upgrade::Upgrader;
use crate::workspace::WorkspacePath;
use crate::{ui, PackageConfig, Pip, Prompt, RunLog, Workspace};
use anyhow::Result;

pub fn execute(workspace: &Workspace, pip: &Pip, prompt: &mut Box<dyn Prompt>) -> Result<()> {
    // Conflicts of blacklisted packages are ignored, so read the blacklist
    // without creating a config file as a side effect.
    let config_path = workspace.path(WorkspacePath::ConfigFile);
    let config = if config_path.exists() {
        match PackageConfig::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                ui::warn(format!(
                    "Error loading config file: {err:#}\nBlacklisted packages are not ignored."
                ));
                PackageConfig::default()
            }
        }
    } else {
        PackageConfig::default()
    };

    let log = RunLog::disabled();
    let mut upgrader = Upgrader::new(pip, prompt, &log, &config_path).with_config(config);
    let conflicts = upgrader.check_conflicts()?;

    if let Some(error) = upgrader.check_error() {
        anyhow::bail!("Dependency check failed: {error}");
    }
    if conflicts.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Dependency check failed ({} conflict(s)).", conflicts.len());
    }
}
