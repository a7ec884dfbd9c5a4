use crate::error::validate_env_name;
use crate::workspace::WorkspacePath;
use crate::{ui, ShortcutShell, ShortcutWriter, Workspace};
use anyhow::{anyhow, Result};

pub fn execute(
    workspace: &Workspace,
    name: Option<String>,
    shell: Option<String>,
    new_terminal: bool,
) -> Result<()> {
    let shell = match shell {
        Some(shell) => ShortcutShell::from_name(&shell).ok_or_else(|| {
            anyhow!("Unknown shell '{shell}' (expected sh, bash, zsh, fish, cmd or powershell)")
        })?,
        None => ShortcutShell::platform_default(),
    };

    let writer = ShortcutWriter::new(
        workspace.path(WorkspacePath::Aliases),
        workspace.path(WorkspacePath::Environments),
        shell,
    )
    .new_terminal(new_terminal);

    match name {
        Some(name) => {
            writer.write(validate_env_name(&name)?)?;
        }
        None => {
            let written = writer.write_all()?;
            if written.is_empty() {
                ui::info("No environments with an activation script were found.");
            } else {
                ui::success(
                    "Done",
                    format!("Created {} {} alias file(s).", written.len(), shell.as_str()),
                );
            }
        }
    }
    Ok(())
}
