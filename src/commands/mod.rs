use crate::cli::{Cli, Commands};
use crate::{AssumeYes, Pip, Prompt, StdinPrompt, Workspace};
use anyhow::Result;

mod alias;
mod check;
mod env;
mod outdated;
mod upgrade;
mod upgrade_pip;

pub fn execute(cli: Cli) -> Result<()> {
    // Create workspace - this is the root entry point
    let mut workspace = Workspace::new(cli.root.as_deref())?;
    if let Some(config) = &cli.config {
        workspace = workspace.with_config_file(config);
    }

    let python = cli
        .python
        .clone()
        .unwrap_or_else(|| Pip::default_python().to_string());
    let pip = Pip::new(python);

    let mut prompt: Box<dyn Prompt> = if cli.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinPrompt::new())
    };

    match cli.command {
        Commands::Upgrade { max_repair_rounds } => {
            upgrade::execute(&workspace, &pip, &mut prompt, max_repair_rounds)
        }

        Commands::UpgradePip => upgrade_pip::execute(&pip),

        Commands::Outdated => outdated::execute(&pip),

        Commands::Check => check::execute(&workspace, &pip, &mut prompt),

        Commands::Env { action } => env::execute(&workspace, &pip, prompt.as_mut(), action),

        Commands::Alias {
            name,
            shell,
            new_terminal,
        } => alias::execute(&workspace, name, shell, new_terminal),
    }
}
