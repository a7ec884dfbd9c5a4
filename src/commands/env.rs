use crate::cli::EnvAction;
use crate::{ui, EnvironmentManager, Pip, Prompt, ShortcutShell, Workspace};
use anyhow::Result;

const MENU: [&str; 9] = [
    "Create a virtual environment",
    "Activate a virtual environment",
    "Deactivate the virtual environment",
    "Generate/update requirements file",
    "Install dependencies from requirements file",
    "Copy dependencies to another environment",
    "Delete a virtual environment",
    "List virtual environments",
    "Exit",
];

pub fn execute(
    workspace: &Workspace,
    pip: &Pip,
    prompt: &mut dyn Prompt,
    action: Option<EnvAction>,
) -> Result<()> {
    let manager = EnvironmentManager::new(
        workspace.clone(),
        pip.python(),
        ShortcutShell::platform_default(),
    );

    match action.unwrap_or(EnvAction::Menu) {
        EnvAction::Menu => menu(&manager, prompt),
        EnvAction::Create { name } => manager.create(&name).map(drop),
        EnvAction::Activate { name } => manager.print_activation(&name),
        EnvAction::Deactivate => {
            manager.print_deactivation();
            Ok(())
        }
        EnvAction::Freeze { name } => manager.freeze(&name).map(drop),
        EnvAction::Install { name } => manager.install(&name, prompt).map(drop),
        EnvAction::Copy {
            source,
            destination,
        } => manager.copy(&source, &destination, prompt).map(drop),
        EnvAction::Delete { name } => manager.delete(&name).map(drop),
        EnvAction::List => print_list(&manager),
    }
}

fn print_list(manager: &EnvironmentManager) -> Result<()> {
    let names = manager.list()?;
    if names.is_empty() {
        ui::info("No virtual environments found.");
    } else {
        ui::info("Available virtual environments:");
        for name in names {
            ui::item(name);
        }
    }
    Ok(())
}

/// Ask for an environment name; `None` on end of input.
fn ask_name(prompt: &mut dyn Prompt, question: &str) -> Result<Option<String>> {
    Ok(prompt
        .ask(question)?
        .map(|answer| answer.trim().to_string()))
}

/// Numbered menu loop. Stops on "9" or when input runs out.
fn menu(manager: &EnvironmentManager, prompt: &mut dyn Prompt) -> Result<()> {
    loop {
        ui::line("");
        ui::line("Virtual Environment Manager");
        for (index, entry) in MENU.iter().enumerate() {
            ui::line(format!("{}. {entry}", index + 1));
        }

        let Some(choice) = prompt.ask("Enter your choice (1-9):")? else {
            return Ok(());
        };

        let outcome = match choice.trim() {
            "1" => match ask_name(prompt, "Enter the name of the virtual environment:")? {
                Some(name) => manager.create(&name).map(drop),
                None => return Ok(()),
            },
            "2" => match ask_name(prompt, "Enter the name of the virtual environment to activate:")? {
                Some(name) => manager.print_activation(&name),
                None => return Ok(()),
            },
            "3" => {
                manager.print_deactivation();
                Ok(())
            }
            "4" => match ask_name(prompt, "Enter the name of the virtual environment:")? {
                Some(name) => manager.freeze(&name).map(drop),
                None => return Ok(()),
            },
            "5" => match ask_name(prompt, "Enter the name of the virtual environment:")? {
                Some(name) => manager.install(&name, prompt).map(drop),
                None => return Ok(()),
            },
            "6" => {
                let Some(source) = ask_name(prompt, "Enter the name of the source environment:")?
                else {
                    return Ok(());
                };
                let Some(destination) =
                    ask_name(prompt, "Enter the name of the destination environment:")?
                else {
                    return Ok(());
                };
                manager.copy(&source, &destination, prompt).map(drop)
            }
            "7" => match ask_name(prompt, "Enter the name of the virtual environment to delete:")? {
                Some(name) => manager.delete(&name).map(drop),
                None => return Ok(()),
            },
            "8" => print_list(manager),
            "9" => {
                ui::info("Exiting...");
                return Ok(());
            }
            other => {
                ui::error(format!("Invalid choice '{other}'. Please try again."));
                Ok(())
            }
        };

        // A failed action is reported and the menu comes back.
        if let Err(err) = outcome {
            ui::error(format!("{err:#}"));
        }
    }
}
