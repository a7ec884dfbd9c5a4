use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ui;
use crate::venv::{list_environments, scripts_dir};

/// Shell a generated activation shortcut is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutShell {
    Sh,
    Bash,
    Zsh,
    Fish,
    Cmd,
    PowerShell,
}

pub const ALL_SHELLS: [ShortcutShell; 6] = [
    ShortcutShell::Sh,
    ShortcutShell::Bash,
    ShortcutShell::Zsh,
    ShortcutShell::Fish,
    ShortcutShell::Cmd,
    ShortcutShell::PowerShell,
];

impl ShortcutShell {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "sh" => Some(ShortcutShell::Sh),
            "bash" => Some(ShortcutShell::Bash),
            "zsh" => Some(ShortcutShell::Zsh),
            "fish" => Some(ShortcutShell::Fish),
            "cmd" | "bat" => Some(ShortcutShell::Cmd),
            "powershell" | "pwsh" | "ps1" => Some(ShortcutShell::PowerShell),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShortcutShell::Sh => "sh",
            ShortcutShell::Bash => "bash",
            ShortcutShell::Zsh => "zsh",
            ShortcutShell::Fish => "fish",
            ShortcutShell::Cmd => "cmd",
            ShortcutShell::PowerShell => "powershell",
        }
    }

    /// Batch files on Windows, POSIX shell scripts elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            ShortcutShell::Cmd
        } else {
            ShortcutShell::Sh
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ShortcutShell::Sh | ShortcutShell::Bash | ShortcutShell::Zsh => "sh",
            ShortcutShell::Fish => "fish",
            ShortcutShell::Cmd => "bat",
            ShortcutShell::PowerShell => "ps1",
        }
    }

    /// Activation script this shell sources inside an environment
    pub fn activation_script(self, env_dir: &Path) -> PathBuf {
        let scripts = scripts_dir(env_dir);
        match self {
            ShortcutShell::Sh | ShortcutShell::Bash | ShortcutShell::Zsh => {
                scripts.join("activate")
            }
            ShortcutShell::Fish => scripts.join("activate.fish"),
            ShortcutShell::Cmd => scripts.join("activate.bat"),
            ShortcutShell::PowerShell => scripts.join("Activate.ps1"),
        }
    }

    /// Shortcut file contents for an activation script
    pub fn format_shortcut(self, activate: &Path, new_terminal: bool) -> String {
        match self {
            ShortcutShell::Sh | ShortcutShell::Bash | ShortcutShell::Zsh => {
                self.format_posix(activate, new_terminal)
            }
            ShortcutShell::Fish => self.format_fish(activate, new_terminal),
            ShortcutShell::Cmd => self.format_cmd(activate, new_terminal),
            ShortcutShell::PowerShell => self.format_powershell(activate, new_terminal),
        }
    }

    fn format_posix(self, activate: &Path, new_terminal: bool) -> String {
        let shell = self.as_str();
        let mut script = format!("#!/usr/bin/env {shell}\n. \"{}\"\n", activate.display());
        if new_terminal {
            script.push_str(&format!("exec {shell} -i\n"));
        }
        script
    }

    fn format_fish(self, activate: &Path, new_terminal: bool) -> String {
        let mut script = format!("#!/usr/bin/env fish\nsource \"{}\"\n", activate.display());
        if new_terminal {
            script.push_str("exec fish\n");
        }
        script
    }

    fn format_cmd(self, activate: &Path, new_terminal: bool) -> String {
        if new_terminal {
            format!("@echo off\nstart cmd /k call \"{}\"\n", activate.display())
        } else {
            format!("@echo off\ncall \"{}\"\n", activate.display())
        }
    }

    fn format_powershell(self, activate: &Path, new_terminal: bool) -> String {
        if new_terminal {
            format!(
                "Start-Process powershell -ArgumentList '-NoExit', '-File', \"{}\"\n",
                activate.display()
            )
        } else {
            format!("& \"{}\"\n", activate.display())
        }
    }
}

/// Shortcut file name for an environment
pub fn shortcut_file_name(env_name: &str, shell: ShortcutShell) -> String {
    format!("activate_{env_name}.{}", shell.extension())
}

/// Writes activation shortcuts into the aliases directory.
#[derive(Debug, Clone)]
pub struct ShortcutWriter {
    aliases_dir: PathBuf,
    environments_dir: PathBuf,
    shell: ShortcutShell,
    new_terminal: bool,
}

impl ShortcutWriter {
    pub fn new(aliases_dir: PathBuf, environments_dir: PathBuf, shell: ShortcutShell) -> Self {
        Self {
            aliases_dir,
            environments_dir,
            shell,
            new_terminal: false,
        }
    }

    /// Make shortcuts open a fresh interactive session.
    pub fn new_terminal(mut self, enabled: bool) -> Self {
        self.new_terminal = enabled;
        self
    }

    /// Write the shortcut for one environment.
    ///
    /// Returns `None` when the environment is missing or has no activation
    /// script for this shell.
    pub fn write(&self, env_name: &str) -> Result<Option<PathBuf>> {
        let env_dir = self.environments_dir.join(env_name);
        let activate = self.shell.activation_script(&env_dir);
        if !env_dir.is_dir() || !activate.is_file() {
            ui::warn(format!(
                "Environment '{env_name}' does not exist or is not valid."
            ));
            return Ok(None);
        }

        fs::create_dir_all(&self.aliases_dir)
            .with_context(|| format!("Failed to create alias directory {:?}", self.aliases_dir))?;

        let file_name = shortcut_file_name(env_name, self.shell);
        let path = self.aliases_dir.join(&file_name);
        let contents = self.shell.format_shortcut(&activate, self.new_terminal);
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write shortcut {:?}", path))?;
        make_executable(&path)?;

        ui::success("Alias", format!("created: {file_name}"));
        Ok(Some(path))
    }

    /// Write shortcuts for every environment.
    pub fn write_all(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for env_name in list_environments(&self.environments_dir)? {
            if let Some(path) = self.write(&env_name)? {
                created.push(path);
            }
        }

        if !created.is_empty() {
            ui::info(format!(
                "All alias scripts saved in: {}",
                self.aliases_dir.display()
            ));
        }
        Ok(created)
    }
}

/// Remove every shortcut generated for an environment, whatever the shell.
pub fn remove_shortcuts(aliases_dir: &Path, env_name: &str) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for shell in ALL_SHELLS {
        let path = aliases_dir.join(shortcut_file_name(env_name, shell));
        if path.is_file() && !removed.contains(&path) {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove shortcut {:?}", path))?;
            removed.push(path);
        }
    }
    Ok(removed)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)
        .with_context(|| format!("Failed to read permissions of {:?}", path))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to mark {:?} executable", path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
