use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::alias::{remove_shortcuts, ShortcutShell, ShortcutWriter};
use crate::error::validate_env_name;
use crate::pip::run_command;
use crate::prompt::Prompt;
use crate::ui;
use crate::workspace::{Workspace, WorkspacePath};

/// Directory holding an environment's executables (`Scripts` on Windows).
pub fn scripts_dir(env_dir: &Path) -> PathBuf {
    let windows_layout = env_dir.join("Scripts");
    if cfg!(windows) || windows_layout.is_dir() {
        windows_layout
    } else {
        env_dir.join("bin")
    }
}

/// Interpreter inside an environment
pub fn env_python(env_dir: &Path) -> PathBuf {
    let scripts = scripts_dir(env_dir);
    if cfg!(windows) {
        scripts.join("python.exe")
    } else {
        scripts.join("python")
    }
}

/// Environment names found in `environments_dir`, sorted.
pub fn list_environments(environments_dir: &Path) -> Result<Vec<String>> {
    if !environments_dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(environments_dir)
        .with_context(|| format!("Failed to read {:?}", environments_dir))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Creates, inspects and removes virtual environments under the workspace.
#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    workspace: Workspace,
    python: String,
    shell: ShortcutShell,
}

impl EnvironmentManager {
    pub fn new(workspace: Workspace, python: impl Into<String>, shell: ShortcutShell) -> Self {
        Self {
            workspace,
            python: python.into(),
            shell,
        }
    }

    fn existing_env(&self, name: &str) -> Result<Option<PathBuf>> {
        let name = validate_env_name(name)?;
        let env_dir = self.workspace.env_dir(name);
        if env_dir.is_dir() {
            Ok(Some(env_dir))
        } else {
            ui::warn(format!("The environment '{name}' does not exist."));
            Ok(None)
        }
    }

    /// Create an environment with `python -m venv` and write its shortcut.
    ///
    /// Returns `false` when the environment already exists.
    pub fn create(&self, name: &str) -> Result<bool> {
        let name = validate_env_name(name)?;
        self.workspace.ensure_env_layout()?;

        let env_dir = self.workspace.env_dir(name);
        if env_dir.exists() {
            ui::info(format!("The environment '{name}' already exists."));
            return Ok(false);
        }

        let progress = ui::Progress::new("Creating", format!("virtual environment '{name}'"));
        let env_arg = env_dir.to_string_lossy().into_owned();
        let output = run_command(&self.python, ["-m", "venv", env_arg.as_str()])?;
        if !output.success {
            let error = output.first_error_line();
            progress.fail("Failed", &error);
            bail!("Failed to create environment '{name}': {error}");
        }
        progress.success("Created", None);

        let writer = ShortcutWriter::new(
            self.workspace.path(WorkspacePath::Aliases),
            self.workspace.path(WorkspacePath::Environments),
            self.shell,
        );
        if let Err(err) = writer.write(name) {
            ui::warn(format!("Could not create alias: {err:#}"));
        }
        Ok(true)
    }

    /// Command that activates an environment in the current shell.
    pub fn activation_command(&self, name: &str) -> Result<Option<String>> {
        let Some(env_dir) = self.existing_env(name)? else {
            return Ok(None);
        };

        let scripts = scripts_dir(&env_dir);
        let command = if cfg!(windows) {
            let script = scripts.join("activate.bat");
            script.is_file().then(|| script.display().to_string())
        } else {
            let script = scripts.join("activate");
            script.is_file().then(|| format!("source {}", script.display()))
        };

        if command.is_none() {
            ui::warn(format!(
                "The environment '{name}' has no activation script."
            ));
        }
        Ok(command)
    }

    pub fn print_activation(&self, name: &str) -> Result<()> {
        if let Some(command) = self.activation_command(name)? {
            ui::info(format!(
                "To activate the environment '{}', run the following command:",
                name.trim()
            ));
            ui::line(command);
        }
        Ok(())
    }

    pub fn print_deactivation(&self) {
        ui::info("To deactivate the active virtual environment, run 'deactivate' in the terminal.");
    }

    /// Write `pip freeze` of an environment into its requirements file.
    pub fn freeze(&self, name: &str) -> Result<Option<PathBuf>> {
        let Some(env_dir) = self.existing_env(name)? else {
            return Ok(None);
        };
        let name = name.trim();
        self.workspace.ensure_env_layout()?;

        let requirements = self.workspace.requirements_file(name);
        if !requirements.exists() {
            fs::write(&requirements, "")
                .with_context(|| format!("Failed to create {:?}", requirements))?;
            ui::status("Created", requirements.display());
        }

        let progress = ui::Progress::new("Freezing", format!("requirements for '{name}'"));
        let python = env_python(&env_dir).to_string_lossy().into_owned();
        let output = run_command(&python, ["-m", "pip", "freeze"])?;
        if !output.success {
            let error = output.first_error_line();
            progress.fail("Failed", &error);
            bail!("Failed to freeze environment '{name}': {error}");
        }

        fs::write(&requirements, &output.stdout)
            .with_context(|| format!("Failed to write {:?}", requirements))?;
        let count = output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count();
        progress.success("Generated", Some(format!("({count} packages)")));
        ui::info(format!("Path: {}", requirements.display()));
        Ok(Some(requirements))
    }

    /// Install an environment's own requirements file into it.
    pub fn install(&self, name: &str, prompt: &mut dyn Prompt) -> Result<bool> {
        self.copy(name, name, prompt)
    }

    /// Install the requirements file of `source` into `destination`.
    ///
    /// A missing requirements file is created empty and nothing is installed;
    /// a missing destination is created after confirmation.
    pub fn copy(&self, source: &str, destination: &str, prompt: &mut dyn Prompt) -> Result<bool> {
        if self.existing_env(source)?.is_none() {
            return Ok(false);
        }
        let source = source.trim();
        let destination = validate_env_name(destination)?;
        self.workspace.ensure_env_layout()?;

        let requirements = self.workspace.requirements_file(source);
        let file_name = requirements
            .file_name()
            .map(|file| file.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !requirements.exists() {
            fs::write(&requirements, "")
                .with_context(|| format!("Failed to create {:?}", requirements))?;
            ui::info(format!("Created '{file_name}' file."));
            return Ok(false);
        }

        let contents = fs::read_to_string(&requirements)
            .with_context(|| format!("Failed to read {:?}", requirements))?;
        if contents.trim().is_empty() {
            ui::info(format!("The requirements file '{file_name}' is empty."));
            return Ok(false);
        }

        let dst_dir = self.workspace.env_dir(destination);
        if !dst_dir.is_dir() {
            ui::warn(format!("The environment '{destination}' does not exist."));
            if !prompt.confirm("Do you want to create it?")? || !self.create(destination)? {
                return Ok(false);
            }
        }

        let progress = ui::Progress::new(
            "Installing",
            format!("dependencies from '{file_name}' into '{destination}'"),
        );
        let python = env_python(&dst_dir).to_string_lossy().into_owned();
        let req_arg = requirements.to_string_lossy().into_owned();
        let output = run_command(&python, ["-m", "pip", "install", "-r", req_arg.as_str()])?;
        if !output.success {
            let error = output.first_error_line();
            progress.fail("Failed", &error);
            bail!("Failed to install dependencies into '{destination}': {error}");
        }
        progress.success("Installed", None);
        Ok(true)
    }

    /// Remove an environment and its shortcuts.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let Some(env_dir) = self.existing_env(name)? else {
            return Ok(false);
        };
        let name = name.trim();

        let progress = ui::Progress::new("Deleting", format!("virtual environment '{name}'"));
        fs::remove_dir_all(&env_dir)
            .with_context(|| format!("Failed to remove environment {:?}", env_dir))?;
        progress.success("Deleted", None);

        let removed = remove_shortcuts(&self.workspace.path(WorkspacePath::Aliases), name)?;
        if !removed.is_empty() {
            ui::info(format!(
                "The corresponding alias file(s) for '{name}' have been deleted."
            ));
        }
        Ok(true)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        list_environments(&self.workspace.path(WorkspacePath::Environments))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::prompt::AssumeYes;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Stand-in for `python -m venv <dir>` that lays out a minimal environment
    /// whose interpreter records the arguments it receives.
    fn fake_python(temp: &TempDir) -> String {
        let path = temp.path().join("tools/python");
        write_script(
            &path,
            r#"mkdir -p "$3/bin"
touch "$3/bin/activate"
cat > "$3/bin/python" <<'EOF'
#!/bin/sh
if [ "$3" = "freeze" ]; then
  echo "requests==2.31.0"
  echo "rich==13.7.0"
else
  echo "$@" > "$(dirname "$0")/../args.txt"
fi
EOF
chmod 755 "$3/bin/python""#,
        );
        path.to_string_lossy().into_owned()
    }

    fn manager(temp: &TempDir) -> EnvironmentManager {
        let workspace = Workspace::new(Some(temp.path())).unwrap();
        EnvironmentManager::new(workspace, fake_python(temp), ShortcutShell::Sh)
    }

    #[test]
    fn test_create_environment_and_shortcut() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        assert!(manager.create("web").unwrap());
        assert!(temp.path().join("venv/environments/web/bin/activate").exists());
        assert!(temp.path().join("aliases/activate_web.sh").exists());

        // Second create is a no-op
        assert!(!manager.create("web").unwrap());
        assert_eq!(manager.list().unwrap(), vec!["web"]);
    }

    #[test]
    fn test_create_rejects_bad_names() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);

        assert!(manager.create("../escape").is_err());
        assert!(manager.create("").is_err());
    }

    #[test]
    fn test_activation_command() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        manager.create("web").unwrap();

        let command = manager.activation_command("web").unwrap().unwrap();
        assert!(command.starts_with("source "));
        assert!(command.ends_with("venv/environments/web/bin/activate"));
        assert_eq!(manager.activation_command("missing").unwrap(), None);
    }

    #[test]
    fn test_freeze_writes_requirements() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        manager.create("web").unwrap();

        let path = manager.freeze("web").unwrap().unwrap();
        assert_eq!(
            path,
            temp.path().join("venv/requirements/requirements_web.txt")
        );
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "requests==2.31.0\nrich==13.7.0\n"
        );
        assert_eq!(manager.freeze("missing").unwrap(), None);
    }

    #[test]
    fn test_copy_creates_missing_requirements_and_stops() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        manager.create("web").unwrap();

        assert!(!manager.copy("web", "api", &mut AssumeYes).unwrap());
        let requirements = temp.path().join("venv/requirements/requirements_web.txt");
        assert_eq!(fs::read_to_string(requirements).unwrap(), "");
        assert!(!temp.path().join("venv/environments/api").exists());

        // Empty file: still nothing to install
        assert!(!manager.copy("web", "api", &mut AssumeYes).unwrap());
    }

    #[test]
    fn test_copy_installs_into_created_destination() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        manager.create("web").unwrap();
        manager.freeze("web").unwrap();

        assert!(manager.copy("web", "api", &mut AssumeYes).unwrap());

        let args = fs::read_to_string(temp.path().join("venv/environments/api/args.txt")).unwrap();
        assert!(args.starts_with("-m pip install -r "));
        assert!(args.trim_end().ends_with("requirements_web.txt"));
    }

    #[test]
    fn test_install_uses_own_requirements() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        manager.create("web").unwrap();
        manager.freeze("web").unwrap();

        assert!(manager.install("web", &mut AssumeYes).unwrap());
        assert!(temp.path().join("venv/environments/web/args.txt").exists());
    }

    #[test]
    fn test_delete_removes_environment_and_shortcut() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        manager.create("web").unwrap();
        manager.create("api").unwrap();

        assert!(manager.delete("web").unwrap());
        assert!(!temp.path().join("venv/environments/web").exists());
        assert!(!temp.path().join("aliases/activate_web.sh").exists());
        assert!(temp.path().join("aliases/activate_api.sh").exists());
        assert_eq!(manager.list().unwrap(), vec!["api"]);

        assert!(!manager.delete("web").unwrap());
    }

    #[test]
    fn test_list_ignores_files() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        assert!(manager.list().unwrap().is_empty());

        let envs = temp.path().join("venv/environments");
        fs::create_dir_all(envs.join("zeta")).unwrap();
        fs::create_dir_all(envs.join("alpha")).unwrap();
        fs::write(envs.join("notes.txt"), "").unwrap();

        assert_eq!(manager.list().unwrap(), vec!["alpha", "zeta"]);
    }
}
