use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ui;

/// File name of the package configuration at the workspace root
pub const CONFIG_FILE_NAME: &str = "package_config.json";

/// Workspace path types
#[derive(Debug, Clone, Copy)]
pub enum WorkspacePath {
    /// Workspace root: --root, $PIPKEEPER_HOME or the current directory
    Root,
    /// Package configuration: root/package_config.json (or --config)
    ConfigFile,
    /// Run logs: root/logs
    Logs,
    /// Virtual environment area: root/venv
    Venv,
    /// Environment directories: root/venv/environments
    Environments,
    /// Requirement manifests: root/venv/requirements
    Requirements,
    /// Activation shortcuts: root/aliases
    Aliases,
}

/// Workspace - the directory pipkeeper keeps its files in
///
/// Everything lives under one root so a project folder can carry its own
/// configuration, logs and environments.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config_file: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `root`, or at the current directory.
    pub fn new(root: Option<&Path>) -> Result<Self> {
        let root = match root {
            Some(path) => Self::expand(path),
            None => env::current_dir().context("Failed to determine current directory")?,
        };
        let config_file = root.join(CONFIG_FILE_NAME);

        Ok(Self { root, config_file })
    }

    /// Use a configuration file outside the workspace root.
    pub fn with_config_file(mut self, path: &Path) -> Self {
        self.config_file = Self::expand(path);
        self
    }

    fn expand(path: &Path) -> PathBuf {
        let raw = path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }

    /// Get path for a specific workspace location
    pub fn path(&self, path_type: WorkspacePath) -> PathBuf {
        match path_type {
            WorkspacePath::Root => self.root.clone(),
            WorkspacePath::ConfigFile => self.config_file.clone(),
            WorkspacePath::Logs => self.root.join("logs"),
            WorkspacePath::Venv => self.root.join("venv"),
            WorkspacePath::Environments => self.root.join("venv").join("environments"),
            WorkspacePath::Requirements => self.root.join("venv").join("requirements"),
            WorkspacePath::Aliases => self.root.join("aliases"),
        }
    }

    /// Directory of a named virtual environment
    pub fn env_dir(&self, name: &str) -> PathBuf {
        self.path(WorkspacePath::Environments).join(name)
    }

    /// Requirements manifest of a named virtual environment
    pub fn requirements_file(&self, name: &str) -> PathBuf {
        self.path(WorkspacePath::Requirements)
            .join(format!("requirements_{name}.txt"))
    }

    /// Create the environment directories if they are missing.
    pub fn ensure_env_layout(&self) -> Result<()> {
        for kind in [
            WorkspacePath::Venv,
            WorkspacePath::Environments,
            WorkspacePath::Requirements,
        ] {
            let dir = self.path(kind);
            if !dir.exists() {
                fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory {:?}", dir))?;
                ui::status("Created", dir.display());
            }
        }
        Ok(())
    }
}
