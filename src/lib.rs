// Public API
pub mod cli;
pub mod commands;

// Core domain types
mod alias;
mod config;
mod error;
mod pip;
mod prompt;
mod runlog;
mod ui;
mod upgrade;
mod venv;
mod workspace;

// Re-export main types
pub use alias::{ShortcutShell, ShortcutWriter};
pub use config::{ConfigLoad, PackageConfig};
pub use error::{NameError, PipError};
pub use pip::{CommandOutput, Conflict, PackageManager, PackageSpec, Pip, PipUpgrade};
pub use prompt::{AssumeYes, Prompt, StdinPrompt};
pub use runlog::RunLog;
pub use upgrade::{SkipReason, UpgradeOptions, UpgradeSummary, Upgrader};
pub use venv::EnvironmentManager;
pub use workspace::{Workspace, WorkspacePath};
