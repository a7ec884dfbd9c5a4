use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Python package keeper - Keep pip packages and virtual environments tidy
///
/// pipkeeper upgrades outdated pip packages while honouring a blacklist and
/// pinned versions from `package_config.json`, and manages virtual
/// environments together with their requirement manifests and activation
/// shortcuts. Every upgrade run is recorded in a timestamped log file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Root directory for config, logs, environments and shortcuts
    #[arg(long, global = true, value_name = "DIR", env = "PIPKEEPER_HOME")]
    pub root: Option<PathBuf>,

    /// Package configuration file (defaults to <root>/package_config.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Python interpreter used to run pip and venv
    #[arg(long, global = true, value_name = "PYTHON", env = "PIPKEEPER_PYTHON")]
    pub python: Option<String>,

    /// Answer yes to every question (fully automatic run)
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upgrade outdated packages (respects blacklist and pinned versions)
    ///
    /// Upgrades pip, lists outdated packages, checks dependency conflicts,
    /// upgrades every package that is not blacklisted and prints a summary.
    Upgrade {
        /// Maximum number of conflict repair rounds after the upgrade
        #[arg(long, value_name = "N", default_value_t = 3)]
        max_repair_rounds: usize,
    },

    /// Upgrade pip itself
    UpgradePip,

    /// List outdated packages
    Outdated,

    /// Check installed packages for dependency conflicts
    Check,

    /// Manage virtual environments (interactive menu when no action is given)
    Env {
        #[command(subcommand)]
        action: Option<EnvAction>,
    },

    /// Generate activation shortcuts for virtual environments
    Alias {
        /// Environment name (generates shortcuts for all environments if not specified)
        #[arg(value_name = "ENV")]
        name: Option<String>,

        /// Shell the shortcut is written for (sh, bash, zsh, fish, cmd, powershell)
        #[arg(short, long, value_name = "SHELL")]
        shell: Option<String>,

        /// Open a new terminal session when the shortcut runs
        #[arg(long)]
        new_terminal: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum EnvAction {
    /// Show the numbered environment menu
    Menu,

    /// Create a new virtual environment
    Create {
        #[arg(value_name = "ENV")]
        name: String,
    },

    /// Print the command that activates an environment
    Activate {
        #[arg(value_name = "ENV")]
        name: String,
    },

    /// Print how to deactivate the active environment
    Deactivate,

    /// Generate or update the requirements file of an environment
    Freeze {
        #[arg(value_name = "ENV")]
        name: String,
    },

    /// Install an environment's requirements file into it
    Install {
        #[arg(value_name = "ENV")]
        name: String,
    },

    /// Install the requirements of one environment into another
    Copy {
        /// Environment whose requirements file is used
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Environment receiving the packages
        #[arg(value_name = "DESTINATION")]
        destination: String,
    },

    /// Delete an environment and its activation shortcuts
    Delete {
        #[arg(value_name = "ENV")]
        name: String,
    },

    /// List virtual environments
    List,
}
