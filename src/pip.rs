//! Driving pip through the Python interpreter.
//!
//! Nothing here resolves or installs packages itself: every operation is a
//! `python -m pip ...` invocation whose exit status and text output are
//! interpreted by the small parsers at the bottom of this module.

use anyhow::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fmt;
use std::process::Command;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::PipError;

static NAME_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("valid separator regex"));

static HAS_REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) \S+ has requirement ([A-Za-z0-9][A-Za-z0-9._-]*)")
        .expect("valid requirement regex")
});

static REQUIRES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) \S+ requires ([A-Za-z0-9][A-Za-z0-9._-]*)")
        .expect("valid requires regex")
});

/// Normalise a distribution name the way pip compares them (PEP 503).
pub fn normalize_name(name: &str) -> String {
    NAME_SEPARATORS
        .replace_all(name.trim(), "-")
        .to_ascii_lowercase()
}

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// First meaningful line of stderr, for one-line failure reports.
    pub fn first_error_line(&self) -> String {
        self.stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("Unknown error")
            .to_string()
    }
}

/// Run a program to completion, capturing its output.
///
/// A non-zero exit is reported through `CommandOutput::success`; only failing
/// to start the program is an error.
pub(crate) fn run_command<I, S>(program: &str, args: I) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    debug!("running {:?}", command);

    let output = command.output().map_err(|source| PipError::Unavailable {
        program: program.to_string(),
        source,
    })?;

    let result = CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!("{} exited with {:?}", program, result.code);
    Ok(result)
}

/// Requirement handed to `pip install`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn pinned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}=={}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Operations the upgrade run needs from the package manager.
pub trait PackageManager {
    /// `pip install --upgrade pip`
    fn upgrade_self(&self) -> Result<CommandOutput>;
    /// `pip list --outdated`
    fn list_outdated(&self) -> Result<CommandOutput>;
    /// `pip check`
    fn check(&self) -> Result<CommandOutput>;
    /// `pip show <package>`
    fn show(&self, package: &str) -> Result<CommandOutput>;
    /// `pip install --upgrade <spec>`
    fn install(&self, spec: &PackageSpec) -> Result<CommandOutput>;
}

/// pip reached through `<python> -m pip`.
#[derive(Debug, Clone)]
pub struct Pip {
    python: String,
}

impl Pip {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &str {
        &self.python
    }

    /// Interpreter name used when none is configured.
    pub fn default_python() -> &'static str {
        if cfg!(windows) {
            "python"
        } else {
            "python3"
        }
    }

    fn pip(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut full = vec!["-m", "pip"];
        full.extend_from_slice(args);
        run_command(&self.python, full)
    }
}

impl PackageManager for Pip {
    fn upgrade_self(&self) -> Result<CommandOutput> {
        self.pip(&["install", "--upgrade", "pip"])
    }

    fn list_outdated(&self) -> Result<CommandOutput> {
        self.pip(&["list", "--outdated"])
    }

    fn check(&self) -> Result<CommandOutput> {
        self.pip(&["check"])
    }

    fn show(&self, package: &str) -> Result<CommandOutput> {
        self.pip(&["show", package])
    }

    fn install(&self, spec: &PackageSpec) -> Result<CommandOutput> {
        let spec = spec.to_string();
        self.pip(&["install", "--upgrade", &spec])
    }
}

/// How `pip install --upgrade pip` went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipUpgrade {
    AlreadyLatest,
    Upgraded,
    Failed(String),
}

impl PipUpgrade {
    pub fn from_output(output: &CommandOutput) -> Self {
        if output.stdout.contains("Requirement already satisfied") && output.success {
            PipUpgrade::AlreadyLatest
        } else if output.success {
            PipUpgrade::Upgraded
        } else {
            PipUpgrade::Failed(output.first_error_line())
        }
    }
}

/// One broken requirement reported by `pip check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Package whose requirements are not met
    pub package: String,
    /// Dependency it complains about, when the line names one
    pub requirement: Option<String>,
    /// Line as printed by pip
    pub line: String,
}

impl Conflict {
    /// Whether `package` is the dependency this conflict complains about.
    pub fn involves_requirement(&self, package: &str) -> bool {
        self.requirement
            .as_deref()
            .is_some_and(|requirement| normalize_name(requirement) == normalize_name(package))
    }
}

/// Package names from the columnar `pip list --outdated` listing.
pub fn parse_outdated(stdout: &str) -> BTreeSet<String> {
    let mut lines = stdout.lines();
    let mut packages = BTreeSet::new();

    // Everything up to and including the dashed separator is header.
    if !lines.any(|line| line.trim_start().starts_with("---")) {
        return packages;
    }

    for line in lines {
        if let Some(name) = line.split_whitespace().next() {
            packages.insert(name.to_string());
        }
    }
    packages
}

/// Conflicts from `pip check` output.
pub fn parse_check(stdout: &str) -> Vec<Conflict> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("No broken requirements"))
        .filter_map(|line| {
            let package = line.split_whitespace().next()?.to_string();
            let requirement = HAS_REQUIREMENT
                .captures(line)
                .or_else(|| REQUIRES.captures(line))
                .map(|caps| caps[2].trim_end_matches(['.', ',']).to_string());
            Some(Conflict {
                package,
                requirement,
                line: line.to_string(),
            })
        })
        .collect()
}

/// Installed version from `pip show` output.
pub fn parse_show_version(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.strip_prefix("Version:")
            .map(|version| version.trim().to_string())
            .filter(|version| !version.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("requests", "requests")]
    #[case("Typing_Extensions", "typing-extensions")]
    #[case("zope.interface", "zope-interface")]
    #[case("Foo-_-Bar", "foo-bar")]
    fn test_normalize_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_name(input), expected);
    }

    #[test]
    fn test_parse_outdated() {
        let stdout = "\
Package    Version Latest Type
---------- ------- ------ -----
certifi    2023.5  2024.2 wheel
requests   2.28.0  2.31.0 wheel

urllib3    1.26.0  2.2.1  wheel
";
        let packages: Vec<_> = parse_outdated(stdout).into_iter().collect();
        assert_eq!(packages, vec!["certifi", "requests", "urllib3"]);
    }

    #[test]
    fn test_parse_outdated_empty() {
        assert!(parse_outdated("").is_empty());
        assert!(parse_outdated("Package Version Latest Type\n").is_empty());
    }

    #[test]
    fn test_parse_check() {
        let stdout = "\
requests 2.25.0 has requirement urllib3<1.27,>=1.21.1, but you have urllib3 2.0.7.
sphinx 7.0.0 requires docutils, which is not installed.
weird-line without structure
";
        let conflicts = parse_check(stdout);
        assert_eq!(conflicts.len(), 3);

        assert_eq!(conflicts[0].package, "requests");
        assert_eq!(conflicts[0].requirement.as_deref(), Some("urllib3"));
        assert!(conflicts[0].involves_requirement("URLLib3"));

        assert_eq!(conflicts[1].package, "sphinx");
        assert_eq!(conflicts[1].requirement.as_deref(), Some("docutils"));

        assert_eq!(conflicts[2].package, "weird-line");
        assert_eq!(conflicts[2].requirement, None);
        assert!(!conflicts[2].involves_requirement("structure"));
    }

    #[test]
    fn test_parse_check_clean() {
        assert!(parse_check("No broken requirements found.\n").is_empty());
    }

    #[test]
    fn test_parse_show_version() {
        let stdout = "Name: requests\nVersion: 2.31.0\nSummary: HTTP for Humans.\n";
        assert_eq!(parse_show_version(stdout).as_deref(), Some("2.31.0"));
        assert_eq!(parse_show_version("WARNING: Package(s) not found: x\n"), None);
    }

    #[test]
    fn test_package_spec_display() {
        assert_eq!(PackageSpec::latest("numpy").to_string(), "numpy");
        assert_eq!(
            PackageSpec::pinned("pandas", "1.5.3").to_string(),
            "pandas==1.5.3"
        );
    }

    #[rstest]
    #[case(true, "Requirement already satisfied: pip in ./lib", "", PipUpgrade::AlreadyLatest)]
    #[case(true, "Successfully installed pip-24.0", "", PipUpgrade::Upgraded)]
    #[case(false, "", "\nERROR: no network\nmore", PipUpgrade::Failed("ERROR: no network".to_string()))]
    fn test_pip_upgrade_classification(
        #[case] success: bool,
        #[case] stdout: &str,
        #[case] stderr: &str,
        #[case] expected: PipUpgrade,
    ) {
        let output = CommandOutput {
            success,
            code: Some(if success { 0 } else { 1 }),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };
        assert_eq!(PipUpgrade::from_output(&output), expected);
    }

    #[test]
    fn test_first_error_line_defaults() {
        assert_eq!(CommandOutput::default().first_error_line(), "Unknown error");
    }

    #[test]
    fn test_missing_interpreter_is_unavailable() {
        let pip = Pip::new("pipkeeper-definitely-missing-python");
        let err = pip.check().unwrap_err();
        assert!(err.downcast_ref::<PipError>().is_some());
    }
}
