//! The package upgrade run.
//!
//! A run loads the blacklist/pin configuration, upgrades pip, collects the
//! outdated packages, deals with existing dependency conflicts, upgrades what
//! is left one package at a time and reports a summary. Afterwards it
//! re-checks conflicts, offers to blacklist packages that keep breaking
//! things, and optionally repairs the remaining conflicts.

use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{ConfigLoad, PackageConfig};
use crate::pip::{
    normalize_name, parse_check, parse_outdated, parse_show_version, Conflict, PackageManager,
    PackageSpec, PipUpgrade,
};
use crate::prompt::Prompt;
use crate::runlog::RunLog;
use crate::ui;

/// Tunables for a run.
#[derive(Debug, Clone, Copy)]
pub struct UpgradeOptions {
    /// Upper bound on conflict repair rounds after the main upgrade
    pub max_repair_rounds: usize,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            max_repair_rounds: 3,
        }
    }
}

/// Why a package was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Listed in the configuration blacklist (or added to it during the run)
    Blacklisted,
    /// Had a dependency conflict the user chose not to touch
    Conflict,
    /// Pinned and already installed at the pinned version
    PinSatisfied,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Blacklisted => write!(f, "blacklisted"),
            SkipReason::Conflict => write!(f, "dependency conflict"),
            SkipReason::PinSatisfied => write!(f, "already at pinned version"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub name: String,
    /// Pinned version it was installed at, `None` for latest
    pub pinned: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of one pass over a set of packages.
///
/// Every package considered lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeSummary {
    pub succeeded: Vec<Installed>,
    pub failed: Vec<Failure>,
    pub skipped: Vec<Skipped>,
}

impl UpgradeSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn skipped_for(&self, reason: SkipReason) -> impl Iterator<Item = &Skipped> {
        self.skipped
            .iter()
            .filter(move |entry| entry.reason == reason)
    }

    fn skip(&mut self, name: &str, reason: SkipReason) {
        self.skipped.push(Skipped {
            name: name.to_string(),
            reason,
        });
    }

    /// Human readable summary, one line per entry.
    pub fn render(&self, config: &PackageConfig) -> Vec<String> {
        let mut lines = vec!["=== UPGRADE SUMMARY ===".to_string()];
        let attempted = self.succeeded.len() + self.failed.len();
        lines.push(format!(
            "Successfully upgraded: {}/{} packages",
            self.succeeded.len(),
            attempted
        ));

        let pinned: Vec<&Installed> = self
            .succeeded
            .iter()
            .filter(|entry| entry.pinned.is_some())
            .collect();
        if !pinned.is_empty() {
            lines.push(format!(
                "Packages installed with specific versions: {}",
                pinned.len()
            ));
            for entry in pinned {
                let version = entry.pinned.as_deref().unwrap_or_default();
                lines.push(format!("- {}: {}", entry.name, version));
            }
        }

        let satisfied: Vec<&Skipped> = self.skipped_for(SkipReason::PinSatisfied).collect();
        if !satisfied.is_empty() {
            lines.push(format!(
                "Packages already at specified version (skipped): {}",
                satisfied.len()
            ));
            for entry in satisfied {
                let version = config.pin_for(&entry.name).unwrap_or_default();
                lines.push(format!("- {}: {}", entry.name, version));
            }
        }

        for (reason, heading) in [
            (SkipReason::Blacklisted, "blacklisted packages"),
            (SkipReason::Conflict, "packages with dependency conflicts"),
        ] {
            let entries: Vec<&Skipped> = self.skipped_for(reason).collect();
            if !entries.is_empty() {
                lines.push(format!("Skipped {} {heading}:", entries.len()));
                lines.extend(entries.iter().map(|entry| format!("- {}", entry.name)));
            }
        }

        if !self.failed.is_empty() {
            lines.push(format!("Failed {} upgrades:", self.failed.len()));
            lines.extend(
                self.failed
                    .iter()
                    .map(|entry| format!("- {}: {}", entry.name, entry.error)),
            );
        }

        lines.push(format!(
            "Considered {} packages: {} succeeded, {} failed, {} skipped",
            self.total(),
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        ));
        lines
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// The user declined to start
    pub cancelled: bool,
    /// Main upgrade pass
    pub summary: UpgradeSummary,
    /// One summary per conflict repair round
    pub repairs: Vec<UpgradeSummary>,
    /// Conflict lines left after the last check
    pub remaining_conflicts: Vec<String>,
    /// Packages added to the blacklist during the run
    pub blacklist_added: Vec<String>,
    /// Whether the additions were written back to the config file
    pub blacklist_saved: bool,
}

/// Load the package configuration and describe it on screen and in the log.
///
/// A missing file is replaced by a default one; an unreadable one is reported
/// and an empty configuration is used instead.
pub fn load_config(path: &Path, log: &RunLog) -> Result<PackageConfig> {
    let config = match PackageConfig::load_or_create(path)? {
        ConfigLoad::Created(config) => {
            let message = format!(
                "Config file {} not found. Created default config.",
                path.display()
            );
            ui::status("Created", &message);
            log.record(message);
            config
        }
        ConfigLoad::Invalid { error } => {
            let message = format!("Error loading config file: {error}");
            ui::error(&message);
            log.record(message);
            PackageConfig::default()
        }
        ConfigLoad::Loaded(config) => {
            ui::info("Loaded configuration:");
            log.record("Loaded configuration:");
            if config.blacklist.is_empty() {
                ui::item("No blacklisted packages");
                log.record("- No blacklisted packages");
            } else {
                ui::item("Blacklisted packages:");
                log.record("- Blacklisted packages:");
                for package in &config.blacklist {
                    ui::item(format!("  {package}"));
                    log.record(format!("  - {package}"));
                }
            }
            if config.specific_versions.is_empty() {
                ui::item("No packages with specific versions");
                log.record("- No packages with specific versions");
            } else {
                ui::item("Packages with specific versions:");
                log.record("- Packages with specific versions:");
                for (package, version) in &config.specific_versions {
                    ui::item(format!("  {package}: {version}"));
                    log.record(format!("  - {package}: {version}"));
                }
            }
            config
        }
    };
    Ok(config)
}

/// Upgrade pip itself. Failures are reported, not returned.
pub fn upgrade_pip(pip: &dyn PackageManager, log: &RunLog) -> Result<PipUpgrade> {
    let progress = ui::Progress::new("Upgrading", "pip");
    log.record("Upgrading pip...");
    let output = pip.upgrade_self()?;
    log.record_output("pip install --upgrade pip", &output);

    let outcome = PipUpgrade::from_output(&output);
    match &outcome {
        PipUpgrade::AlreadyLatest => {
            progress.success("Current", Some("already at the latest version".to_string()));
            log.record("pip already at the latest version.");
        }
        PipUpgrade::Upgraded => {
            progress.success("Upgraded", Some("to the latest version".to_string()));
            log.record("pip upgraded to the latest version.");
        }
        PipUpgrade::Failed(error) => {
            progress.fail("Failed", error);
            log.record(format!("Error upgrading pip: {error}"));
        }
    }
    Ok(outcome)
}

/// Outdated packages, or none when pip cannot list them.
pub fn list_outdated(pip: &dyn PackageManager, log: &RunLog) -> Result<BTreeSet<String>> {
    ui::status("Checking", "for outdated packages...");
    log.record("Checking for outdated packages...");
    let output = pip.list_outdated()?;
    log.record_output("pip list --outdated", &output);

    if !output.success {
        let message = format!(
            "Error checking outdated packages: {}",
            output.first_error_line()
        );
        ui::error(&message);
        log.record(message);
        return Ok(BTreeSet::new());
    }

    let packages = parse_outdated(&output.stdout);
    if packages.is_empty() {
        ui::success("Up to date", "No outdated packages found.");
        log.record("No outdated packages found.");
    } else {
        for package in &packages {
            ui::item(package);
        }
        let message = format!("Found {} outdated packages.", packages.len());
        ui::info(&message);
        log.record(message);
    }
    Ok(packages)
}

fn contains_normalized(set: &BTreeSet<String>, name: &str) -> bool {
    let wanted = normalize_name(name);
    set.iter().any(|entry| normalize_name(entry) == wanted)
}

/// Drives a full upgrade run against a package manager.
pub struct Upgrader<'a, P: PackageManager, Q: Prompt> {
    pip: &'a P,
    prompt: &'a mut Q,
    log: &'a RunLog,
    config_path: PathBuf,
    config: PackageConfig,
    blacklist_added: Vec<String>,
    /// Normalised names of packages seen conflicting in the previous check
    conflict_memory: BTreeSet<String>,
    /// Why the last `pip check` failed without naming any conflict
    check_error: Option<String>,
}

impl<'a, P: PackageManager, Q: Prompt> Upgrader<'a, P, Q> {
    pub fn new(pip: &'a P, prompt: &'a mut Q, log: &'a RunLog, config_path: &Path) -> Self {
        Self {
            pip,
            prompt,
            log,
            config_path: config_path.to_path_buf(),
            config: PackageConfig::default(),
            blacklist_added: Vec::new(),
            conflict_memory: BTreeSet::new(),
            check_error: None,
        }
    }

    /// Use `config` for standalone checks; `run` reloads it from disk.
    pub fn with_config(mut self, config: PackageConfig) -> Self {
        self.config = config;
        self
    }

    /// Error reported by the last dependency check when pip failed without
    /// printing any conflict.
    pub fn check_error(&self) -> Option<&str> {
        self.check_error.as_deref()
    }

    /// Configuration in effect, including blacklist additions made this run.
    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    fn info(&self, message: impl AsRef<str>) {
        ui::info(message.as_ref());
        self.log.record(message);
    }

    fn done(&self, label: &str, message: impl AsRef<str>) {
        ui::success(label, message.as_ref());
        self.log.record(message);
    }

    fn caution(&self, message: impl AsRef<str>) {
        ui::warn(message.as_ref());
        self.log.record(message);
    }

    fn failure(&self, message: impl AsRef<str>) {
        ui::error(message.as_ref());
        self.log.record(message);
    }

    fn item(&self, message: impl AsRef<str>) {
        ui::item(message.as_ref());
        self.log.record(format!("- {}", message.as_ref()));
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.prompt.confirm(question)?;
        self.log.record(format!(
            "{question} -> {}",
            if answer { "yes" } else { "no" }
        ));
        Ok(answer)
    }

    /// Run the whole upgrade flow.
    pub fn run(&mut self, options: UpgradeOptions) -> Result<RunReport> {
        self.config = load_config(&self.config_path, self.log)?;
        let mut report = RunReport::default();

        if !self.confirm("Proceed with the full upgrade?")? {
            self.failure("Upgrade cancelled by user.");
            report.cancelled = true;
            return Ok(report);
        }

        self.upgrade_pip()?;

        let outdated = self.outdated()?;
        let mut summary = UpgradeSummary::default();
        let mut queue = BTreeSet::new();
        for package in outdated {
            if self.config.is_blacklisted(&package) {
                summary.skip(&package, SkipReason::Blacklisted);
            } else {
                queue.insert(package);
            }
        }
        let blacklisted: Vec<&Skipped> = summary.skipped_for(SkipReason::Blacklisted).collect();
        if !blacklisted.is_empty() {
            ui::status("Skipping", "blacklisted packages:");
            self.log.record("Skipping blacklisted packages:");
            for entry in blacklisted {
                self.item(&entry.name);
            }
        }

        let conflicts = self.check_conflicts()?;
        let conflicting: BTreeSet<String> = conflicts
            .iter()
            .map(|conflict| conflict.package.clone())
            .collect();
        if !conflicting.is_empty() {
            if self.confirm("Would you like to reinstall packages with existing dependency conflicts?")? {
                self.info("The following packages will be reinstalled to the most recent version:");
                for package in &conflicting {
                    if !contains_normalized(&queue, package) {
                        self.item(package);
                        queue.insert(package.clone());
                    }
                }
            } else {
                self.caution("Skipping packages with dependency conflicts.");
                for package in &conflicting {
                    if let Some(queued) = queue
                        .iter()
                        .find(|entry| normalize_name(entry) == normalize_name(package))
                        .cloned()
                    {
                        queue.remove(&queued);
                        summary.skip(&queued, SkipReason::Conflict);
                        self.item(&queued);
                    }
                }
            }
        }

        if queue.is_empty() {
            self.done("Done", "No packages to upgrade.");
            self.print_summary(&summary);
            report.summary = summary;
            self.finish(&mut report)?;
            return Ok(report);
        }

        self.upgrade_packages(&queue, &mut summary)?;
        self.print_summary(&summary);
        report.summary = summary;

        let mut conflicts = self.check_conflicts()?;
        self.suggest_breaking_packages(&queue, &conflicts)?;

        let mut rounds = 0;
        loop {
            let pending: BTreeSet<String> = conflicts
                .iter()
                .map(|conflict| conflict.package.clone())
                .filter(|package| !self.config.is_blacklisted(package))
                .collect();
            if pending.is_empty() {
                break;
            }
            if rounds >= options.max_repair_rounds {
                self.caution(format!(
                    "Stopped after {rounds} repair round(s); some dependencies are still conflicting."
                ));
                break;
            }
            if !self.confirm("Would you like to reinstall packages with existing dependency conflicts?")? {
                break;
            }

            rounds += 1;
            info!(round = rounds, packages = pending.len(), "conflict repair round");
            let mut repair = UpgradeSummary::default();
            self.upgrade_packages(&pending, &mut repair)?;
            self.print_summary(&repair);
            report.repairs.push(repair);

            conflicts = self.check_conflicts()?;
            self.suggest_breaking_packages(&pending, &conflicts)?;
        }

        report.remaining_conflicts = conflicts.into_iter().map(|conflict| conflict.line).collect();
        self.finish(&mut report)?;
        Ok(report)
    }

    /// Offer to write blacklist additions back to the config file.
    fn finish(&mut self, report: &mut RunReport) -> Result<()> {
        report.blacklist_added = self.blacklist_added.clone();
        if self.blacklist_added.is_empty() {
            return Ok(());
        }

        let file_name = self
            .config_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config_path.display().to_string());
        if !self.confirm(&format!("Would you like to update the {file_name} blacklist field?"))? {
            return Ok(());
        }

        // Appended to what is on disk so edits made during the run survive.
        match PackageConfig::append_blacklist(&self.config_path, &self.blacklist_added) {
            Ok(_) => {
                self.done("Saved", format!("{file_name} blacklist field updated."));
                report.blacklist_saved = true;
            }
            Err(err) => {
                self.failure(format!("{file_name} was not updated: {err:#}"));
            }
        }
        Ok(())
    }

    pub fn upgrade_pip(&self) -> Result<PipUpgrade> {
        upgrade_pip(self.pip, self.log)
    }

    pub fn outdated(&self) -> Result<BTreeSet<String>> {
        list_outdated(self.pip, self.log)
    }

    /// Current conflicts, ignoring those of blacklisted packages.
    ///
    /// Packages that were already conflicting in the previous check are
    /// offered as blacklist candidates.
    pub fn check_conflicts(&mut self) -> Result<Vec<Conflict>> {
        ui::status("Checking", "for dependency conflicts...");
        self.log.record("Checking for dependency conflicts...");
        let output = self.pip.check()?;
        self.log.record_output("pip check", &output);

        self.check_error = None;
        if output.success {
            self.conflict_memory.clear();
            self.done("Clean", "No dependency issues detected!");
            return Ok(Vec::new());
        }

        let reported = parse_check(&output.stdout);
        if reported.is_empty() {
            let error = output.first_error_line();
            self.failure(format!("Error checking dependencies: {error}"));
            self.check_error = Some(error);
            return Ok(Vec::new());
        }

        let (ignored, conflicts): (Vec<Conflict>, Vec<Conflict>) = reported
            .into_iter()
            .partition(|conflict| self.config.is_blacklisted(&conflict.package));

        if !ignored.is_empty() {
            ui::status("Ignoring", "conflicts of blacklisted packages:");
            self.log.record("Ignoring blacklisted packages:");
            let names: BTreeSet<&str> = ignored.iter().map(|c| c.package.as_str()).collect();
            for name in names {
                self.item(name);
            }
        }

        if conflicts.is_empty() {
            self.conflict_memory.clear();
            self.done("Clean", "No dependency conflicts detected!");
            return Ok(conflicts);
        }

        self.caution("Dependency conflicts exist:");
        for conflict in &conflicts {
            self.item(&conflict.line);
        }

        let packages: BTreeSet<String> = conflicts
            .iter()
            .map(|conflict| conflict.package.clone())
            .collect();
        self.info(format!(
            "Found {} packages with dependency conflicts.",
            packages.len()
        ));

        let repeated: BTreeSet<String> = packages
            .iter()
            .filter(|package| self.conflict_memory.contains(&normalize_name(package)))
            .cloned()
            .collect();
        self.conflict_memory = packages.iter().map(|package| normalize_name(package)).collect();
        self.propose_blacklist(repeated)?;

        Ok(conflicts)
    }

    /// Offer packages that just got upgraded and now break others as
    /// blacklist candidates.
    fn suggest_breaking_packages(
        &mut self,
        upgraded: &BTreeSet<String>,
        conflicts: &[Conflict],
    ) -> Result<()> {
        ui::status("Checking", "for potential blacklist packages...");
        self.log.record("Checking for potential blacklist packages...");
        let candidates: BTreeSet<String> = upgraded
            .iter()
            .filter(|package| {
                conflicts
                    .iter()
                    .any(|conflict| conflict.involves_requirement(package))
            })
            .cloned()
            .collect();

        if candidates.is_empty() {
            self.done("Clean", "No potential blacklist packages detected.");
            return Ok(());
        }
        self.propose_blacklist(candidates)
    }

    fn propose_blacklist(&mut self, candidates: BTreeSet<String>) -> Result<()> {
        let candidates: Vec<String> = candidates
            .into_iter()
            .filter(|package| !self.config.is_blacklisted(package))
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        self.caution("Potential blacklist packages detected:");
        for package in &candidates {
            self.item(package);
        }

        if self.confirm("Would you like to add these packages to the blacklist?")? {
            let added = self.config.merge_blacklist(&candidates);
            self.blacklist_added.extend(added);
            self.done("Updated", "Blacklist packages updated.");
        }
        Ok(())
    }

    fn installed_version(&self, package: &str) -> Result<Option<String>> {
        let output = self.pip.show(package)?;
        if !output.success {
            return Ok(None);
        }
        Ok(parse_show_version(&output.stdout))
    }

    /// Upgrade each package in order, recording the outcome in `summary`.
    pub fn upgrade_packages(
        &self,
        packages: &BTreeSet<String>,
        summary: &mut UpgradeSummary,
    ) -> Result<()> {
        let total = packages.len();
        for (index, package) in packages.iter().enumerate() {
            let position = format!("({}/{total})", index + 1);

            if self.config.is_blacklisted(package) {
                ui::status("Skipping", format!("{package} {position} (blacklisted)"));
                self.log
                    .record(format!("Skipping {package}: blacklisted {position}"));
                summary.skip(package, SkipReason::Blacklisted);
                continue;
            }

            let current = self.installed_version(package)?;
            let spec = match self.config.pin_for(package) {
                Some(pin) if current.as_deref() == Some(pin) => {
                    ui::status(
                        "Skipping",
                        format!("{package}: already at specified version {pin} {position}"),
                    );
                    self.log.record(format!(
                        "Skipping {package}: Already at specified version {pin} {position}"
                    ));
                    summary.skip(package, SkipReason::PinSatisfied);
                    continue;
                }
                Some(pin) => PackageSpec::pinned(package.clone(), pin),
                None => PackageSpec::latest(package.clone()),
            };

            let current_label = current.as_deref().unwrap_or("not installed");
            let progress = ui::Progress::new(
                "Updating",
                format!("{spec} (current: {current_label}) {position}"),
            );
            self.log
                .record(format!("Updating: {spec} (current: {current_label}) {position}"));

            let output = self.pip.install(&spec)?;
            self.log.record_output(&format!("pip install {spec}"), &output);

            if output.success {
                progress.success("Upgraded", None);
                self.log.record(format!("Successfully installed {spec}"));
                summary.succeeded.push(Installed {
                    name: package.clone(),
                    pinned: spec.version.clone(),
                });
            } else {
                let error = output.first_error_line();
                progress.fail("Failed", &error);
                self.log.record(format!("Failed to upgrade {package}: {error}"));
                summary.failed.push(Failure {
                    name: package.clone(),
                    error,
                });
            }
        }

        self.log.record("Update process completed!");
        Ok(())
    }

    fn print_summary(&self, summary: &UpgradeSummary) {
        ui::line("");
        for line in summary.render(&self.config) {
            ui::line(&line);
            self.log.record(line);
        }
    }
}
