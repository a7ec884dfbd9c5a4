use anyhow::{Context, Result};
use chrono::Local;
use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::pip::CommandOutput;
use crate::ui;

const PERMISSION_HINT: &str =
    "Logs writing permission denied! Try running as Administrator or changing the file path.";

/// Append-only text log for a single run.
///
/// The file is named after the moment the run started
/// (`YYYY-MM-DD_HH-MM-SS_log.txt`). Write failures are reported once on the
/// terminal and otherwise ignored so a read-only log directory never stops an
/// upgrade.
#[derive(Debug)]
pub struct RunLog {
    path: Option<PathBuf>,
    reported: Cell<bool>,
}

impl RunLog {
    /// Create the log file inside `logs_dir`.
    pub fn create(logs_dir: &Path) -> Result<Self> {
        fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory {:?}", logs_dir))?;

        let file_name = format!("{}_log.txt", Local::now().format("%Y-%m-%d_%H-%M-%S"));
        let path = logs_dir.join(file_name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to create log file {:?}", path))?;

        Ok(Self {
            path: Some(path),
            reported: Cell::new(false),
        })
    }

    /// Like `create`, but falls back to a disabled log after reporting why.
    pub fn open(logs_dir: &Path) -> Self {
        match Self::create(logs_dir) {
            Ok(log) => log,
            Err(err) => {
                let denied = err
                    .chain()
                    .filter_map(|cause| cause.downcast_ref::<io::Error>())
                    .any(|io_err| io_err.kind() == io::ErrorKind::PermissionDenied);
                if denied {
                    ui::error(PERMISSION_HINT);
                } else {
                    ui::warn(format!("Logs writing error: {err:#}"));
                }
                Self::disabled()
            }
        }
    }

    /// A log that discards everything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            reported: Cell::new(true),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one stamped message.
    pub fn record(&self, message: impl AsRef<str>) {
        let stamp = Local::now().format("%H:%M:%S");
        self.append(&format!("[{stamp}] {}\n", message.as_ref()));
    }

    /// Append the captured output of an external command.
    pub fn record_output(&self, label: &str, output: &CommandOutput) {
        let mut text = String::new();
        if !output.stdout.trim().is_empty() {
            text.push_str(&format!("{label} output:\n{}", output.stdout));
            if !output.stdout.ends_with('\n') {
                text.push('\n');
            }
        }
        if !output.stderr.trim().is_empty() {
            text.push_str(&format!("{label} errors:\n{}", output.stderr));
            if !output.stderr.ends_with('\n') {
                text.push('\n');
            }
        }
        if !text.is_empty() {
            self.append(&text);
        }
    }

    fn append(&self, text: &str) {
        let Some(path) = &self.path else {
            return;
        };

        let result = OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(text.as_bytes()));

        if let Err(err) = result {
            if self.reported.replace(true) {
                return;
            }
            if err.kind() == io::ErrorKind::PermissionDenied {
                ui::error(PERMISSION_HINT);
            } else {
                ui::warn(format!("Logs writing error: {err}"));
            }
        }
    }
}
