use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::pip::normalize_name;

/// Blacklist and pinned versions read from `package_config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Packages never handed to the upgrade step
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Packages installed at exactly this version instead of the latest
    #[serde(default)]
    pub specific_versions: BTreeMap<String, String>,
}

/// Result of reading the configuration file.
#[derive(Debug)]
pub enum ConfigLoad {
    /// File existed and parsed
    Loaded(PackageConfig),
    /// File was missing; a default one was written
    Created(PackageConfig),
    /// File existed but could not be read or parsed; defaults are used and the
    /// file is left untouched
    Invalid { error: String },
}

impl ConfigLoad {
    pub fn into_config(self) -> PackageConfig {
        match self {
            ConfigLoad::Loaded(config) | ConfigLoad::Created(config) => config,
            ConfigLoad::Invalid { .. } => PackageConfig::default(),
        }
    }
}

impl PackageConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Load the configuration, writing a default file when none exists.
    ///
    /// Only a failure to write the default file is an error.
    pub fn load_or_create(path: &Path) -> Result<ConfigLoad> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(ConfigLoad::Created(config));
        }

        match Self::load(path) {
            Ok(config) => Ok(ConfigLoad::Loaded(config)),
            Err(err) => Ok(ConfigLoad::Invalid {
                error: format!("{err:#}"),
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_pretty(path, self)
    }

    /// Append packages to the `blacklist` array of the file on disk.
    ///
    /// Only that array changes: other keys, their order and the pins are
    /// written back as they were read. A file that does not parse is an
    /// error and is never overwritten. Returns the names that were added.
    pub fn append_blacklist(path: &Path, packages: &[String]) -> Result<Vec<String>> {
        let mut document = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            serde_json::from_str::<Value>(&contents)
                .with_context(|| format!("Failed to parse config file {:?}", path))?
        } else {
            serde_json::to_value(Self::default())
                .context("Failed to serialize package configuration")?
        };

        let root = document
            .as_object_mut()
            .ok_or_else(|| anyhow!("Config file {:?} is not a JSON object", path))?;
        let blacklist = root
            .entry("blacklist")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| anyhow!("\"blacklist\" in {:?} is not a list", path))?;

        let mut added = Vec::new();
        for package in packages {
            let wanted = normalize_name(package);
            let present = blacklist
                .iter()
                .filter_map(Value::as_str)
                .any(|entry| normalize_name(entry) == wanted);
            if !present {
                blacklist.push(Value::String(package.clone()));
                added.push(package.clone());
            }
        }

        write_pretty(path, &document)?;
        Ok(added)
    }

    pub fn is_blacklisted(&self, package: &str) -> bool {
        let wanted = normalize_name(package);
        self.blacklist
            .iter()
            .any(|entry| normalize_name(entry) == wanted)
    }

    /// Pinned version for a package, matching names the way pip does.
    pub fn pin_for(&self, package: &str) -> Option<&str> {
        if let Some(version) = self.specific_versions.get(package) {
            return Some(version.as_str());
        }

        let wanted = normalize_name(package);
        self.specific_versions
            .iter()
            .find(|(name, _)| normalize_name(name) == wanted)
            .map(|(_, version)| version.as_str())
    }

    /// Append packages that are not already blacklisted, keeping existing order.
    ///
    /// Returns the names that were added.
    pub fn merge_blacklist<'a, I>(&mut self, packages: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut added = Vec::new();
        for package in packages {
            if !self.is_blacklisted(package) {
                self.blacklist.push(package.clone());
                added.push(package.clone());
            }
        }
        added
    }
}

/// JSON with 4-space indentation and a trailing newline.
fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
    }

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .context("Failed to serialize package configuration")?;
    buffer.push(b'\n');

    fs::write(path, buffer).with_context(|| format!("Failed to write config file {:?}", path))
}
