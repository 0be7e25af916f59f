// Run configuration
//
// Loaded from TOML (every field optional), then overridden from the command
// line. Validation happens once, before discovery or any transfer starts.

use crate::error::{RelocateError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BTRFS_PATH: &str = "/sbin/btrfs";
pub const DEFAULT_SOURCE_DIR: &str = "/mnt/images/.snapshots";
pub const DEFAULT_TARGET_SUBPATH: &str = ".snapshots";
pub const DEFAULT_DENYLIST_PATTERN: &str = r"^/mnt/disk[0-9]+$";
/// Unraid array disks. Adjust for other layouts.
pub const DEFAULT_MOUNT_PATTERN: &str = r"^/dev/md[0-9]+ on /mnt/disk[0-9]* type btrfs \(rw";
pub const DEFAULT_MOUNT_COMMAND: &str = "/bin/mount";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// btrfs executable used for send, receive and subvolume management
    pub btrfs_path: PathBuf,
    /// Directory holding the snapshots to relocate
    pub source_dir: PathBuf,
    /// Receiving subtree, relative to each destination volume root
    pub target_subpath: PathBuf,
    /// Mount points never chosen as destinations
    pub denylist: Vec<PathBuf>,
    /// Every denylist entry must match this
    pub denylist_pattern: String,
    /// Lines of `mount_command` output that describe candidate volumes
    pub mount_pattern: String,
    pub mount_command: PathBuf,
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            btrfs_path: PathBuf::from(DEFAULT_BTRFS_PATH),
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            target_subpath: PathBuf::from(DEFAULT_TARGET_SUBPATH),
            denylist: Vec::new(),
            denylist_pattern: DEFAULT_DENYLIST_PATTERN.to_string(),
            mount_pattern: DEFAULT_MOUNT_PATTERN.to_string(),
            mount_command: PathBuf::from(DEFAULT_MOUNT_COMMAND),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelocateError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RelocateError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Explicit path, else the per-user config file if it exists, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// `$XDG_CONFIG_HOME/snapshift/config.toml` (or the platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("snapshift").join("config.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn mount_regex(&self) -> Result<Regex> {
        compile("mount_pattern", &self.mount_pattern)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source_dir.is_dir() {
            return Err(RelocateError::Config(format!(
                "source_dir {} is not a directory",
                self.source_dir.display()
            )));
        }

        let denylist_re = compile("denylist_pattern", &self.denylist_pattern)?;
        for entry in &self.denylist {
            if !denylist_re.is_match(&entry.to_string_lossy()) {
                return Err(RelocateError::Config(format!(
                    "invalid denylist entry: {}",
                    entry.display()
                )));
            }
        }

        self.mount_regex()?;
        validate_subpath(&self.target_subpath)?;

        if self.poll_interval_secs == 0 {
            return Err(RelocateError::Config(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RelocateError::Config(format!("{}: {}", field, e)))
}

fn validate_subpath(subpath: &Path) -> Result<()> {
    if subpath.as_os_str().is_empty() {
        return Err(RelocateError::Config(
            "target_subpath must not be empty".to_string(),
        ));
    }
    for component in subpath.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(RelocateError::Config(format!(
                    "target_subpath must be a plain relative path: {}",
                    subpath.display()
                )))
            }
        }
    }
    Ok(())
}
