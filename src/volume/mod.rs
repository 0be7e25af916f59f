//! Destination volumes.
//!
//! A volume is a mounted filesystem identified by its mount path. Capacity is
//! queried live on every selection since transfers consume it.

pub mod mounts;
pub mod selector;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

pub use mounts::{discover_volumes, parse_mount_table, without_denylisted};
pub use selector::{pick_most_free, DestinationSelector};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Volume {
    pub mount_path: PathBuf,
}

impl Volume {
    pub fn new(mount_path: impl Into<PathBuf>) -> Self {
        Self {
            mount_path: mount_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.mount_path
    }

    /// Where snapshots land on this volume.
    pub fn receiving_path(&self, subpath: &Path) -> PathBuf {
        self.mount_path.join(subpath)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mount_path.display())
    }
}

/// Reports free bytes per volume. Units must be consistent across volumes.
#[async_trait]
pub trait VolumeCapacityOracle: Send + Sync {
    async fn free_bytes(&self, volume: &Volume) -> Result<u64>;
}

/// Bytes available to unprivileged writers, as `df` reports "Available".
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsOracle;

#[async_trait]
impl VolumeCapacityOracle for StatvfsOracle {
    async fn free_bytes(&self, volume: &Volume) -> Result<u64> {
        let path = volume.mount_path.clone();
        let free = tokio::task::spawn_blocking(move || fs2::available_space(&path))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        Ok(free)
    }
}
