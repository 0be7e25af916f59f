//! Source snapshot inventory.

use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A snapshot directory under the source root. Created elsewhere; removed
/// only after a verified transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub name: String,
    pub path: PathBuf,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Every entry under `source_dir`, sorted by name.
pub fn list_snapshots(source_dir: &Path) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    for entry in std::fs::read_dir(source_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        snapshots.push(Snapshot::new(name, entry.path()));
    }
    snapshots.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(snapshots)
}
