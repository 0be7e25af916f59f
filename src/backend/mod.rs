//! Snapshot backends.
//!
//! A backend knows how to serialize a snapshot to a byte stream, materialize
//! one from a byte stream, prepare the receiving subtree on a volume, and
//! delete a source snapshot. The transfer engine only wires the two stream
//! commands together and watches them.

pub mod btrfs;

use crate::error::{RelocateError, Result};
use crate::volume::Volume;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub use btrfs::BtrfsBackend;

#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Command writing the snapshot at `source` to stdout.
    fn serializer(&self, source: &Path) -> Command;

    /// Command reading a stream from stdin and materializing it under `destination`.
    fn deserializer(&self, destination: &Path) -> Command;

    /// Make sure `subpath` exists on `volume` and return its full path.
    /// Reuses an existing subtree.
    async fn ensure_receiving_subtree(&self, volume: &Volume, subpath: &Path) -> Result<PathBuf>;

    async fn delete_snapshot(&self, path: &Path) -> Result<()>;
}

/// Human-readable program name for log and error messages.
pub fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

/// Run a short-lived command to completion and return its stdout.
pub(crate) async fn run_checked(cmd: &mut Command) -> Result<String> {
    let program = program_name(cmd);
    let output = cmd.output().await.map_err(|e| RelocateError::Command {
        program: program.clone(),
        detail: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(RelocateError::Command {
            program,
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
