// btrfs send/receive backend
//
// send:    btrfs send <snapshot>              (stream on stdout)
// receive: btrfs receive <dir>                (stream on stdin)
// subtree: btrfs subvolume list|create <path>
// retire:  btrfs subvolume delete <snapshot>

use super::{run_checked, SnapshotBackend};
use crate::error::Result;
use crate::volume::Volume;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;

/// One line of `btrfs subvolume list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubvolumeEntry {
    pub id: u64,
    pub generation: u64,
    pub top_level: u64,
    pub path: String,
}

fn subvolume_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ID (\d+) gen (\d+) top level (\d+) path (.+)$").expect("valid regex")
    })
}

pub fn parse_subvolume_list(output: &str) -> Vec<SubvolumeEntry> {
    output
        .lines()
        .filter_map(|line| {
            let caps = subvolume_line().captures(line.trim_end())?;
            Some(SubvolumeEntry {
                id: caps[1].parse().ok()?,
                generation: caps[2].parse().ok()?,
                top_level: caps[3].parse().ok()?,
                path: caps[4].to_string(),
            })
        })
        .collect()
}

/// Whether `subpath` is listed exactly, and how many subvolumes live below it.
pub fn find_subtree(entries: &[SubvolumeEntry], subpath: &str) -> (bool, usize) {
    let prefix = format!("{}/", subpath);
    let exists = entries.iter().any(|e| e.path == subpath);
    let children = entries.iter().filter(|e| e.path.starts_with(&prefix)).count();
    (exists, children)
}

#[derive(Debug, Clone)]
pub struct BtrfsBackend {
    btrfs: PathBuf,
}

impl BtrfsBackend {
    pub fn new(btrfs: impl Into<PathBuf>) -> Self {
        Self {
            btrfs: btrfs.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.btrfs)
    }
}

#[async_trait]
impl SnapshotBackend for BtrfsBackend {
    fn serializer(&self, source: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("send").arg(source);
        cmd
    }

    fn deserializer(&self, destination: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("receive").arg(destination);
        cmd
    }

    async fn ensure_receiving_subtree(&self, volume: &Volume, subpath: &Path) -> Result<PathBuf> {
        let dst_path = volume.receiving_path(subpath);

        let mut list = self.command();
        list.arg("subvolume").arg("list").arg(volume.path());
        let listing = run_checked(&mut list).await?;

        let entries = parse_subvolume_list(&listing);
        let (exists, children) = find_subtree(&entries, &subpath.to_string_lossy());

        if exists {
            tracing::info!(
                "Valid snapshot path on {}: {}. {} snapshot(s) on this disk.",
                volume,
                dst_path.display(),
                children
            );
        } else {
            tracing::info!(
                "No snapshot path found on {}. Creating {}.",
                volume,
                dst_path.display()
            );
            let mut create = self.command();
            create.arg("subvolume").arg("create").arg(&dst_path);
            run_checked(&mut create).await?;
        }

        Ok(dst_path)
    }

    async fn delete_snapshot(&self, path: &Path) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("subvolume").arg("delete").arg(path);
        run_checked(&mut cmd).await?;
        Ok(())
    }
}
