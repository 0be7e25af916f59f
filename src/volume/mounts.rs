// Candidate volume discovery from the mount table
//
// Lines look like `/dev/md1 on /mnt/disk1 type btrfs (rw,noatime)`. Only lines
// matching the configured pattern are candidates; denylisted mounts are dropped.

use super::Volume;
use crate::backend::run_checked;
use crate::config::Config;
use crate::error::Result;
use regex::Regex;
use std::path::PathBuf;
use tokio::process::Command;

/// Extract candidate volumes from `mount` output, preserving first-seen order.
pub fn parse_mount_table(output: &str, pattern: &Regex, denylist: &[PathBuf]) -> Vec<Volume> {
    let mut volumes: Vec<Volume> = Vec::new();

    for line in output.lines() {
        if !pattern.is_match(line) {
            continue;
        }
        let Some(mount_point) = mount_point(line) else {
            continue;
        };
        let mount_point = PathBuf::from(mount_point);
        if volumes.iter().any(|v| v.mount_path == mount_point) {
            continue;
        }
        volumes.push(Volume::new(mount_point));
    }

    without_denylisted(volumes, denylist)
}

/// Drop every volume whose mount path is on the denylist, keeping order.
pub fn without_denylisted(volumes: Vec<Volume>, denylist: &[PathBuf]) -> Vec<Volume> {
    volumes
        .into_iter()
        .filter(|volume| {
            let denied = denylist.contains(&volume.mount_path);
            if denied {
                tracing::debug!("Skipping denylisted mount {}", volume);
            }
            !denied
        })
        .collect()
}

fn mount_point(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once(" on ")?;
    let (point, _) = rest.split_once(" type ")?;
    Some(point)
}

/// Run the configured mount command and return the candidate volumes.
pub async fn discover_volumes(config: &Config) -> Result<Vec<Volume>> {
    let pattern = config.mount_regex()?;
    let output = run_checked(&mut Command::new(&config.mount_command)).await?;

    let volumes = parse_mount_table(&output, &pattern, &config.denylist);
    tracing::debug!("Discovered {} candidate volume(s)", volumes.len());
    Ok(volumes)
}
