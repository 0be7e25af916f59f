//! Per-snapshot relocation driver.
//!
//! For each snapshot, in order: pick the emptiest volume, transfer, then let
//! the retention manager decide about the source. Snapshots are processed
//! one at a time; a failure only ends the run when it is a configuration
//! problem.

use crate::error::{RelocateError, Result};
use crate::retention::{RetentionManager, RetirementResult};
use crate::snapshot::Snapshot;
use crate::transfer::{SnapshotTransferEngine, TransferOutcome};
use crate::volume::{DestinationSelector, Volume};
use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Transferred and source deleted
    Relocated { outcome: TransferOutcome },
    /// Dry run: destination chosen, nothing moved
    Planned,
    /// Source kept
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotReport {
    pub snapshot: Snapshot,
    pub destination: Option<Volume>,
    #[serde(flatten)]
    pub status: SnapshotStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub dry_run: bool,
    pub snapshots: Vec<SnapshotReport>,
}

impl RunReport {
    pub fn relocated(&self) -> usize {
        self.count(|s| matches!(s, SnapshotStatus::Relocated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, SnapshotStatus::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&SnapshotStatus) -> bool) -> usize {
        self.snapshots.iter().filter(|r| pred(&r.status)).count()
    }
}

pub struct Relocator {
    selector: DestinationSelector,
    engine: SnapshotTransferEngine,
    retention: RetentionManager,
    dry_run: bool,
}

impl Relocator {
    pub fn new(
        selector: DestinationSelector,
        engine: SnapshotTransferEngine,
        retention: RetentionManager,
    ) -> Self {
        Self {
            selector,
            engine,
            retention,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self, snapshots: &[Snapshot], volumes: &[Volume]) -> Result<RunReport> {
        if volumes.is_empty() {
            return Err(RelocateError::NoCandidateVolumes);
        }

        let started_at = Local::now();
        let mut reports = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            let mut destination = None;
            let status = match self.relocate_one(snapshot, volumes, &mut destination).await {
                Ok(status) => status,
                Err(e) if e.aborts_run() => return Err(e),
                Err(e) => {
                    tracing::error!(snapshot = %snapshot.name, "{}", e);
                    SnapshotStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            reports.push(SnapshotReport {
                snapshot: snapshot.clone(),
                destination,
                status,
            });
        }

        Ok(RunReport {
            started_at,
            finished_at: Local::now(),
            dry_run: self.dry_run,
            snapshots: reports,
        })
    }

    async fn relocate_one(
        &self,
        snapshot: &Snapshot,
        volumes: &[Volume],
        destination: &mut Option<Volume>,
    ) -> Result<SnapshotStatus> {
        let target = self.selector.select(volumes).await?;
        *destination = Some(target.clone());

        if self.dry_run {
            tracing::info!(
                "Would move snapshot {} -> {}.",
                snapshot.path.display(),
                target
            );
            return Ok(SnapshotStatus::Planned);
        }

        let outcome = self.engine.transfer(snapshot, &target).await?;

        if let RetirementResult::Retained { reason } =
            self.retention.maybe_retire(snapshot, &outcome).await?
        {
            tracing::debug!(snapshot = %snapshot.name, "Retained: {}", reason);
        }

        let outcome = outcome.into_result()?;
        Ok(SnapshotStatus::Relocated { outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: SnapshotStatus) -> SnapshotReport {
        SnapshotReport {
            snapshot: Snapshot::new("s", "/src/s"),
            destination: Some(Volume::new("/mnt/disk1")),
            status,
        }
    }

    #[test]
    fn test_run_report_counts() {
        let run = RunReport {
            started_at: Local::now(),
            finished_at: Local::now(),
            dry_run: false,
            snapshots: vec![
                report(SnapshotStatus::Relocated {
                    outcome: TransferOutcome::new(0, 0),
                }),
                report(SnapshotStatus::Failed {
                    error: "boom".to_string(),
                }),
                report(SnapshotStatus::Relocated {
                    outcome: TransferOutcome::new(0, 0),
                }),
            ],
        };
        assert_eq!(run.relocated(), 2);
        assert_eq!(run.failed(), 1);
        assert!(!run.is_clean());
    }

    #[test]
    fn test_report_serializes_flat_status() {
        let json = serde_json::to_value(report(SnapshotStatus::Failed {
            error: "Transfer failed (serialize exit 0, deserialize exit 1)".to_string(),
        }))
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["snapshot"]["name"], "s");
        assert_eq!(json["destination"]["mount_path"], "/mnt/disk1");
        assert!(json["error"].as_str().unwrap().contains("deserialize exit 1"));
    }
}
