//! Snapshot transfer engine.
//!
//! Drives one send/receive pipeline per call and watches it by polling: every
//! tick both processes get a non-blocking status check, and while either is
//! still running the destination size is re-measured and a progress sample is
//! emitted. No sample is emitted once both processes are terminal.

use super::progress::{self, ProgressSink};
use super::session::TransferSession;
use crate::backend::SnapshotBackend;
use crate::error::{RelocateError, Result};
use crate::size::SnapshotSizeProbe;
use crate::snapshot::Snapshot;
use crate::volume::Volume;
use indicatif::HumanBytes;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Exit codes of both pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub serialize_exit: i32,
    pub deserialize_exit: i32,
}

impl TransferOutcome {
    pub fn new(serialize_exit: i32, deserialize_exit: i32) -> Self {
        Self {
            serialize_exit,
            deserialize_exit,
        }
    }

    /// Both stages exited with exactly 0.
    pub fn is_success(&self) -> bool {
        self.serialize_exit == 0 && self.deserialize_exit == 0
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RelocateError::TransferFailed {
                serialize_exit: self.serialize_exit,
                deserialize_exit: self.deserialize_exit,
            })
        }
    }
}

pub struct SnapshotTransferEngine {
    backend: Arc<dyn SnapshotBackend>,
    probe: Arc<dyn SnapshotSizeProbe>,
    sink: Arc<dyn ProgressSink>,
    target_subpath: PathBuf,
    poll_interval: Duration,
}

impl SnapshotTransferEngine {
    pub fn new(
        backend: Arc<dyn SnapshotBackend>,
        probe: Arc<dyn SnapshotSizeProbe>,
        sink: Arc<dyn ProgressSink>,
        target_subpath: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backend,
            probe,
            sink,
            target_subpath: target_subpath.into(),
            poll_interval,
        }
    }

    /// Move `snapshot` into the receiving subtree of `destination`.
    ///
    /// Returns once both processes have exited. A non-zero exit is reported in
    /// the outcome, not as an error; nothing is cleaned up here.
    pub async fn transfer(
        &self,
        snapshot: &Snapshot,
        destination: &Volume,
    ) -> Result<TransferOutcome> {
        let dst_path = self
            .backend
            .ensure_receiving_subtree(destination, &self.target_subpath)
            .await?;

        let expected = self.measure(&snapshot.path).await?;
        // Destination may already hold earlier snapshots
        let baseline = self.measure(&dst_path).await?;

        tracing::info!(
            "Moving snapshot {} -> {}.",
            snapshot.path.display(),
            destination
        );

        let mut session = TransferSession::launch(
            self.backend.as_ref(),
            &snapshot.path,
            &dst_path,
            baseline,
            expected,
        )
        .await?;

        let (serialize_exit, deserialize_exit) = loop {
            if let Some(codes) = session.poll()? {
                break codes;
            }

            let done = self.measure(&session.destination).await?;
            let sample = progress::sample(
                done,
                session.baseline_bytes,
                session.expected_bytes,
                session.elapsed(),
            );
            self.sink.on_sample(&snapshot.name, &sample);

            tokio::time::sleep(self.poll_interval).await;
        };
        self.sink.on_finish(&snapshot.name);

        let outcome = TransferOutcome::new(serialize_exit, deserialize_exit);
        let (send_err, recv_err) = session.diagnostics().await;

        if outcome.is_success() {
            match self.measure(&session.destination).await {
                Ok(done) => log_summary(&snapshot.name, &session, done),
                Err(e) => tracing::warn!(
                    snapshot = %snapshot.name,
                    "Transfer succeeded but the final size of {} could not be measured: {}",
                    session.destination.display(),
                    e
                ),
            }
        } else {
            tracing::warn!(
                snapshot = %snapshot.name,
                serialize_exit,
                deserialize_exit,
                "Transfer of {} failed",
                snapshot.path.display()
            );
            if serialize_exit != 0 && !send_err.is_empty() {
                tracing::warn!("serialize stderr: {}", send_err);
            }
            if deserialize_exit != 0 && !recv_err.is_empty() {
                tracing::warn!("deserialize stderr: {}", recv_err);
            }
        }

        Ok(outcome)
    }

    async fn measure(&self, path: &Path) -> Result<u64> {
        let probe = Arc::clone(&self.probe);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || probe.size_of(&path))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }
}

fn log_summary(snapshot: &str, session: &TransferSession, done: u64) {
    let elapsed = session.elapsed();
    let summary = progress::sample(
        done,
        session.baseline_bytes,
        session.expected_bytes,
        elapsed,
    );
    tracing::info!(
        snapshot,
        started_at = %session.started_at.format("%Y-%m-%d %H:%M:%S"),
        "Transferred {} of {} in {} ({}/s).",
        HumanBytes(summary.bytes_transferred),
        HumanBytes(session.expected_bytes),
        progress::format_elapsed(elapsed),
        HumanBytes(summary.throughput_bytes_per_sec as u64)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_success_only_when_both_zero() {
        assert!(TransferOutcome::new(0, 0).is_success());
        assert!(!TransferOutcome::new(0, 1).is_success());
        assert!(!TransferOutcome::new(1, 0).is_success());
        assert!(!TransferOutcome::new(1, 1).is_success());
        assert!(!TransferOutcome::new(-1, 0).is_success());
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(TransferOutcome::new(0, 0).into_result().is_ok());
        match TransferOutcome::new(0, 141).into_result().unwrap_err() {
            RelocateError::TransferFailed {
                serialize_exit,
                deserialize_exit,
            } => {
                assert_eq!(serialize_exit, 0);
                assert_eq!(deserialize_exit, 141);
            }
            other => panic!("Expected TransferFailed, got {:?}", other),
        }
    }
}
