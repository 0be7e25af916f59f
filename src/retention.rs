//! Source retirement after a verified transfer.

use crate::backend::SnapshotBackend;
use crate::error::{RelocateError, Result};
use crate::snapshot::Snapshot;
use crate::transfer::TransferOutcome;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RetirementResult {
    /// Source snapshot deleted
    Retired,
    /// Source snapshot kept
    Retained { reason: String },
}

pub struct RetentionManager {
    backend: Arc<dyn SnapshotBackend>,
}

impl RetentionManager {
    pub fn new(backend: Arc<dyn SnapshotBackend>) -> Self {
        Self { backend }
    }

    /// Delete the source only if both pipeline stages exited with 0.
    pub async fn maybe_retire(
        &self,
        snapshot: &Snapshot,
        outcome: &TransferOutcome,
    ) -> Result<RetirementResult> {
        if !outcome.is_success() {
            let reason = format!(
                "transfer incomplete (serialize exit {}, deserialize exit {})",
                outcome.serialize_exit, outcome.deserialize_exit
            );
            tracing::warn!("Keeping snapshot {}: {}", snapshot.path.display(), reason);
            return Ok(RetirementResult::Retained { reason });
        }

        tracing::info!("Removing snapshot {}.", snapshot.path.display());
        self.backend
            .delete_snapshot(&snapshot.path)
            .await
            .map_err(|e| RelocateError::RetirementFailed {
                path: snapshot.path.clone(),
                reason: e.to_string(),
            })?;

        Ok(RetirementResult::Retired)
    }
}
