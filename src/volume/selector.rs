//! Destination selection: the candidate with the most free bytes wins.

use super::{Volume, VolumeCapacityOracle};
use crate::error::{RelocateError, Result};
use std::sync::Arc;

/// Index of the largest capacity; ties keep the earliest entry.
pub fn pick_most_free(capacities: &[u64]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (i, &free) in capacities.iter().enumerate() {
        match best {
            Some((_, best_free)) if free <= best_free => {}
            _ => best = Some((i, free)),
        }
    }
    best.map(|(i, _)| i)
}

pub struct DestinationSelector {
    oracle: Arc<dyn VolumeCapacityOracle>,
}

impl DestinationSelector {
    pub fn new(oracle: Arc<dyn VolumeCapacityOracle>) -> Self {
        Self { oracle }
    }

    /// Query every candidate and return the one with the most free space.
    pub async fn select(&self, volumes: &[Volume]) -> Result<Volume> {
        if volumes.is_empty() {
            return Err(RelocateError::NoCandidateVolumes);
        }

        let mut capacities = Vec::with_capacity(volumes.len());
        for volume in volumes {
            let free = self.oracle.free_bytes(volume).await?;
            tracing::debug!(volume = %volume, free_bytes = free, "Volume capacity");
            capacities.push(free);
        }

        let index = pick_most_free(&capacities).ok_or(RelocateError::NoCandidateVolumes)?;
        Ok(volumes[index].clone())
    }
}
