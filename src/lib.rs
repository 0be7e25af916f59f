//! snapshift - move btrfs snapshots to the volume with the most free space.
//!
//! ```text
//! source snapshots ──> DestinationSelector ──> SnapshotTransferEngine ──> RetentionManager
//!                       (max free bytes)       (send | receive, polled)   (delete on 0/0)
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod relocate;
pub mod retention;
pub mod size;
pub mod snapshot;
pub mod transfer;
pub mod volume;

pub use error::{RelocateError, Result};
