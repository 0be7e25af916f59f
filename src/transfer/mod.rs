//! Snapshot transfer: send/receive pipeline, polling and progress.

pub mod engine;
pub mod progress;
pub mod session;

pub use engine::{SnapshotTransferEngine, TransferOutcome};
pub use progress::{
    format_elapsed, sample, ProgressBarSink, ProgressSample, ProgressSink, TracingSink,
};
pub use session::TransferSession;
