// Error taxonomy for snapshot relocation
//
// Configuration problems abort the whole run before any transfer starts.
// Everything else is scoped to the snapshot being relocated.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelocateError>;

/// Which side of the send/receive pipeline a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Serialize,
    Deserialize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Serialize => "serialize",
            Stage::Deserialize => "deserialize",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No candidate volumes to relocate snapshots to")]
    NoCandidateVolumes,

    #[error("Failed to launch {stage} process `{program}`: {source}")]
    TransferLaunchFailed {
        stage: Stage,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error(
        "Transfer failed (serialize exit {serialize_exit}, deserialize exit {deserialize_exit})"
    )]
    TransferFailed {
        serialize_exit: i32,
        deserialize_exit: i32,
    },

    #[error("Failed to delete transferred snapshot {}: {reason}", path.display())]
    RetirementFailed { path: PathBuf, reason: String },

    #[error("`{program}` failed: {detail}")]
    Command { program: String, detail: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RelocateError {
    /// True when the error invalidates the whole run rather than one snapshot.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            RelocateError::Config(_) | RelocateError::NoCandidateVolumes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborts_run() {
        assert!(RelocateError::Config("bad".to_string()).aborts_run());
        assert!(RelocateError::NoCandidateVolumes.aborts_run());
        assert!(!RelocateError::TransferFailed {
            serialize_exit: 0,
            deserialize_exit: 1
        }
        .aborts_run());
        assert!(!RelocateError::Io(io::Error::new(io::ErrorKind::Other, "x")).aborts_run());
    }

    #[test]
    fn test_launch_failed_message() {
        let err = RelocateError::TransferLaunchFailed {
            stage: Stage::Deserialize,
            program: "/sbin/btrfs".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        let msg = err.to_string();
        assert!(msg.contains("deserialize"));
        assert!(msg.contains("/sbin/btrfs"));
    }

    #[test]
    fn test_transfer_failed_message() {
        let err = RelocateError::TransferFailed {
            serialize_exit: 0,
            deserialize_exit: 1,
        };
        assert_eq!(
            err.to_string(),
            "Transfer failed (serialize exit 0, deserialize exit 1)"
        );
    }
}
