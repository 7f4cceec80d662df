//! Error types for checkpoint storage.

use thiserror::Error;

/// Errors that can occur while reading or writing checkpoints.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Filesystem failure on a checkpoint artifact or directory
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be encoded or decoded
    #[error("failed to (de)serialize checkpoint {path}: {source}")]
    Serialization {
        /// Path of the artifact
        path: String,
        /// JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Artifact was written by a newer format than this build understands
    #[error("checkpoint {path} has format version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        /// Path of the artifact
        path: String,
        /// Version found in the artifact
        found: u64,
        /// Newest version this build can read
        supported: u32,
    },

    /// Artifact is valid JSON but not a checkpoint envelope
    #[error("malformed checkpoint {path}: {reason}")]
    Malformed {
        /// Path of the artifact
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// Step key that cannot be used in an artifact name
    #[error("invalid checkpoint step '{step}': {reason}")]
    InvalidStep {
        /// Offending step text
        step: String,
        /// Why it was rejected
        reason: String,
    },
}

impl CheckpointError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;
