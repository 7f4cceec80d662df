use enrich_checkpoint::CheckpointError;
use enrich_client::ClientError;
use enrich_core::EnrichError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no identifier column found (looked for {candidates:?})")]
    MissingIdentifierColumn { candidates: Vec<String> },

    #[error("enrichment aborted: {0}")]
    Fatal(ClientError),

    #[error("invalid input: {0}")]
    Core(#[from] EnrichError),

    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<ClientError> for PipelineError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Cancelled => Self::Cancelled,
            other => Self::Fatal(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
