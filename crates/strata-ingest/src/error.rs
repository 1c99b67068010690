use std::path::PathBuf;

use strata_blob::BlobError;
use strata_tree::ModelError;

/// Errors from an ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid ingest options: {0}")]
    InvalidOptions(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("could not start worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ingest worker panicked")]
    WorkerPanicked,
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;
