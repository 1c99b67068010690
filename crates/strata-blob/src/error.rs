use strata_types::EntityId;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The requested blob does not exist.
    #[error("blob not found: {0}")]
    NotFound(EntityId),

    /// A blob references a part that is no longer stored.
    #[error("blob {blob} references missing part {part}")]
    MissingPart { blob: EntityId, part: EntityId },

    /// Stored content does not hash to the recorded checksum.
    #[error("hash mismatch for {id}: expected {expected}, computed {computed}")]
    HashMismatch {
        id: EntityId,
        expected: String,
        computed: String,
    },

    /// I/O error while reading the source stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A compressed part could not be decoded.
    #[error("archive error: {0}")]
    Archive(String),

    /// The storage backend failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<zip::result::ZipError> for BlobError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Archive(e.to_string())
    }
}

/// Result alias for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;
