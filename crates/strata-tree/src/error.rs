use strata_acl::AclError;
use strata_blob::BlobError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from path store operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no such collection: {0}")]
    NoSuchCollection(String),

    #[error("no such resource: {0}")]
    NoSuchResource(String),

    /// A collection already occupies the path.
    #[error("collection already exists: {0}")]
    CollectionConflict(String),

    /// A resource already occupies the path.
    #[error("resource already exists: {0}")]
    ResourceConflict(String),

    #[error("group already exists: {0}")]
    GroupConflict(String),

    #[error("user already exists: {0}")]
    UserConflict(String),

    #[error("node already exists: {0}")]
    NodeConflict(String),

    #[error("{user} has no read access to {path}")]
    NoReadAccess { user: String, path: String },

    #[error("{user} has no write access to {path}")]
    NoWriteAccess { user: String, path: String },

    /// A url whose scheme has no registered driver.
    #[error("no driver for url: {0}")]
    NoSuchDriver(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The root collection cannot be deleted.
    #[error("operation not permitted on the root collection")]
    RootCollection,

    /// A search or notification side effect could not be delivered.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// An unexpected backend failure, kept for diagnostics.
    #[error("undiagnosed error while {context}: {source}")]
    Undiagnosed {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Acl(#[from] AclError),
}

impl ModelError {
    /// Wrap an unexpected error with a description of what was being done.
    pub fn undiagnosed(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Undiagnosed {
            context: context.into(),
            source: source.into(),
        }
    }

    /// `true` for the uniqueness violations.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::CollectionConflict(_)
                | Self::ResourceConflict(_)
                | Self::GroupConflict(_)
                | Self::UserConflict(_)
                | Self::NodeConflict(_)
        )
    }
}

/// Result alias for path store operations.
pub type ModelResult<T> = Result<T, ModelError>;
