/// Errors from ACL parsing and conversion.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AclError {
    /// An access level name that is not one of the known levels.
    #[error("unknown access level: {0}")]
    UnknownLevel(String),

    /// An ACE type other than ALLOW or DENY.
    #[error("unknown ace type: {0}")]
    UnknownAceType(String),

    /// A CDMI ACL document that is not a list of ACE objects.
    #[error("malformed cdmi acl: {0}")]
    Malformed(String),
}

/// Result alias for ACL operations.
pub type AclResult<T> = Result<T, AclError>;
