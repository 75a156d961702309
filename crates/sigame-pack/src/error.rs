//! Error types for the pack layer.

/// Errors that can occur while storing, loading, or validating a pack.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// An archive with this content hash is already stored.
    #[error("pack already exists")]
    AlreadyExists,

    /// No stored archive matches the requested uid.
    #[error("pack {0} not found")]
    NotFound(String),

    /// The uid string is not 64 hex characters.
    #[error("malformed pack uid")]
    BadUid,

    /// Filesystem access failed.
    #[error("pack io error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive could not be opened or extracted.
    #[error("pack archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The `pack.json` descriptor is missing or does not parse.
    #[error("pack descriptor error: {0}")]
    Descriptor(#[from] serde_json::Error),

    /// The descriptor parsed but violates a structural invariant
    /// (no rounds, an empty theme, a negative price).
    #[error("invalid pack: {0}")]
    Invalid(String),
}
