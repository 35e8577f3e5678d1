/// Errors raised while validating entry metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// The path does not follow the `/a/b/` directory convention.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The leaf name is empty or contains forbidden characters.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}

/// Result alias for metadata validation.
pub type TypeResult<T> = Result<T, TypeError>;
