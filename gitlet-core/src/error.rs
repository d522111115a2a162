//! Error types shared by every gitlet component
//!
//! Messages of the user-facing variants are matched literally by scripts and
//! tests, so their text is fixed.

use std::path::PathBuf;

use crate::object::ObjectId;

/// Result type for gitlet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or synchronizing repositories
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("fatal: Not a gitlet repository (or any of the parent directories): .gitlet")]
    RepositoryNotFound,

    #[error("fatal: '{0}' does not appear to be a git repository")]
    RemoteNotFound(String),

    #[error("unsupported")]
    Unsupported,

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Object integrity check failed: expected {expected}, got {actual}")]
    ObjectIntegrity { expected: ObjectId, actual: ObjectId },

    #[error("Ref not found: {0}")]
    RefNotFound(String),

    #[error("Invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("Ref update rejected for {name}: expected {expected}, found {actual}")]
    RefUpdateRejected {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("cannot lock ref '{name}': '{existing}' exists")]
    RefConflict { name: String, existing: String },

    #[error("fatal: remote {0} already exists.")]
    RemoteAlreadyExists(String),

    #[error("Repository already initialized at {0:?}")]
    AlreadyInitialized(PathBuf),

    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Whether this error carries a `fatal:` message that callers print verbatim
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::RepositoryNotFound | Error::RemoteNotFound(_) | Error::RemoteAlreadyExists(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
