//! Error taxonomy of the management API.

use serde::Serialize;
use thiserror::Error;

use crate::error::Error as EngineError;

/// The closed set of failure kinds callers can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RepositoryNotFound,
    RepositoryAlreadyExists,
    BranchNotFound,
    BranchAlreadyExists,
    TagNotFound,
    TagAlreadyExists,
    FileNotFound,
    InvalidOperation,
    MergeConflict,
    SshError,
    CloneFailed,
    InternalError,
}

/// A failed management operation.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("repository already exists: {0}")]
    RepositoryAlreadyExists(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("tag already exists: {0}")]
    TagAlreadyExists(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("merge conflict: {0}")]
    MergeConflict(String),

    #[error("ssh error: {message}")]
    SshError {
        message: String,
        #[source]
        source: Option<EngineError>,
    },

    #[error("clone failed: {message}")]
    CloneFailed {
        message: String,
        #[source]
        source: Option<EngineError>,
    },

    #[error("{context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: EngineError,
    },
}

impl ManagerError {
    /// The kind callers branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManagerError::RepositoryNotFound(_) => ErrorKind::RepositoryNotFound,
            ManagerError::RepositoryAlreadyExists(_) => ErrorKind::RepositoryAlreadyExists,
            ManagerError::BranchNotFound(_) => ErrorKind::BranchNotFound,
            ManagerError::BranchAlreadyExists(_) => ErrorKind::BranchAlreadyExists,
            ManagerError::TagNotFound(_) => ErrorKind::TagNotFound,
            ManagerError::TagAlreadyExists(_) => ErrorKind::TagAlreadyExists,
            ManagerError::FileNotFound(_) => ErrorKind::FileNotFound,
            ManagerError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            ManagerError::MergeConflict(_) => ErrorKind::MergeConflict,
            ManagerError::SshError { .. } => ErrorKind::SshError,
            ManagerError::CloneFailed { .. } => ErrorKind::CloneFailed,
            ManagerError::Internal { .. } => ErrorKind::InternalError,
        }
    }

    /// Wraps an engine failure that has no more specific kind.
    pub fn internal(context: impl Into<String>, source: EngineError) -> Self {
        ManagerError::Internal {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn clone_failed(message: impl Into<String>, source: Option<EngineError>) -> Self {
        ManagerError::CloneFailed {
            message: message.into(),
            source,
        }
    }

    pub(crate) fn ssh(message: impl Into<String>, source: Option<EngineError>) -> Self {
        ManagerError::SshError {
            message: message.into(),
            source,
        }
    }
}

/// Result alias for management operations.
pub type ManagerResult<T> = std::result::Result<T, ManagerError>;

/// Attaches operation context to engine results.
pub(crate) trait Context<T> {
    /// Maps any engine error to `INTERNAL_ERROR` with `context`.
    fn context(self, context: &str) -> ManagerResult<T>;
}

impl<T> Context<T> for std::result::Result<T, EngineError> {
    fn context(self, context: &str) -> ManagerResult<T> {
        self.map_err(|e| ManagerError::internal(context, e))
    }
}
