//! Error types for the object-store engine.
//!
//! These are the structured failures raised by the Git primitives
//! (objects, refs, worktree, merge, transport). The repository manager maps
//! them onto its own closed taxonomy in [`crate::manager::ManagerError`].

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The specified path is not a valid Git repository.
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// A repository already exists at the specified path.
    #[error("repository already exists: {}", .0.display())]
    AlreadyARepository(PathBuf),

    /// The requested object was not found.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The requested reference was not found.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// The reference already exists.
    #[error("reference already exists: {0}")]
    RefAlreadyExists(String),

    /// Another writer holds the lock file for this reference.
    #[error("reference is locked: {0}")]
    RefLocked(String),

    /// The reference no longer holds the value the update expected.
    #[error("reference changed concurrently: {0}")]
    RefChanged(String),

    /// The specified path was not found.
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// The provided string is not a valid object ID.
    #[error("invalid object ID: {0}")]
    InvalidOid(String),

    /// An abbreviated object ID matched more than one object.
    #[error("ambiguous object ID: {0}")]
    AmbiguousOid(String),

    /// The provided string is not a valid reference name.
    #[error("invalid reference name: {0}")]
    InvalidRefName(String),

    /// The object is invalid or corrupted.
    #[error("invalid object {oid}: {reason}")]
    InvalidObject {
        /// The object ID.
        oid: String,
        /// The reason for invalidity.
        reason: String,
    },

    /// Type mismatch when expecting a specific object type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: &'static str,
        /// The actual type.
        actual: &'static str,
    },

    /// Invalid UTF-8 sequence encountered.
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,

    /// A signature line could not be parsed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Zlib decompression failed.
    #[error("zlib decompression failed")]
    DecompressionFailed,

    /// The operation needs a working tree but the repository is bare.
    #[error("operation requires a working tree")]
    BareRepository,

    /// The working tree has uncommitted changes.
    #[error("working tree has uncommitted changes")]
    DirtyWorkingTree,

    /// The branch has commits that are not reachable from any other ref.
    #[error("branch is not fully merged: {0}")]
    NotFullyMerged(String),

    /// The repository configuration file is malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A remote transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
