//! # repokeeper
//!
//! Hosts a set of Git repositories under one root directory and manages
//! them by name: create, clone, list and delete repositories, work with
//! branches and tags, merge, and browse files at any revision.
//!
//! Everything runs on a pure Rust object store (loose objects, refs and
//! `packed-refs`); no libgit2 and no `git` binary are needed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use repokeeper::{RepositoryStore, ManagerResult};
//!
//! fn main() -> ManagerResult<()> {
//!     let store = RepositoryStore::new("/srv/repos");
//!     store.create("website", false)?;
//!
//!     for repo in store.list()? {
//!         println!("{} on {:?}", repo.name, repo.current_branch);
//!     }
//!
//!     let tree = store.browser().get_tree("website", None, "")?;
//!     println!("{} entries at the root", tree.children.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`manager`] - Repository, branch, tag and browsing operations by name
//! - [`service`] - Async wrapper running manager operations on blocking workers
//! - [`repository`] - A single repository on disk
//! - [`objects`] - Blobs, trees, commits and tags
//! - [`refs`] - Loose and packed references
//! - [`merge`] - Fast-forward, three-way and squash merges
//! - [`transport`] - Remote URLs, cloning and SSH settings
//! - [`config`] - Manager configuration file

pub mod config;
pub mod error;
pub mod gitconfig;
pub mod manager;
pub mod merge;
pub mod objects;
pub mod refs;
pub mod repository;
pub mod revwalk;
pub mod service;
pub mod transport;
pub mod worktree;

// Internal modules (not part of public API)
pub(crate) mod infra;

pub use config::{load_config, Identity, ManagerConfig};
pub use error::{Error, Result};
pub use repository::Repository;

pub use objects::{Commit, FileMode, Oid, Signature, TagObject, Tree, TreeEntry};
pub use refs::{RefStore, RefValue};

pub use manager::{
    BranchInfo, ErrorKind, FileContent, FileTreeNode, FileType, ManagerError, ManagerResult,
    MergeOutcome, MergeOutcomeStatus, RepositoryInfo, RepositoryStore, TagInfo,
};
pub use merge::MergeStatus;
pub use service::GitService;
pub use transport::{SessionFactory, SshConfig, SshKeyInfo, Transport};
