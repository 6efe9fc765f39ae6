//! Entities returned by the management API.
//!
//! Everything here is rebuilt from the repository on each call; nothing is
//! cached between requests.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::objects::Oid;

/// A repository under the store root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub name: String,
    pub path: String,
    /// Contents of the `description` file, unless it is git's placeholder.
    pub description: Option<String>,
    /// Branch HEAD names; `None` when detached.
    pub current_branch: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub bare: bool,
}

/// A local or remote-tracking branch.
///
/// The commit fields are all `None` for an unborn branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    /// Name without `refs/heads/` or `refs/remotes/`.
    pub name: String,
    pub commit_id: Option<Oid>,
    pub commit_message: Option<String>,
    pub author: Option<String>,
    pub commit_date: Option<DateTime<Utc>>,
    pub remote: bool,
    pub current: bool,
}

impl BranchInfo {
    pub(crate) fn unborn(name: String, current: bool) -> Self {
        BranchInfo {
            name,
            commit_id: None,
            commit_message: None,
            author: None,
            commit_date: None,
            remote: false,
            current,
        }
    }
}

/// What a tag ref points at, decided once when the tag is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagTarget {
    /// A tag object with its own message and tagger.
    Annotated {
        message: String,
        tagger: Option<String>,
        date: Option<DateTime<Utc>>,
        /// The object the tag chain peels to.
        commit_id: Oid,
    },
    /// A ref pointing straight at an object.
    Lightweight {
        commit_id: Oid,
        author: Option<String>,
        date: Option<DateTime<Utc>>,
    },
}

/// A tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    /// Name without `refs/tags/`.
    pub name: String,
    /// The tagged commit, never the tag object.
    pub commit_id: Oid,
    /// Present only for annotated tags.
    pub message: Option<String>,
    pub tagger: Option<String>,
    pub tag_date: Option<DateTime<Utc>>,
    pub annotated: bool,
}

impl TagInfo {
    pub(crate) fn new(name: String, target: TagTarget) -> Self {
        match target {
            TagTarget::Annotated {
                message,
                tagger,
                date,
                commit_id,
            } => TagInfo {
                name,
                commit_id,
                message: Some(message),
                tagger,
                tag_date: date,
                annotated: true,
            },
            TagTarget::Lightweight {
                commit_id,
                author,
                date,
            } => TagInfo {
                name,
                commit_id,
                message: None,
                tagger: author,
                tag_date: date,
                annotated: false,
            },
        }
    }
}

/// Outcome classes of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeOutcomeStatus {
    Merged,
    FastForward,
    AlreadyUpToDate,
    Conflicting,
    Failed,
    Aborted,
}

impl MergeOutcomeStatus {
    /// True for the statuses that leave the branch containing the source.
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            MergeOutcomeStatus::Merged
                | MergeOutcomeStatus::FastForward
                | MergeOutcomeStatus::AlreadyUpToDate
        )
    }
}

/// Result of merging a branch into the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub successful: bool,
    /// HEAD after the merge.
    pub merged_commit_id: Option<Oid>,
    /// Label of the underlying merge status, e.g. `Fast-forward`.
    pub message: String,
    pub status: MergeOutcomeStatus,
    /// Paths changed differently on both sides.
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// One entry of a browsed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTreeNode {
    pub name: String,
    /// Root-relative, `/`-separated, no leading slash.
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Blob size; 0 for directories.
    pub size: u64,
    /// In traversal order.
    pub children: Vec<FileTreeNode>,
}

impl FileTreeNode {
    /// Finds a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FileTreeNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// A file's bytes at some revision.
///
/// `content` is `None` for binary files and for files over the size limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub path: String,
    pub content: Option<String>,
    pub encoding: Option<String>,
    pub size: u64,
    pub binary: bool,
}
