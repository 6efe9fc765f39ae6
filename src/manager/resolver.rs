//! Revision resolution and ref namespace classification.

use crate::objects::Oid;
use crate::refs::{HEAD, HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};
use crate::repository::Repository;

use super::error::{Context, ManagerError, ManagerResult};

/// Which part of `refs/` a name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefNamespace {
    LocalBranch,
    RemoteBranch,
    Tag,
    Other,
}

/// Classifies a full ref name by prefix.
pub fn classify(name: &str) -> RefNamespace {
    if name.starts_with(HEADS_PREFIX) {
        RefNamespace::LocalBranch
    } else if name.starts_with(REMOTES_PREFIX) {
        RefNamespace::RemoteBranch
    } else if name.starts_with(TAGS_PREFIX) {
        RefNamespace::Tag
    } else {
        RefNamespace::Other
    }
}

/// Strips exactly one namespace prefix from a full ref name.
pub fn display_name(name: &str) -> &str {
    [HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// Turns user-supplied revisions into commit ids.
pub struct RefResolver;

impl RefResolver {
    /// Resolves `rev` to a commit; an absent or empty revision means HEAD.
    ///
    /// Unknown names, malformed strings and ids that name no commit all fail
    /// with `InvalidOperation`.
    pub fn resolve(repo: &Repository, rev: Option<&str>) -> ManagerResult<Oid> {
        let rev = rev.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(HEAD);
        repo.resolve_revision(rev)
            .context("failed to resolve reference")?
            .ok_or_else(|| ManagerError::InvalidOperation(format!("invalid reference: {}", rev)))
    }
}
