//! Merging a commit into HEAD.
//!
//! Merges are resolved at path granularity: a path that changed on only one
//! side takes that side, and a path that changed differently on both sides is
//! a conflict. Nothing is written to the repository until the whole merge is
//! known to be clean.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::objects::tree::{self, FlatEntry, FlatTree};
use crate::objects::{Oid, Signature};
use crate::refs::HEAD;
use crate::repository::Repository;
use crate::revwalk;
use crate::worktree;

/// Terminal status of a merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeStatus {
    FastForward,
    FastForwardSquashed,
    AlreadyUpToDate,
    Failed,
    Merged,
    MergedSquashed,
    MergedSquashedNotCommitted,
    MergedNotCommitted,
    Conflicting,
    Aborted,
    NotSupported,
    CheckoutConflict,
}

impl MergeStatus {
    /// Every status, in declaration order.
    pub const ALL: [MergeStatus; 12] = [
        MergeStatus::FastForward,
        MergeStatus::FastForwardSquashed,
        MergeStatus::AlreadyUpToDate,
        MergeStatus::Failed,
        MergeStatus::Merged,
        MergeStatus::MergedSquashed,
        MergeStatus::MergedSquashedNotCommitted,
        MergeStatus::MergedNotCommitted,
        MergeStatus::Conflicting,
        MergeStatus::Aborted,
        MergeStatus::NotSupported,
        MergeStatus::CheckoutConflict,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            MergeStatus::FastForward => "Fast-forward",
            MergeStatus::FastForwardSquashed => "Fast-forward-squashed",
            MergeStatus::AlreadyUpToDate => "Already-up-to-date",
            MergeStatus::Failed => "Failed",
            MergeStatus::Merged => "Merged",
            MergeStatus::MergedSquashed => "Merged-squashed",
            MergeStatus::MergedSquashedNotCommitted => "Merged-squashed-not-committed",
            MergeStatus::MergedNotCommitted => "Merged-not-committed",
            MergeStatus::Conflicting => "Conflicting",
            MergeStatus::Aborted => "Aborted",
            MergeStatus::NotSupported => "Not-yet-supported",
            MergeStatus::CheckoutConflict => "Checkout Conflict",
        }
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parameters of a merge.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Update the work tree only; never write a commit.
    pub squash: bool,
    /// Overrides the default merge commit message.
    pub message: Option<String>,
    /// Name of what is being merged, used in the default message.
    pub label: String,
    /// Author and committer of a merge commit.
    pub committer: Signature,
}

/// Result of a merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub status: MergeStatus,
    /// HEAD after the merge; `None` while HEAD is unborn.
    pub new_head: Option<Oid>,
    /// Paths changed differently on both sides.
    pub conflicts: Vec<String>,
}

impl MergeReport {
    fn new(status: MergeStatus, new_head: Option<Oid>) -> Self {
        MergeReport {
            status,
            new_head,
            conflicts: Vec::new(),
        }
    }
}

/// Merges commit `target` into HEAD.
///
/// Outcomes that leave the repository untouched (conflicts, dirty work tree,
/// bare repository) are reported through the status rather than as errors.
pub fn merge(repo: &Repository, target: &Oid, opts: &MergeOptions) -> Result<MergeReport> {
    if repo.is_bare() {
        return Ok(MergeReport::new(MergeStatus::NotSupported, repo.head_oid()?));
    }

    let head = repo.head_oid()?;
    let ours = match head {
        Some(oid) => repo.commit_files(&oid)?,
        None => FlatTree::new(),
    };
    if worktree::is_dirty(repo, &ours)? {
        debug!("merge refused: tracked files modified");
        return Ok(MergeReport::new(MergeStatus::CheckoutConflict, head));
    }
    let theirs = repo.commit_files(target)?;

    let head = match head {
        Some(head) => head,
        None => return fast_forward(repo, None, target, &ours, &theirs, opts.squash),
    };

    if revwalk::is_ancestor(repo, target, &head)? {
        return Ok(MergeReport::new(MergeStatus::AlreadyUpToDate, Some(head)));
    }
    if revwalk::is_ancestor(repo, &head, target)? {
        return fast_forward(repo, Some(head), target, &ours, &theirs, opts.squash);
    }

    let base = match revwalk::merge_base(repo, &head, target)? {
        Some(base) => repo.commit_files(&base)?,
        None => FlatTree::new(),
    };
    let (merged, conflicts) = three_way(&base, &ours, &theirs);
    if !conflicts.is_empty() {
        info!(conflicts = conflicts.len(), "merge has conflicts");
        return Ok(MergeReport {
            status: MergeStatus::Conflicting,
            new_head: Some(head),
            conflicts,
        });
    }

    let tree = tree::write_flat(repo.objects(), &merged)?;
    if opts.squash {
        worktree::migrate(repo, &ours, &merged)?;
        return Ok(MergeReport::new(MergeStatus::MergedSquashed, Some(head)));
    }

    let message = opts
        .message
        .clone()
        .unwrap_or_else(|| format!("Merge branch '{}'", opts.label));
    let commit = repo.write_commit(
        &tree,
        &[head, *target],
        &opts.committer,
        &opts.committer,
        &message,
    )?;
    match repo.refs().update(HEAD, &commit, Some(&head)) {
        Ok(()) => {}
        Err(Error::RefChanged(name)) => {
            info!(reference = %name, "HEAD moved during merge");
            return Ok(MergeReport::new(MergeStatus::Aborted, Some(head)));
        }
        Err(e) => return Err(e),
    }
    worktree::migrate(repo, &ours, &merged)?;
    Ok(MergeReport::new(MergeStatus::Merged, Some(commit)))
}

fn fast_forward(
    repo: &Repository,
    head: Option<Oid>,
    target: &Oid,
    ours: &FlatTree,
    theirs: &FlatTree,
    squash: bool,
) -> Result<MergeReport> {
    if squash {
        worktree::migrate(repo, ours, theirs)?;
        return Ok(MergeReport::new(MergeStatus::FastForwardSquashed, head));
    }
    match repo.refs().update(HEAD, target, head.as_ref()) {
        Ok(()) => {}
        Err(Error::RefChanged(_)) => return Ok(MergeReport::new(MergeStatus::Aborted, head)),
        Err(e) => return Err(e),
    }
    worktree::migrate(repo, ours, theirs)?;
    Ok(MergeReport::new(MergeStatus::FastForward, Some(*target)))
}

/// Combines two path maps against their common base.
///
/// Returns the merged map and the sorted list of conflicting paths.
pub fn three_way(base: &FlatTree, ours: &FlatTree, theirs: &FlatTree) -> (FlatTree, Vec<String>) {
    let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
    let mut merged = FlatTree::new();
    let mut conflicts = Vec::new();

    for path in paths {
        let b = base.get(path);
        let o = ours.get(path);
        let t = theirs.get(path);

        let pick: Option<&FlatEntry> = if o == t || t == b {
            o
        } else if o == b {
            t
        } else {
            conflicts.push(path.clone());
            continue;
        };
        if let Some(entry) = pick {
            merged.insert(path.clone(), *entry);
        }
    }
    (merged, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{FileMode, ObjectType};
    use std::fs;
    use tempfile::TempDir;

    fn blob(content: &str) -> FlatEntry {
        FlatEntry {
            mode: FileMode::Regular,
            oid: Oid::hash_object(ObjectType::Blob, content.as_bytes()),
        }
    }

    fn map(items: &[(&str, &str)]) -> FlatTree {
        items.iter().map(|(p, c)| (p.to_string(), blob(c))).collect()
    }

    fn sig() -> Signature {
        Signature::new("Merger", "merger@example.com", 1_700_000_100, 0)
    }

    fn opts(squash: bool) -> MergeOptions {
        MergeOptions {
            squash,
            message: None,
            label: "topic".to_string(),
            committer: sig(),
        }
    }

    #[test]
    fn test_three_way_takes_one_sided_changes() {
        let base = map(&[("a", "1"), ("b", "1"), ("c", "1")]);
        let ours = map(&[("a", "2"), ("b", "1"), ("c", "1"), ("new", "x")]);
        let theirs = map(&[("a", "1"), ("b", "3")]);

        let (merged, conflicts) = three_way(&base, &ours, &theirs);
        assert!(conflicts.is_empty());
        assert_eq!(merged, map(&[("a", "2"), ("b", "3"), ("new", "x")]));
    }

    #[test]
    fn test_three_way_conflicts() {
        let base = map(&[("a", "1")]);
        let ours = map(&[("a", "2"), ("both", "x")]);
        let theirs = map(&[("a", "3"), ("both", "y")]);

        let (_, conflicts) = three_way(&base, &ours, &theirs);
        assert_eq!(conflicts, vec!["a".to_string(), "both".to_string()]);
    }

    #[test]
    fn test_three_way_same_change_is_clean() {
        let base = map(&[("a", "1")]);
        let same = map(&[("a", "2")]);
        let (merged, conflicts) = three_way(&base, &same, &same);
        assert!(conflicts.is_empty());
        assert_eq!(merged, same);
    }

    /// Returns a repo on `main` with `topic` forked from the first commit.
    fn diverged(conflict: bool) -> (TempDir, Repository, Oid, Oid) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path(), false, "main").unwrap();
        fs::write(temp.path().join("shared.txt"), "base\n").unwrap();
        let base = repo.commit_worktree("base", &sig()).unwrap();

        repo.create_branch("topic", &base).unwrap();
        repo.checkout_branch("topic").unwrap();
        if conflict {
            fs::write(temp.path().join("shared.txt"), "topic\n").unwrap();
        } else {
            fs::write(temp.path().join("topic.txt"), "topic\n").unwrap();
        }
        let topic = repo.commit_worktree("topic work", &sig()).unwrap();

        repo.checkout_branch("main").unwrap();
        if conflict {
            fs::write(temp.path().join("shared.txt"), "main\n").unwrap();
        } else {
            fs::write(temp.path().join("main.txt"), "main\n").unwrap();
        }
        let main = repo.commit_worktree("main work", &sig()).unwrap();
        (temp, repo, main, topic)
    }

    #[test]
    fn test_merge_commit() {
        let (temp, repo, main, topic) = diverged(false);
        let report = merge(&repo, &topic, &opts(false)).unwrap();

        assert_eq!(report.status, MergeStatus::Merged);
        let head = report.new_head.unwrap();
        assert_eq!(repo.head_oid().unwrap(), Some(head));
        let commit = repo.read_commit(&head).unwrap();
        assert_eq!(commit.parents(), &[main, topic]);
        assert_eq!(commit.summary(), "Merge branch 'topic'");
        assert!(temp.path().join("topic.txt").is_file());
        assert!(temp.path().join("main.txt").is_file());
    }

    #[test]
    fn test_merge_squash_leaves_head() {
        let (temp, repo, main, topic) = diverged(false);
        let report = merge(&repo, &topic, &opts(true)).unwrap();

        assert_eq!(report.status, MergeStatus::MergedSquashed);
        assert_eq!(repo.head_oid().unwrap(), Some(main));
        assert!(temp.path().join("topic.txt").is_file());
    }

    #[test]
    fn test_merge_conflict_touches_nothing() {
        let (temp, repo, main, topic) = diverged(true);
        let report = merge(&repo, &topic, &opts(false)).unwrap();

        assert_eq!(report.status, MergeStatus::Conflicting);
        assert_eq!(report.conflicts, vec!["shared.txt".to_string()]);
        assert_eq!(repo.head_oid().unwrap(), Some(main));
        assert_eq!(
            fs::read_to_string(temp.path().join("shared.txt")).unwrap(),
            "main\n"
        );
    }

    #[test]
    fn test_fast_forward_and_up_to_date() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path(), false, "main").unwrap();
        fs::write(temp.path().join("a.txt"), "a\n").unwrap();
        let first = repo.commit_worktree("first", &sig()).unwrap();
        repo.create_branch("old", &first).unwrap();
        fs::write(temp.path().join("b.txt"), "b\n").unwrap();
        let second = repo.commit_worktree("second", &sig()).unwrap();

        let report = merge(&repo, &first, &opts(false)).unwrap();
        assert_eq!(report.status, MergeStatus::AlreadyUpToDate);

        repo.checkout_branch("old").unwrap();
        assert!(!temp.path().join("b.txt").exists());
        let report = merge(&repo, &second, &opts(false)).unwrap();
        assert_eq!(report.status, MergeStatus::FastForward);
        assert_eq!(report.new_head, Some(second));
        assert_eq!(repo.refs().resolve_oid("refs/heads/old").unwrap(), Some(second));
        assert!(temp.path().join("b.txt").is_file());
    }

    #[test]
    fn test_dirty_tree_is_checkout_conflict() {
        let (temp, repo, main, topic) = diverged(false);
        fs::write(temp.path().join("main.txt"), "edited\n").unwrap();
        let report = merge(&repo, &topic, &opts(false)).unwrap();
        assert_eq!(report.status, MergeStatus::CheckoutConflict);
        assert_eq!(repo.head_oid().unwrap(), Some(main));
    }

    #[test]
    fn test_bare_is_not_supported() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path(), true, "main").unwrap();
        let target = Oid::hash_object(ObjectType::Commit, b"x");
        let report = merge(&repo, &target, &opts(false)).unwrap();
        assert_eq!(report.status, MergeStatus::NotSupported);
    }
}
