//! Commit graph traversal.

use std::collections::{HashSet, VecDeque};

use crate::error::Result;
use crate::objects::Oid;
use crate::repository::Repository;

/// Returns every commit reachable from `tips`, the tips included.
pub fn reachable(repo: &Repository, tips: &[Oid]) -> Result<HashSet<Oid>> {
    let mut seen: HashSet<Oid> = HashSet::new();
    let mut queue: VecDeque<Oid> = tips.iter().copied().collect();

    while let Some(oid) = queue.pop_front() {
        if !seen.insert(oid) {
            continue;
        }
        let commit = repo.read_commit(&oid)?;
        queue.extend(commit.parents().iter().filter(|p| !seen.contains(*p)));
    }
    Ok(seen)
}

/// Returns true if `ancestor` is reachable from `descendant`.
///
/// A commit counts as its own ancestor.
pub fn is_ancestor(repo: &Repository, ancestor: &Oid, descendant: &Oid) -> Result<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    let mut seen: HashSet<Oid> = HashSet::new();
    let mut queue = VecDeque::from([*descendant]);
    while let Some(oid) = queue.pop_front() {
        if &oid == ancestor {
            return Ok(true);
        }
        if seen.insert(oid) {
            queue.extend(repo.read_commit(&oid)?.parents().iter().copied());
        }
    }
    Ok(false)
}

/// Finds the best common ancestor of `a` and `b`.
///
/// Among all common ancestors, those reachable from another common
/// ancestor are discarded; of the rest the most recently committed wins.
pub fn merge_base(repo: &Repository, a: &Oid, b: &Oid) -> Result<Option<Oid>> {
    let from_a = reachable(repo, &[*a])?;
    let from_b = reachable(repo, &[*b])?;
    let common: Vec<Oid> = from_a.intersection(&from_b).copied().collect();

    let mut best: Option<(i64, Oid)> = None;
    for candidate in &common {
        let mut dominated = false;
        for other in &common {
            if other != candidate && is_ancestor(repo, candidate, other)? {
                dominated = true;
                break;
            }
        }
        if dominated {
            continue;
        }
        let time = repo.read_commit(candidate)?.committer().timestamp();
        if best.map_or(true, |(t, _)| time > t) {
            best = Some((time, *candidate));
        }
    }
    Ok(best.map(|(_, oid)| oid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Signature;
    use std::fs;
    use tempfile::TempDir;

    fn sig(ts: i64) -> Signature {
        Signature::new("Test", "test@example.com", ts, 0)
    }

    /// main: A - B - D
    ///            \
    /// topic:      C
    fn forked() -> (TempDir, Repository, [Oid; 4]) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path(), false, "main").unwrap();
        fs::write(temp.path().join("f"), "a").unwrap();
        let a = repo.commit_worktree("A", &sig(1)).unwrap();
        fs::write(temp.path().join("f"), "b").unwrap();
        let b = repo.commit_worktree("B", &sig(2)).unwrap();

        repo.create_branch("topic", &b).unwrap();
        repo.checkout_branch("topic").unwrap();
        fs::write(temp.path().join("g"), "c").unwrap();
        let c = repo.commit_worktree("C", &sig(3)).unwrap();

        repo.checkout_branch("main").unwrap();
        fs::write(temp.path().join("f"), "d").unwrap();
        let d = repo.commit_worktree("D", &sig(4)).unwrap();
        (temp, repo, [a, b, c, d])
    }

    #[test]
    fn test_is_ancestor() {
        let (_temp, repo, [a, b, c, d]) = forked();
        assert!(is_ancestor(&repo, &a, &d).unwrap());
        assert!(is_ancestor(&repo, &b, &c).unwrap());
        assert!(is_ancestor(&repo, &d, &d).unwrap());
        assert!(!is_ancestor(&repo, &c, &d).unwrap());
        assert!(!is_ancestor(&repo, &d, &a).unwrap());
    }

    #[test]
    fn test_merge_base_of_fork() {
        let (_temp, repo, [a, b, c, d]) = forked();
        assert_eq!(merge_base(&repo, &c, &d).unwrap(), Some(b));
        assert_eq!(merge_base(&repo, &a, &d).unwrap(), Some(a));
    }

    #[test]
    fn test_reachable() {
        let (_temp, repo, [a, b, c, d]) = forked();
        let set = reachable(&repo, &[d]).unwrap();
        assert!(set.contains(&a) && set.contains(&b) && set.contains(&d));
        assert!(!set.contains(&c));
    }
}
