//! Integration tests for branch operations.

mod common;

use std::fs;

use pretty_assertions::assert_eq;
use repokeeper::{ErrorKind, MergeOutcomeStatus};

#[test]
fn test_list_unborn() {
    let (_temp, store) = common::store();
    store.create("fresh", false).unwrap();

    let branches = store.branches().list("fresh", false).unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "main");
    assert!(branches[0].current);
    assert_eq!(branches[0].commit_id, None);
}

#[test]
fn test_feature_branch_lifecycle() {
    let (temp, store, first) = common::store_with_repo("demo", &[("README.md", b"# Demo\n")]);
    let branches = store.branches();

    let created = branches.create("demo", "feature", None, true).unwrap();
    assert_eq!(created.name, "feature");
    assert_eq!(created.commit_id, Some(first));
    assert!(created.current);
    assert_eq!(created.commit_message.as_deref(), Some("Initial commit"));
    assert_eq!(created.author.as_deref(), Some("Test User"));

    let listed = branches.list("demo", false).unwrap();
    let current: Vec<(&str, bool)> = listed.iter().map(|b| (b.name.as_str(), b.current)).collect();
    assert_eq!(current, vec![("feature", true), ("main", false)]);

    let second = common::commit_files(&store, "demo", &[("feature.txt", b"new\n")], "Add feature");

    let main = branches.checkout("demo", "main").unwrap();
    assert!(main.current);
    assert!(!temp.path().join("demo/feature.txt").exists());

    let listed = branches.list("demo", false).unwrap();
    let names: Vec<(&str, bool)> = listed.iter().map(|b| (b.name.as_str(), b.current)).collect();
    assert_eq!(names, vec![("feature", false), ("main", true)]);

    let outcome = branches.merge("demo", "feature", None, false).unwrap();
    assert!(outcome.successful);
    assert_eq!(outcome.status, MergeOutcomeStatus::FastForward);
    assert_eq!(outcome.merged_commit_id, Some(second));
    assert_eq!(
        fs::read_to_string(temp.path().join("demo/feature.txt")).unwrap(),
        "new\n"
    );

    branches.delete("demo", "feature", false).unwrap();
    let remaining: Vec<String> = branches
        .list("demo", false)
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(remaining, vec!["main".to_string()]);
}

#[test]
fn test_create_at_start_point() {
    let (_temp, store, first) = common::store_with_repo("demo", &[("a.txt", b"1")]);
    common::commit_files(&store, "demo", &[("a.txt", b"2")], "Second");

    let branch = store
        .branches()
        .create("demo", "old", Some(&first.to_hex()), false)
        .unwrap();
    assert_eq!(branch.commit_id, Some(first));
    assert!(!branch.current);
}

#[test]
fn test_create_errors() {
    let (_temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);
    let branches = store.branches();

    let err = branches.create("demo", "main", None, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BranchAlreadyExists);

    let err = branches.create("demo", "bad..name", None, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let err = branches
        .create("demo", "topic", Some("no-such-rev"), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let err = branches.create("ghost", "topic", None, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryNotFound);
}

#[test]
fn test_delete_current_refused() {
    let (_temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);

    let err = store.branches().delete("demo", "main", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn test_delete_missing() {
    let (_temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);

    let err = store.branches().delete("demo", "nope", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BranchNotFound);
}

#[test]
fn test_delete_rejects_names_outside_heads() {
    let (temp, store, first) = common::store_with_repo("demo", &[("a.txt", b"1")]);
    let branches = store.branches();
    branches.create("demo", "other", None, false).unwrap();

    for name in ["../../HEAD", "../tags/x", "a/../other", ""] {
        let err = branches.delete("demo", name, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BranchNotFound, "{:?}", name);
    }

    assert!(temp.path().join("demo/.git/HEAD").is_file());
    let repo = store.get("demo").unwrap();
    assert_eq!(repo.current_branch.as_deref(), Some("main"));
    assert_eq!(common::branch_tip(&store, "demo", "other"), Some(first));
}

#[test]
fn test_checkout_rejects_names_outside_heads() {
    let (_temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);

    for name in ["../../HEAD", "../x", "HEAD"] {
        let err = store.branches().checkout("demo", name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BranchNotFound, "{:?}", name);
    }
    let repo = store.get("demo").unwrap();
    assert_eq!(repo.current_branch.as_deref(), Some("main"));
}

#[test]
fn test_delete_unmerged_needs_force() {
    let (_temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);
    let branches = store.branches();

    branches.create("demo", "wip", None, true).unwrap();
    common::commit_files(&store, "demo", &[("wip.txt", b"draft")], "WIP");
    branches.checkout("demo", "main").unwrap();

    let err = branches.delete("demo", "wip", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert!(common::branch_tip(&store, "demo", "wip").is_some());

    branches.delete("demo", "wip", true).unwrap();
    assert_eq!(common::branch_tip(&store, "demo", "wip"), None);
}

#[test]
fn test_checkout_refuses_dirty_tree() {
    let (temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);
    let branches = store.branches();

    branches.create("demo", "other", None, true).unwrap();
    common::commit_files(&store, "demo", &[("a.txt", b"2")], "Change");
    branches.checkout("demo", "main").unwrap();

    fs::write(temp.path().join("demo/a.txt"), "local edit").unwrap();
    let err = branches.checkout("demo", "other").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(
        fs::read_to_string(temp.path().join("demo/a.txt")).unwrap(),
        "local edit"
    );
}

#[test]
fn test_checkout_missing() {
    let (_temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);

    let err = store.branches().checkout("demo", "nowhere").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BranchNotFound);
}

#[test]
fn test_merge_unknown_source() {
    let (_temp, store, _) = common::store_with_repo("demo", &[("a.txt", b"1")]);

    let err = store
        .branches()
        .merge("demo", "nonexistent", None, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BranchNotFound);
}

#[test]
fn test_merge_in_bare_repository() {
    let (_temp, store) = common::store();
    store.create("bare", true).unwrap();

    let err = store.branches().merge("bare", "main", None, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}
