//! Integration tests for repository lifecycle operations.

mod common;

use std::fs;

use pretty_assertions::assert_eq;
use repokeeper::{ErrorKind, RepositoryStore};
use tempfile::TempDir;

#[test]
fn test_create_then_get() {
    let (temp, store) = common::store();

    let created = store.create("alpha", false).unwrap();
    assert_eq!(created.name, "alpha");
    assert_eq!(created.current_branch.as_deref(), Some("main"));
    assert!(!created.bare);
    assert_eq!(created.description, None);
    assert!(temp.path().join("alpha/.git/HEAD").is_file());

    let fetched = store.get("alpha").unwrap();
    assert_eq!(fetched.name, created.name);
    assert_eq!(fetched.path, created.path);
    assert!(fetched.updated_at.is_some());
}

#[test]
fn test_create_bare() {
    let (temp, store) = common::store();

    let info = store.create("mirror", true).unwrap();
    assert!(info.bare);
    assert!(temp.path().join("mirror/HEAD").is_file());
    assert!(!temp.path().join("mirror/.git").exists());
}

#[test]
fn test_create_duplicate() {
    let (_temp, store) = common::store();
    store.create("alpha", false).unwrap();

    let err = store.create("alpha", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryAlreadyExists);
}

#[test]
fn test_create_over_plain_directory() {
    let (temp, store) = common::store();
    fs::create_dir(temp.path().join("occupied")).unwrap();

    let err = store.create("occupied", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryAlreadyExists);
}

#[test]
fn test_invalid_names() {
    let (_temp, store) = common::store();

    for name in ["", "../escape", "a/b", "with space", ".hidden"] {
        let err = store.create(name, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation, "{:?}", name);

        let err = store.get(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RepositoryNotFound, "{:?}", name);
    }
}

#[test]
fn test_get_missing() {
    let (_temp, store) = common::store();
    let err = store.get("ghost").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryNotFound);
}

#[test]
fn test_list_sorted_and_filtered() {
    let (temp, store) = common::store();
    store.create("zeta", false).unwrap();
    store.create("alpha", true).unwrap();
    fs::create_dir(temp.path().join("not-a-repo")).unwrap();
    fs::write(temp.path().join("stray-file"), "x").unwrap();

    let names: Vec<String> = store.list().unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
}

#[test]
fn test_list_missing_root() {
    let temp = TempDir::new().unwrap();
    let store = RepositoryStore::new(temp.path().join("absent"));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_delete() {
    let (temp, store, _) = common::store_with_repo("doomed", &[("a.txt", b"a")]);

    store.delete("doomed").unwrap();
    assert!(!temp.path().join("doomed").exists());

    let err = store.get("doomed").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryNotFound);
    let err = store.delete("doomed").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepositoryNotFound);
}

#[test]
fn test_description() {
    let (temp, store) = common::store();
    store.create("described", false).unwrap();
    fs::write(
        temp.path().join("described/.git/description"),
        "Billing backend\n",
    )
    .unwrap();

    let info = store.get("described").unwrap();
    assert_eq!(info.description.as_deref(), Some("Billing backend"));
}

#[test]
fn test_info_serializes_camel_case() {
    let (_temp, store) = common::store();
    let info = store.create("json", false).unwrap();

    let value = serde_json::to_value(&info).unwrap();
    assert_eq!(value["name"], "json");
    assert_eq!(value["currentBranch"], "main");
    assert_eq!(value["bare"], false);
    assert!(value.get("createdAt").is_some());
}
