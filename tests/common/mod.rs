//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use repokeeper::{Oid, Repository, RepositoryStore, Signature};
use tempfile::TempDir;

/// A store rooted in a fresh temporary directory.
pub fn store() -> (TempDir, RepositoryStore) {
    let temp = TempDir::new().unwrap();
    let store = RepositoryStore::new(temp.path());
    (temp, store)
}

/// A store holding repository `name` with one commit containing `files`.
pub fn store_with_repo(name: &str, files: &[(&str, &[u8])]) -> (TempDir, RepositoryStore, Oid) {
    let (temp, store) = store();
    store.create(name, false).unwrap();
    let oid = commit_files(&store, name, files, "Initial commit");
    (temp, store, oid)
}

pub fn signature() -> Signature {
    Signature::now("Test User", "test@example.com")
}

/// Writes `files` into the working tree of `name` and commits everything.
pub fn commit_files(store: &RepositoryStore, name: &str, files: &[(&str, &[u8])], message: &str) -> Oid {
    let work = store.root().join(name);
    write_files(&work, files);
    let repo = Repository::open(&work).unwrap();
    repo.commit_worktree(message, &signature()).unwrap()
}

pub fn write_files(work: &Path, files: &[(&str, &[u8])]) {
    for (path, content) in files {
        let full = work.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
}

/// The commit a branch of `name` points at.
pub fn branch_tip(store: &RepositoryStore, name: &str, branch: &str) -> Option<Oid> {
    let repo = Repository::open(store.root().join(name)).unwrap();
    repo.refs()
        .resolve_oid(&format!("refs/heads/{}", branch))
        .unwrap()
}
