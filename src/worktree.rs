//! Working tree scanning and materialization.
//!
//! The engine keeps no staging index. Commits snapshot the whole working
//! tree, and the dirty check compares the files of HEAD against what is on
//! disk by content hash.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::infra::{remove_empty_parents, write_file_atomic};
use crate::objects::{FileMode, FlatEntry, FlatTree, ObjectType, Oid};
use crate::repository::Repository;

fn work_dir(repo: &Repository) -> Result<&Path> {
    repo.work_dir().ok_or(Error::BareRepository)
}

fn to_fs_path(root: &Path, path: &str) -> PathBuf {
    path.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        FileMode::Executable
    } else {
        FileMode::Regular
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> FileMode {
    FileMode::Regular
}

/// Reads the blob content a path would have: file bytes, or the link target
/// for symlinks.
fn read_entry(path: &Path, mode: FileMode) -> io::Result<Vec<u8>> {
    if mode == FileMode::Symlink {
        Ok(fs::read_link(path)?
            .to_string_lossy()
            .into_owned()
            .into_bytes())
    } else {
        fs::read(path)
    }
}

/// Scans the working tree into a path map. Blobs are written to the object
/// database when `store` is set, otherwise only hashed.
fn scan(repo: &Repository, store: bool) -> Result<FlatTree> {
    let root = work_dir(repo)?;
    let mut files = FlatTree::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::Io(
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed")),
            )
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        let mode = if file_type.is_symlink() {
            FileMode::Symlink
        } else {
            file_mode(&entry.metadata().map_err(|e| {
                Error::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "stat failed")),
                )
            })?)
        };

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content = read_entry(entry.path(), mode)?;
        let oid = if store {
            repo.objects().write(ObjectType::Blob, &content)?
        } else {
            Oid::hash_object(ObjectType::Blob, &content)
        };
        files.insert(key, FlatEntry { mode, oid });
    }

    Ok(files)
}

/// Writes every working-tree file as a blob and returns the path map.
pub fn snapshot(repo: &Repository) -> Result<FlatTree> {
    scan(repo, true)
}

/// Returns true if any file tracked in `head` is missing or modified.
///
/// Untracked files do not count.
pub fn is_dirty(repo: &Repository, head: &FlatTree) -> Result<bool> {
    let root = work_dir(repo)?;
    for (path, entry) in head {
        if entry.mode == FileMode::Submodule {
            continue;
        }
        let fs_path = to_fs_path(root, path);
        let content = match read_entry(&fs_path, entry.mode) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = %path, "tracked file missing");
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };
        if Oid::hash_object(ObjectType::Blob, &content) != entry.oid {
            trace!(path = %path, "tracked file modified");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Moves the working tree from `from` to `to`.
///
/// Paths only in `from` are removed (pruning emptied directories); paths
/// that are new or changed in `to` are written from the object database.
pub fn migrate(repo: &Repository, from: &FlatTree, to: &FlatTree) -> Result<()> {
    let root = work_dir(repo)?;
    let mut removed = 0usize;
    let mut written = 0usize;

    for path in from.keys().filter(|p| !to.contains_key(*p)) {
        let fs_path = to_fs_path(root, path);
        match fs::remove_file(&fs_path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = fs_path.parent() {
            remove_empty_parents(parent, root);
        }
    }

    for (path, entry) in to {
        if from.get(path) == Some(entry) {
            continue;
        }
        write_entry(repo, root, path, entry)?;
        written += 1;
    }

    debug!(removed, written, "migrated working tree");
    Ok(())
}

fn write_entry(repo: &Repository, root: &Path, path: &str, entry: &FlatEntry) -> Result<()> {
    let fs_path = to_fs_path(root, path);
    match entry.mode {
        FileMode::Submodule => {
            fs::create_dir_all(&fs_path)?;
        }
        FileMode::Symlink => {
            let target = repo.read_blob(&entry.oid)?;
            if fs_path.symlink_metadata().is_ok() {
                fs::remove_file(&fs_path)?;
            }
            if let Some(parent) = fs_path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_symlink(&String::from_utf8_lossy(&target), &fs_path)?;
        }
        FileMode::Regular | FileMode::Executable | FileMode::Directory => {
            let content = repo.read_blob(&entry.oid)?;
            write_file_atomic(&fs_path, &content)?;
            set_executable(&fs_path, entry.mode == FileMode::Executable)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &str, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(target: &str, link: &Path) -> Result<()> {
    write_file_atomic(link, target.as_bytes())
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> Result<()> {
    Ok(())
}
