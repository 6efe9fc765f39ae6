//! Filesystem utilities: reads, atomic writes, lock files, tree removal.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{trace, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Reads the entire contents of a file as bytes.
///
/// A missing file maps to `Error::PathNotFound`.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::PathNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

/// Writes data to a file atomically.
///
/// The data goes to a sibling temporary file first, which is then renamed
/// over `path`. Parent directories are created as needed.
pub fn write_file_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;

    let temp_path = sibling(path, ".tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", name, suffix))
}

/// An exclusive `<file>.lock` held while a reference is rewritten.
///
/// Acquisition uses create-new semantics, so a second writer observes
/// `Error::RefLocked` instead of clobbering the first. Dropping an
/// uncommitted lock removes it.
#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
}

impl LockFile {
    /// Takes the lock for `target`. `name` is used in the error message.
    pub fn acquire(target: &Path, name: &str) -> Result<Self> {
        create_parent(target)?;
        let lock_path = sibling(target, ".lock");
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    Error::RefLocked(name.to_string())
                } else {
                    Error::Io(e)
                }
            })?;
        trace!(lock = %lock_path.display(), "acquired lock");
        Ok(LockFile {
            target: target.to_path_buf(),
            lock_path,
            file: Some(file),
        })
    }

    /// Writes the new contents and renames the lock over the target.
    pub fn commit(mut self, data: &[u8]) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&self.lock_path, &self.target)?;
        Ok(())
    }

    /// Releases the lock after deleting the target file.
    pub fn commit_delete(mut self) -> Result<()> {
        self.file.take();
        match fs::remove_file(&self.target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::remove_file(&self.lock_path)?;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if self.file.is_some() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

/// Recursively removes `root`, deepest entries first.
///
/// Individual failures are logged and skipped; removal continues with the
/// remaining entries. Nothing is restored on partial failure. Returns the
/// number of entries that could not be removed.
pub fn remove_tree(root: &Path) -> usize {
    let mut failures = 0;
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %root.display(), error = %err, "failed to walk entry for removal");
                failures += 1;
                continue;
            }
        };
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "failed to remove entry");
            failures += 1;
        }
    }
    failures
}

/// Removes empty directories from `start` upward, stopping at `stop`.
pub fn remove_empty_parents(start: &Path, stop: &Path) {
    let mut current = start.to_path_buf();
    while current != stop && current.starts_with(stop) {
        let is_empty = fs::read_dir(&current)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty || fs::remove_dir(&current).is_err() {
            break;
        }
        if !current.pop() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_file_not_found() {
        let result = read_file("/nonexistent/path/file.txt");
        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_write_file_atomic_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested/dir/file.txt");

        write_file_atomic(&file_path, b"Nested data").unwrap();
        write_file_atomic(&file_path, b"Replaced").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"Replaced");
        assert!(!temp_dir.path().join("nested/dir/file.txt.tmp").exists());
    }

    #[test]
    fn test_lock_file_commit_replaces_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("refs/heads/main");

        let lock = LockFile::acquire(&target, "refs/heads/main").unwrap();
        lock.commit(b"abc\n").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"abc\n");
        assert!(!temp_dir.path().join("refs/heads/main.lock").exists());
    }

    #[test]
    fn test_lock_file_is_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("HEAD");

        let _held = LockFile::acquire(&target, "HEAD").unwrap();
        let second = LockFile::acquire(&target, "HEAD");
        assert!(matches!(second, Err(Error::RefLocked(name)) if name == "HEAD"));
    }

    #[test]
    fn test_lock_file_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("HEAD");

        drop(LockFile::acquire(&target, "HEAD").unwrap());
        assert!(!temp_dir.path().join("HEAD.lock").exists());
        assert!(LockFile::acquire(&target, "HEAD").is_ok());
    }

    #[test]
    fn test_remove_tree_removes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("repo");
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("a/b/c/file.txt"), b"x").unwrap();
        fs::write(root.join("top.txt"), b"y").unwrap();

        assert_eq!(remove_tree(&root), 0);
        assert!(!root.exists());
    }

    #[test]
    fn test_remove_empty_parents_stops_at_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let stop = temp_dir.path().join("refs/heads");
        fs::create_dir_all(stop.join("feature/deep")).unwrap();
        fs::write(stop.join("keep"), b"").unwrap();

        remove_empty_parents(&stop.join("feature/deep"), &stop);

        assert!(!stop.join("feature").exists());
        assert!(stop.exists());
    }
}
