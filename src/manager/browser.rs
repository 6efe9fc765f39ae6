//! Reading trees and file contents at a revision.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, instrument};

use super::error::{Context, ManagerError, ManagerResult};
use super::model::{FileContent, FileTreeNode, FileType};
use super::resolver::RefResolver;
use super::store::RepositoryStore;
use crate::objects::tree::join_path;
use crate::objects::{FileMode, Oid, TreeEntry};
use crate::repository::Repository;

/// Files larger than this are reported without content.
pub const MAX_CONTENT_SIZE: u64 = 10 * 1024 * 1024;

/// Number of leading bytes searched for a NUL when sniffing binary files.
pub const BINARY_SNIFF_LEN: usize = 8000;

/// Read-only views of repository contents.
#[derive(Debug, Clone, Copy)]
pub struct TreeBrowser<'a> {
    store: &'a RepositoryStore,
}

/// A node whose children are still being collected.
struct Slot {
    node: FileTreeNode,
    children: Vec<usize>,
}

impl<'a> TreeBrowser<'a> {
    pub(crate) fn new(store: &'a RepositoryStore) -> Self {
        TreeBrowser { store }
    }

    /// Returns the tree under `path` at revision `rev` (HEAD when absent).
    ///
    /// An empty path means the repository root. Submodules appear as
    /// directories without children.
    #[instrument(skip(self))]
    pub fn get_tree(
        &self,
        repo_name: &str,
        rev: Option<&str>,
        path: &str,
    ) -> ManagerResult<FileTreeNode> {
        let repo = self.store.open(repo_name)?;
        let commit = RefResolver::resolve(&repo, rev)?;
        let root_tree = *repo.read_commit(&commit).context("failed to read commit")?.tree();

        let path = path.trim_matches('/');
        let (start, root) = if path.is_empty() {
            (Some(root_tree), directory_node("", ""))
        } else {
            let entry = repo
                .find_entry(&root_tree, path)
                .context("failed to read tree")?
                .ok_or_else(|| ManagerError::FileNotFound(path.to_string()))?;
            match entry.mode() {
                FileMode::Directory => (Some(*entry.oid()), directory_node(entry.name(), path)),
                FileMode::Submodule => (None, directory_node(entry.name(), path)),
                _ => {
                    return Err(ManagerError::InvalidOperation(format!(
                        "not a directory: {}",
                        path
                    )))
                }
            }
        };

        let mut slots = vec![Slot {
            node: root,
            children: Vec::new(),
        }];
        if let Some(start) = start {
            walk(&repo, start, path, &mut slots).context("failed to read tree")?;
        }
        debug!(repo = repo_name, path, nodes = slots.len(), "materialized tree");
        Ok(assemble(&mut slots, 0))
    }

    /// Returns the content of `file_path` at revision `rev`.
    ///
    /// Files over [`MAX_CONTENT_SIZE`] and files with a NUL byte in their
    /// first [`BINARY_SNIFF_LEN`] bytes come back without content.
    #[instrument(skip(self))]
    pub fn get_content(
        &self,
        repo_name: &str,
        rev: Option<&str>,
        file_path: &str,
    ) -> ManagerResult<FileContent> {
        let repo = self.store.open(repo_name)?;
        let commit = RefResolver::resolve(&repo, rev)?;
        let root_tree = *repo.read_commit(&commit).context("failed to read commit")?.tree();

        let path = file_path.trim_matches('/');
        let entry = repo
            .find_entry(&root_tree, path)
            .context("failed to read tree")?
            .filter(|e| e.mode().is_blob())
            .ok_or_else(|| ManagerError::FileNotFound(path.to_string()))?;

        let size = repo
            .object_header(entry.oid())
            .context("failed to read blob")?
            .size;
        if size > MAX_CONTENT_SIZE {
            return Ok(FileContent {
                path: path.to_string(),
                content: None,
                encoding: None,
                size,
                binary: false,
            });
        }

        let bytes = repo.read_blob(entry.oid()).context("failed to read blob")?;
        if is_binary(&bytes) {
            return Ok(FileContent {
                path: path.to_string(),
                content: None,
                encoding: None,
                size,
                binary: true,
            });
        }
        Ok(FileContent {
            path: path.to_string(),
            content: Some(String::from_utf8_lossy(&bytes).into_owned()),
            encoding: Some("UTF-8".to_string()),
            size,
            binary: false,
        })
    }
}

/// True if a NUL byte occurs within the sniffed prefix.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

fn directory_node(name: &str, path: &str) -> FileTreeNode {
    FileTreeNode {
        name: name.to_string(),
        path: path.to_string(),
        file_type: FileType::Directory,
        size: 0,
        children: Vec::new(),
    }
}

/// Breadth-first walk from tree `start`, whose path is `base`.
///
/// Each entry becomes a slot attached to its parent's slot, found through
/// the path index; directories are queued and entered in turn.
fn walk(repo: &Repository, start: Oid, base: &str, slots: &mut Vec<Slot>) -> crate::Result<()> {
    let mut index: HashMap<String, usize> = HashMap::new();
    index.insert(base.to_string(), 0);
    let mut queue = VecDeque::from([(start, base.to_string())]);

    while let Some((tree_oid, dir)) = queue.pop_front() {
        let parent = index.get(&dir).copied().unwrap_or(0);
        for entry in repo.read_tree(&tree_oid)?.entries() {
            let path = join_path(&dir, entry.name());
            let node = entry_node(repo, entry, &path)?;
            let slot = slots.len();
            slots.push(Slot {
                node,
                children: Vec::new(),
            });
            slots[parent].children.push(slot);

            if entry.mode() == FileMode::Directory {
                index.insert(path.clone(), slot);
                queue.push_back((*entry.oid(), path));
            }
        }
    }
    Ok(())
}

fn entry_node(repo: &Repository, entry: &TreeEntry, path: &str) -> crate::Result<FileTreeNode> {
    let (file_type, size) = match entry.mode() {
        FileMode::Directory | FileMode::Submodule => (FileType::Directory, 0),
        FileMode::Symlink => (FileType::Symlink, repo.object_header(entry.oid())?.size),
        FileMode::Regular | FileMode::Executable => {
            (FileType::File, repo.object_header(entry.oid())?.size)
        }
    };
    Ok(FileTreeNode {
        name: entry.name().to_string(),
        path: path.to_string(),
        file_type,
        size,
        children: Vec::new(),
    })
}

/// Moves slot `at` and its descendants out of the arena into a tree.
fn assemble(slots: &mut [Slot], at: usize) -> FileTreeNode {
    let children = std::mem::take(&mut slots[at].children);
    let mut node = std::mem::replace(&mut slots[at].node, directory_node("", ""));
    node.children = children
        .into_iter()
        .map(|child| assemble(slots, child))
        .collect();
    node
}
