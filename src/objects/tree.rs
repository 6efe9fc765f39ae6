//! Git tree objects, plus conversion between nested trees and flat path maps.

use std::collections::BTreeMap;

use super::oid::{Oid, OID_BYTES};
use super::store::{ObjectDatabase, ObjectType, RawObject};
use crate::error::{Error, Result};

/// File mode for tree entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// Regular file (non-executable): 100644
    Regular,
    /// Executable file: 100755
    Executable,
    /// Symbolic link: 120000
    Symlink,
    /// Subdirectory (tree): 40000
    Directory,
    /// Git submodule (commit): 160000
    Submodule,
}

impl FileMode {
    /// Parses a file mode from its octal string representation.
    pub fn from_octal(s: &str) -> Option<Self> {
        match s {
            "100644" | "644" => Some(FileMode::Regular),
            "100755" | "755" => Some(FileMode::Executable),
            "120000" => Some(FileMode::Symlink),
            "40000" | "040000" => Some(FileMode::Directory),
            "160000" => Some(FileMode::Submodule),
            _ => None,
        }
    }

    /// Returns the octal string written into tree objects.
    pub fn as_octal(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Directory => "40000",
            FileMode::Submodule => "160000",
        }
    }

    /// Returns true if the entry points at a blob.
    pub fn is_blob(&self) -> bool {
        matches!(
            self,
            FileMode::Regular | FileMode::Executable | FileMode::Symlink
        )
    }

    /// Returns true if this mode represents a directory (tree).
    pub fn is_directory(&self) -> bool {
        matches!(self, FileMode::Directory)
    }
}

/// An entry in a Git tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    mode: FileMode,
    name: String,
    oid: Oid,
}

impl TreeEntry {
    /// Creates an entry.
    pub fn new(mode: FileMode, name: impl Into<String>, oid: Oid) -> Self {
        TreeEntry {
            mode,
            name: name.into(),
            oid,
        }
    }

    /// Returns the file mode of the entry.
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Returns the name of the entry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the object ID of the entry.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Git orders tree entries by name, with directories compared as if
    /// they ended in `/`.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if self.mode.is_directory() {
            key.push(b'/');
        }
        key
    }
}

/// A Git tree object representing one directory level.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Builds a tree from entries, putting them in git's canonical order.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by_key(TreeEntry::sort_key);
        Tree { entries }
    }

    /// Parses a tree body. Each entry is `<mode> <name>\0<20-byte-sha1>`.
    pub fn parse(raw: RawObject) -> Result<Self> {
        if raw.object_type != ObjectType::Tree {
            return Err(Error::TypeMismatch {
                expected: "tree",
                actual: raw.object_type.as_str(),
            });
        }

        let invalid = |reason: &str| Error::InvalidObject {
            oid: String::new(),
            reason: reason.to_string(),
        };

        let content = &raw.content;
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < content.len() {
            let space = content[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| invalid("missing space in tree entry"))?;
            let mode_str = std::str::from_utf8(&content[pos..pos + space])
                .map_err(|_| invalid("invalid UTF-8 in mode"))?;
            let mode = FileMode::from_octal(mode_str)
                .ok_or_else(|| invalid(&format!("unknown file mode: {}", mode_str)))?;
            pos += space + 1;

            let null = content[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| invalid("missing null byte in tree entry"))?;
            let name = std::str::from_utf8(&content[pos..pos + null])
                .map_err(|_| invalid("invalid UTF-8 in entry name"))?
                .to_string();
            pos += null + 1;

            let oid_bytes: [u8; OID_BYTES] = content
                .get(pos..pos + OID_BYTES)
                .and_then(|slice| slice.try_into().ok())
                .ok_or_else(|| invalid("truncated SHA-1 in tree entry"))?;
            pos += OID_BYTES;

            entries.push(TreeEntry {
                mode,
                name,
                oid: Oid::from_bytes(oid_bytes),
            });
        }

        Ok(Tree { entries })
    }

    /// Encodes the tree body.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_octal().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
        out
    }

    /// Returns a slice of all entries in the tree.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Returns true if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// Mode and blob id of one path in a flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatEntry {
    /// Entry mode. Never `Directory`.
    pub mode: FileMode,
    /// Blob id, or commit id for submodules.
    pub oid: Oid,
}

/// Every non-directory path of a tree, keyed by `/`-separated path.
pub type FlatTree = BTreeMap<String, FlatEntry>;

/// Reads and parses the tree `oid`.
pub fn read_tree(db: &ObjectDatabase, oid: &Oid) -> Result<Tree> {
    Tree::parse(db.read(oid)?).map_err(|e| match e {
        Error::InvalidObject { reason, .. } => Error::InvalidObject {
            oid: oid.to_hex(),
            reason,
        },
        other => other,
    })
}

/// Flattens the tree `oid` into a path map.
pub fn flatten(db: &ObjectDatabase, oid: &Oid) -> Result<FlatTree> {
    let mut out = FlatTree::new();
    flatten_into(db, oid, "", &mut out)?;
    Ok(out)
}

fn flatten_into(db: &ObjectDatabase, oid: &Oid, prefix: &str, out: &mut FlatTree) -> Result<()> {
    for entry in read_tree(db, oid)?.entries {
        let path = join_path(prefix, &entry.name);
        if entry.mode.is_directory() {
            flatten_into(db, &entry.oid, &path, out)?;
        } else {
            out.insert(
                path,
                FlatEntry {
                    mode: entry.mode,
                    oid: entry.oid,
                },
            );
        }
    }
    Ok(())
}

/// Writes nested tree objects for a path map and returns the root tree id.
pub fn write_flat(db: &ObjectDatabase, flat: &FlatTree) -> Result<Oid> {
    let nested: Vec<(Vec<&str>, &FlatEntry)> = flat
        .iter()
        .map(|(path, entry)| (path.split('/').collect(), entry))
        .collect();
    write_level(db, &nested)
}

fn write_level(db: &ObjectDatabase, items: &[(Vec<&str>, &FlatEntry)]) -> Result<Oid> {
    let mut entries = Vec::new();
    let mut subdirs: BTreeMap<&str, Vec<(Vec<&str>, &FlatEntry)>> = BTreeMap::new();

    for (components, entry) in items {
        match components.as_slice() {
            [name] => entries.push(TreeEntry::new(entry.mode, *name, entry.oid)),
            [dir, rest @ ..] => subdirs
                .entry(*dir)
                .or_default()
                .push((rest.to_vec(), *entry)),
            [] => {}
        }
    }

    for (dir, children) in subdirs {
        let oid = write_level(db, &children)?;
        entries.push(TreeEntry::new(FileMode::Directory, dir, oid));
    }

    let tree = Tree::from_entries(entries);
    db.write(ObjectType::Tree, &tree.serialize())
}

/// Joins a parent path and a child name with `/`.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHA1_A: [u8; 20] = [
        0xda, 0x39, 0xa3, 0xee, 0x5e, 0x6b, 0x4b, 0x0d, 0x32, 0x55, 0xbf, 0xef, 0x95, 0x60, 0x18,
        0x90, 0xaf, 0xd8, 0x07, 0x09,
    ];

    fn raw_tree(content: Vec<u8>) -> RawObject {
        RawObject {
            object_type: ObjectType::Tree,
            content,
        }
    }

    #[test]
    fn test_parse_type_mismatch() {
        let raw = RawObject {
            object_type: ObjectType::Blob,
            content: vec![],
        };
        assert!(matches!(
            Tree::parse(raw),
            Err(Error::TypeMismatch {
                expected: "tree",
                actual: "blob"
            })
        ));
    }

    #[test]
    fn test_parse_serialized_tree() {
        let oid = Oid::from_bytes(SHA1_A);
        let tree = Tree::from_entries(vec![
            TreeEntry::new(FileMode::Regular, "b.txt", oid),
            TreeEntry::new(FileMode::Directory, "a", oid),
            TreeEntry::new(FileMode::Executable, "run.sh", oid),
        ]);

        let parsed = Tree::parse(raw_tree(tree.serialize())).unwrap();
        let names: Vec<_> = parsed.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "b.txt", "run.sh"]);
        assert_eq!(parsed.get("run.sh").unwrap().mode(), FileMode::Executable);
        assert!(parsed.get("missing").is_none());
    }

    #[test]
    fn test_directory_sorts_as_if_slash_suffixed() {
        let oid = Oid::from_bytes(SHA1_A);
        let tree = Tree::from_entries(vec![
            TreeEntry::new(FileMode::Directory, "foo", oid),
            TreeEntry::new(FileMode::Regular, "foo.txt", oid),
        ]);
        let names: Vec<_> = tree.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["foo.txt", "foo"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Tree::parse(raw_tree(b"100644filename".to_vec())).is_err());
        assert!(Tree::parse(raw_tree(b"100644 filename".to_vec())).is_err());

        let mut truncated = b"100644 file\0".to_vec();
        truncated.extend_from_slice(&[0u8; 10]);
        assert!(Tree::parse(raw_tree(truncated)).is_err());
    }

    #[test]
    fn test_file_mode() {
        assert_eq!(FileMode::from_octal("100644"), Some(FileMode::Regular));
        assert_eq!(FileMode::from_octal("40000"), Some(FileMode::Directory));
        assert_eq!(FileMode::from_octal("160000"), Some(FileMode::Submodule));
        assert_eq!(FileMode::from_octal("invalid"), None);
        assert!(FileMode::Symlink.is_blob());
        assert!(!FileMode::Submodule.is_blob());
    }

    #[test]
    fn test_write_flat_then_flatten() {
        let temp = TempDir::new().unwrap();
        let db = ObjectDatabase::new(temp.path().join("objects"));
        let readme = db.write(ObjectType::Blob, b"# readme\n").unwrap();
        let app = db.write(ObjectType::Blob, b"app\n").unwrap();

        let mut flat = FlatTree::new();
        flat.insert(
            "README.md".to_string(),
            FlatEntry {
                mode: FileMode::Regular,
                oid: readme,
            },
        );
        flat.insert(
            "src/main/App.txt".to_string(),
            FlatEntry {
                mode: FileMode::Regular,
                oid: app,
            },
        );

        let root = write_flat(&db, &flat).unwrap();
        let tree = read_tree(&db, &root).unwrap();
        assert!(tree.get("src").unwrap().mode().is_directory());
        assert_eq!(flatten(&db, &root).unwrap(), flat);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "src"), "src");
        assert_eq!(join_path("src", "main"), "src/main");
    }
}
