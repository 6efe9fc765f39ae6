//! Loose object database.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::oid::{is_hex_prefix, Oid, OID_HEX_LEN};
use crate::error::{Error, Result};
use crate::infra::{compress, decompress, inflate_prefix, read_file, write_file_atomic};

/// Bytes inflated when only the `<type> <size>\0` header is wanted.
const HEADER_PEEK: usize = 64;

/// The type of a Git object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// A blob (file content).
    Blob,
    /// A tree (directory listing).
    Tree,
    /// A commit.
    Commit,
    /// An annotated tag.
    Tag,
}

impl ObjectType {
    /// Returns the type name as used in Git object headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
        }
    }

    /// Parses a type name from a Git object header.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(ObjectType::Blob),
            "tree" => Some(ObjectType::Tree),
            "commit" => Some(ObjectType::Commit),
            "tag" => Some(ObjectType::Tag),
            _ => None,
        }
    }
}

/// A decoded object: type plus body (header stripped).
#[derive(Debug, Clone)]
pub struct RawObject {
    /// The type of the object.
    pub object_type: ObjectType,
    /// The object body.
    pub content: Vec<u8>,
}

/// Type and declared size of an object, read without loading its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// The type of the object.
    pub object_type: ObjectType,
    /// The declared body size in bytes.
    pub size: u64,
}

/// Reads and writes loose objects under `objects/`.
///
/// Each object lives in `objects/xx/yyyy...` as a zlib stream of
/// `<type> <size>\0<content>`. Objects are immutable once written, so
/// concurrent readers need no coordination.
#[derive(Debug, Clone)]
pub struct ObjectDatabase {
    objects_dir: PathBuf,
}

impl ObjectDatabase {
    /// Creates a database rooted at the given `objects` directory.
    pub fn new<P: AsRef<Path>>(objects_dir: P) -> Self {
        ObjectDatabase {
            objects_dir: objects_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the path of the loose file for `oid`.
    pub fn oid_to_path(&self, oid: &Oid) -> PathBuf {
        let hex = oid.to_hex();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn read_compressed(&self, oid: &Oid) -> Result<Vec<u8>> {
        read_file(self.oid_to_path(oid)).map_err(|e| match e {
            Error::PathNotFound(_) => Error::ObjectNotFound(oid.to_hex()),
            other => other,
        })
    }

    /// Splits `<type> <size>\0` off the front of `data`.
    fn parse_header(data: &[u8], oid: &Oid) -> Result<(ObjectHeader, usize)> {
        let invalid = |reason: String| Error::InvalidObject {
            oid: oid.to_hex(),
            reason,
        };

        let null_pos = data
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| invalid("missing null byte in header".to_string()))?;
        let header = std::str::from_utf8(&data[..null_pos])
            .map_err(|_| invalid("invalid UTF-8 in header".to_string()))?;
        let (type_str, size_str) = header
            .split_once(' ')
            .ok_or_else(|| invalid(format!("malformed header: {}", header)))?;

        let object_type = ObjectType::parse(type_str)
            .ok_or_else(|| invalid(format!("unknown object type: {}", type_str)))?;
        let size = size_str
            .parse()
            .map_err(|_| invalid(format!("invalid size: {}", size_str)))?;

        Ok((ObjectHeader { object_type, size }, null_pos + 1))
    }

    /// Reads and decodes an object.
    pub fn read(&self, oid: &Oid) -> Result<RawObject> {
        let data = decompress(&self.read_compressed(oid)?)?;
        let (header, body_start) = Self::parse_header(&data, oid)?;

        let content = data[body_start..].to_vec();
        if content.len() as u64 != header.size {
            return Err(Error::InvalidObject {
                oid: oid.to_hex(),
                reason: format!(
                    "size mismatch: header says {} but content is {} bytes",
                    header.size,
                    content.len()
                ),
            });
        }

        Ok(RawObject {
            object_type: header.object_type,
            content,
        })
    }

    /// Reads only the type and declared size of an object.
    ///
    /// Only the first few bytes of the stream are inflated, so this is cheap
    /// even for very large blobs.
    pub fn read_header(&self, oid: &Oid) -> Result<ObjectHeader> {
        let prefix = inflate_prefix(&self.read_compressed(oid)?, HEADER_PEEK)?;
        let (header, _) = Self::parse_header(&prefix, oid)?;
        Ok(header)
    }

    /// Checks if an object exists in the database.
    pub fn exists(&self, oid: &Oid) -> bool {
        self.oid_to_path(oid).is_file()
    }

    /// Finds objects whose id starts with the given hex prefix.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Vec<Oid>> {
        if !is_hex_prefix(prefix) {
            return Err(Error::InvalidOid(prefix.to_string()));
        }

        let prefix = prefix.to_ascii_lowercase();
        let (dir_prefix, file_prefix) = prefix.split_at(2);
        let subdir = self.objects_dir.join(dir_prefix);
        if !subdir.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in fs::read_dir(&subdir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(file_prefix) && name.len() == OID_HEX_LEN - 2 {
                if let Ok(oid) = Oid::from_hex(&format!("{}{}", dir_prefix, name)) {
                    matches.push(oid);
                }
            }
        }
        Ok(matches)
    }

    /// Resolves an abbreviated id to exactly one object.
    ///
    /// Returns `Ok(None)` when nothing matches and `Error::AmbiguousOid`
    /// when more than one object does.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Option<Oid>> {
        let mut matches = self.find_by_prefix(prefix)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(Error::AmbiguousOid(prefix.to_string())),
        }
    }

    /// Writes an object and returns its id. Writing an existing object is a
    /// no-op.
    pub fn write(&self, object_type: ObjectType, content: &[u8]) -> Result<Oid> {
        let oid = Oid::hash_object(object_type, content);
        let path = self.oid_to_path(&oid);
        if path.exists() {
            return Ok(oid);
        }

        let mut raw = format!("{} {}\0", object_type.as_str(), content.len()).into_bytes();
        raw.extend_from_slice(content);
        write_file_atomic(&path, &compress(&raw))?;
        trace!(oid = %oid.short(), kind = object_type.as_str(), "wrote object");
        Ok(oid)
    }

    /// Copies one object verbatim from another database.
    ///
    /// Returns false when the object was already present.
    pub fn copy_from(&self, source: &ObjectDatabase, oid: &Oid) -> Result<bool> {
        let path = self.oid_to_path(oid);
        if path.exists() {
            return Ok(false);
        }
        let compressed = source.read_compressed(oid)?;
        write_file_atomic(&path, &compressed)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ObjectDatabase) {
        let temp = TempDir::new().unwrap();
        let db = ObjectDatabase::new(temp.path().join("objects"));
        (temp, db)
    }

    #[test]
    fn test_write_then_read() {
        let (_temp, db) = setup();
        let oid = db.write(ObjectType::Blob, b"hello\n").unwrap();

        assert_eq!(oid.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        let raw = db.read(&oid).unwrap();
        assert_eq!(raw.object_type, ObjectType::Blob);
        assert_eq!(raw.content, b"hello\n");
        assert!(db.exists(&oid));
    }

    #[test]
    fn test_read_missing_object() {
        let (_temp, db) = setup();
        let oid = Oid::from_hex("ce013625030ba8dba906f756967f9e9ca394464a").unwrap();
        assert!(matches!(db.read(&oid), Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn test_read_header_of_large_blob() {
        let (_temp, db) = setup();
        let content = vec![b'a'; 3 * 1024 * 1024];
        let oid = db.write(ObjectType::Blob, &content).unwrap();

        let header = db.read_header(&oid).unwrap();
        assert_eq!(header.object_type, ObjectType::Blob);
        assert_eq!(header.size, content.len() as u64);
    }

    #[test]
    fn test_size_mismatch_is_invalid() {
        let (_temp, db) = setup();
        let oid = Oid::hash_object(ObjectType::Blob, b"abc");
        write_file_atomic(db.oid_to_path(&oid), &compress(b"blob 10\0abc")).unwrap();

        assert!(matches!(db.read(&oid), Err(Error::InvalidObject { .. })));
    }

    #[test]
    fn test_resolve_prefix() {
        let (_temp, db) = setup();
        let oid = db.write(ObjectType::Blob, b"hello\n").unwrap();

        assert_eq!(db.resolve_prefix("ce0136").unwrap(), Some(oid));
        assert_eq!(db.resolve_prefix("ffff").unwrap(), None);
        assert!(matches!(db.resolve_prefix("ce"), Err(Error::InvalidOid(_))));
    }

    #[test]
    fn test_copy_from_other_database() {
        let (_temp, source) = setup();
        let (_temp2, dest) = setup();
        let oid = source.write(ObjectType::Blob, b"payload").unwrap();

        assert!(dest.copy_from(&source, &oid).unwrap());
        assert!(!dest.copy_from(&source, &oid).unwrap());
        assert_eq!(dest.read(&oid).unwrap().content, b"payload");
    }
}
