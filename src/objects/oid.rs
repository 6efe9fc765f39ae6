//! Object ID (SHA-1 hash) representation.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use sha1::{Digest, Sha1};

use super::store::ObjectType;
use crate::error::{Error, Result};

/// The length of a SHA-1 hash in bytes.
pub const OID_BYTES: usize = 20;

/// The length of a SHA-1 hash as a hexadecimal string.
pub const OID_HEX_LEN: usize = 40;

/// Shortest abbreviation accepted when resolving object ids.
pub const MIN_PREFIX_LEN: usize = 4;

/// A Git object ID (SHA-1 hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    bytes: [u8; OID_BYTES],
}

impl Oid {
    /// Parses a full 40-character hexadecimal id (case-insensitive).
    ///
    /// ```
    /// use repokeeper::objects::Oid;
    ///
    /// let oid = Oid::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
    /// assert_eq!(oid.short(), "da39a3e");
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != OID_HEX_LEN {
            return Err(Error::InvalidOid(hex.to_string()));
        }
        let mut bytes = [0u8; OID_BYTES];
        hex::decode_to_slice(hex, &mut bytes).map_err(|_| Error::InvalidOid(hex.to_string()))?;
        Ok(Oid { bytes })
    }

    /// Creates an Oid from a raw 20-byte hash.
    pub fn from_bytes(bytes: [u8; OID_BYTES]) -> Self {
        Oid { bytes }
    }

    /// Computes the id of an object as git does: SHA-1 over
    /// `<type> <size>\0<content>`.
    pub fn hash_object(kind: ObjectType, content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b" ");
        hasher.update(content.len().to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(content);
        Oid {
            bytes: hasher.finalize().into(),
        }
    }

    /// Returns the lowercase 40-character hexadecimal form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Returns the 7-character abbreviation used for display.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }

    /// Returns a reference to the raw 20-byte array.
    pub fn as_bytes(&self) -> &[u8; OID_BYTES] {
        &self.bytes
    }
}

/// Returns true if `s` looks like an abbreviated or full hex object id.
pub fn is_hex_prefix(s: &str) -> bool {
    (MIN_PREFIX_LEN..=OID_HEX_LEN).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short())
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Oid::from_hex(s)
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_BLOB: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    #[test]
    fn test_from_hex_normalizes_case() {
        let oid = Oid::from_hex("E69DE29BB2D1D6434B8B29AE775AD8C2E48C5391").unwrap();
        assert_eq!(oid.to_hex(), EMPTY_BLOB);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(Oid::from_hex("abc"), Err(Error::InvalidOid(_))));
        let bad = "g69de29bb2d1d6434b8b29ae775ad8c2e48c5391";
        assert!(matches!(Oid::from_hex(bad), Err(Error::InvalidOid(_))));
    }

    #[test]
    fn test_hash_object_matches_git() {
        assert_eq!(Oid::hash_object(ObjectType::Blob, b"").to_hex(), EMPTY_BLOB);
        assert_eq!(
            Oid::hash_object(ObjectType::Blob, b"hello\n").to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn test_short_and_debug() {
        let oid = Oid::from_hex(EMPTY_BLOB).unwrap();
        assert_eq!(oid.short(), "e69de29");
        assert_eq!(format!("{:?}", oid), "Oid(e69de29)");
    }

    #[test]
    fn test_is_hex_prefix() {
        assert!(is_hex_prefix("e69d"));
        assert!(is_hex_prefix(EMPTY_BLOB));
        assert!(!is_hex_prefix("e69"));
        assert!(!is_hex_prefix("main"));
    }

    #[test]
    fn test_serializes_as_hex_string() {
        let oid = Oid::from_hex(EMPTY_BLOB).unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, format!("\"{}\"", EMPTY_BLOB));
    }
}
