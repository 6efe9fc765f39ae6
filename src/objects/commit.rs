//! Git commit objects and author/committer signatures.

use chrono::{DateTime, Local, Utc};

use super::oid::Oid;
use super::store::{ObjectType, RawObject};
use crate::error::{Error, Result};

/// An author, committer or tagger identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: String,
    email: String,
    /// Unix timestamp (seconds since epoch).
    timestamp: i64,
    /// Timezone offset in minutes (e.g., +0900 = 540, -0500 = -300).
    tz_offset: i32,
}

impl Signature {
    /// Creates a new Signature.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        timestamp: i64,
        tz_offset: i32,
    ) -> Self {
        Signature {
            name: name.into(),
            email: email.into(),
            timestamp,
            tz_offset,
        }
    }

    /// Creates a signature stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Local::now();
        Signature::new(
            name,
            email,
            now.timestamp(),
            now.offset().local_minus_utc() / 60,
        )
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the Unix timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the timestamp as a UTC instant.
    pub fn when(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }

    /// Parses `Name <email> timestamp +hhmm`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidSignature(s.to_string());

        let email_start = s.find('<').ok_or_else(invalid)?;
        let email_end = s.rfind('>').ok_or_else(invalid)?;
        if email_start >= email_end {
            return Err(invalid());
        }

        let name = s[..email_start].trim().to_string();
        let email = s[email_start + 1..email_end].to_string();

        let mut parts = s[email_end + 1..].split_whitespace();
        let timestamp = parts
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(invalid)?;
        let tz_offset = parts.next().and_then(parse_timezone).ok_or_else(invalid)?;

        Ok(Signature {
            name,
            email,
            timestamp,
            tz_offset,
        })
    }

    /// Encodes the signature as it appears in commit and tag headers.
    pub fn format(&self) -> String {
        let sign = if self.tz_offset < 0 { '-' } else { '+' };
        let offset = self.tz_offset.abs();
        format!(
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.timestamp,
            sign,
            offset / 60,
            offset % 60
        )
    }
}

/// Parses a timezone string like "+0900" or "-0500" into minutes offset.
fn parse_timezone(s: &str) -> Option<i32> {
    if s.len() != 5 || !s.is_ascii() {
        return None;
    }
    let sign = match &s[..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i32 = s[1..3].parse().ok()?;
    let minutes: i32 = s[3..5].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

/// A parsed commit object.
#[derive(Debug, Clone)]
pub struct Commit {
    oid: Oid,
    tree: Oid,
    parents: Vec<Oid>,
    author: Signature,
    committer: Signature,
    message: String,
}

impl Commit {
    /// Parses a commit body.
    ///
    /// ```text
    /// tree <sha1>
    /// parent <sha1>  (zero or more)
    /// author <signature>
    /// committer <signature>
    ///
    /// <message>
    /// ```
    pub fn parse(oid: Oid, raw: RawObject) -> Result<Self> {
        if raw.object_type != ObjectType::Commit {
            return Err(Error::TypeMismatch {
                expected: "commit",
                actual: raw.object_type.as_str(),
            });
        }

        let content = std::str::from_utf8(&raw.content).map_err(|_| Error::InvalidUtf8)?;
        let (headers, message) = content.split_once("\n\n").unwrap_or((content, ""));

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers.lines() {
            if let Some(value) = line.strip_prefix("tree ") {
                tree = Some(Oid::from_hex(value)?);
            } else if let Some(value) = line.strip_prefix("parent ") {
                parents.push(Oid::from_hex(value)?);
            } else if let Some(value) = line.strip_prefix("author ") {
                author = Some(Signature::parse(value)?);
            } else if let Some(value) = line.strip_prefix("committer ") {
                committer = Some(Signature::parse(value)?);
            }
            // gpgsig, encoding and continuation lines are ignored
        }

        let missing = |field: &str| Error::InvalidObject {
            oid: oid.to_hex(),
            reason: format!("missing {}", field),
        };

        Ok(Commit {
            oid,
            tree: tree.ok_or_else(|| missing("tree"))?,
            parents,
            author: author.ok_or_else(|| missing("author"))?,
            committer: committer.ok_or_else(|| missing("committer"))?,
            message: message.to_string(),
        })
    }

    /// Returns the OID (SHA-1 hash) of this commit.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Returns the tree object ID.
    pub fn tree(&self) -> &Oid {
        &self.tree
    }

    /// Returns the parent commit IDs.
    pub fn parents(&self) -> &[Oid] {
        &self.parents
    }

    /// Returns the author signature.
    pub fn author(&self) -> &Signature {
        &self.author
    }

    /// Returns the committer signature.
    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    /// Returns the full commit message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the first line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Encodes a commit body.
pub fn format_commit(
    tree: &Oid,
    parents: &[Oid],
    author: &Signature,
    committer: &Signature,
    message: &str,
) -> Vec<u8> {
    let mut out = format!("tree {}\n", tree);
    for parent in parents {
        out.push_str(&format!("parent {}\n", parent));
    }
    out.push_str(&format!("author {}\n", author.format()));
    out.push_str(&format!("committer {}\n", committer.format()));
    out.push('\n');
    out.push_str(message);
    if !message.ends_with('\n') {
        out.push('\n');
    }
    out.into_bytes()
}
