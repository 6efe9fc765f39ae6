//! References: loose and packed refs, HEAD, and ref-name rules.

pub mod store;

pub use store::{RefStore, RefValue};

use crate::error::{Error, Result};

/// Prefix of local branch refs.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Prefix of remote-tracking branch refs.
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// Prefix of tag refs.
pub const TAGS_PREFIX: &str = "refs/tags/";

/// The symbolic ref naming the checked-out branch.
pub const HEAD: &str = "HEAD";

/// Checks a short branch or tag name against git's ref-name rules.
pub fn validate_name(name: &str) -> Result<()> {
    let reject = |why: &str| -> Result<()> {
        Err(Error::InvalidRefName(format!("{}: {}", why, name)))
    };

    if name.is_empty() {
        return reject("name cannot be empty");
    }
    if name == "@" || name == HEAD {
        return reject("reserved name");
    }
    if name.starts_with('-') {
        return reject("name cannot start with '-'");
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return reject("name has an empty path component");
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return reject("name cannot end with '.' or '.lock'");
    }
    if name.contains("..") || name.contains("@{") {
        return reject("name cannot contain '..' or '@{'");
    }
    if name.split('/').any(|part| part.starts_with('.')) {
        return reject("path component cannot start with '.'");
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_control() || c.is_whitespace() || "~^:?*[\\".contains(*c))
    {
        return Err(Error::InvalidRefName(format!(
            "invalid character {:?}: {}",
            c, name
        )));
    }
    Ok(())
}

/// Returns `refs/heads/<name>`.
pub fn branch_ref(name: &str) -> String {
    format!("{}{}", HEADS_PREFIX, name)
}

/// Returns `refs/tags/<name>`.
pub fn tag_ref(name: &str) -> String {
    format!("{}{}", TAGS_PREFIX, name)
}
