//! Per-repository git configuration (`.git/config`).
//!
//! Only the keys the engine needs are interpreted: `core.bare`,
//! `remote.<name>.url`/`fetch` and `branch.<name>.remote`/`merge`.
//! Everything else round-trips untouched.

mod parser;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Error, Result};
use crate::infra::{read_file, write_file_atomic};

/// section -> subsection ("" for none) -> key -> value
type Entries = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// A parsed git configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitConfig {
    entries: Entries,
}

impl GitConfig {
    /// Parses configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        parser::parse(content)
    }

    /// Loads `path`, returning an empty config when the file is missing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match read_file(path) {
            Ok(bytes) => {
                let text = String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
                Self::parse(&text)
            }
            Err(Error::PathNotFound(_)) => Ok(GitConfig::default()),
            Err(e) => Err(e),
        }
    }

    /// Writes the configuration to `path` atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file_atomic(path, self.serialize().as_bytes())
    }

    /// Looks up a value. Pass `""` as `subsection` for plain sections.
    pub fn get(&self, section: &str, subsection: &str, key: &str) -> Option<&str> {
        self.entries
            .get(&section.to_ascii_lowercase())?
            .get(subsection)?
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Looks up a boolean value; `None` if the key is absent.
    pub fn get_bool(&self, section: &str, subsection: &str, key: &str) -> Result<Option<bool>> {
        self.get(section, subsection, key)
            .map(|value| match value.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" | "" => Ok(false),
                other => Err(Error::Config(format!(
                    "{}.{}: not a boolean: {}",
                    section, key, other
                ))),
            })
            .transpose()
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, section: &str, subsection: &str, key: &str, value: &str) {
        self.entries
            .entry(section.to_ascii_lowercase())
            .or_default()
            .entry(subsection.to_string())
            .or_default()
            .insert(key.to_ascii_lowercase(), value.to_string());
    }

    /// Removes a whole `[section "subsection"]` block.
    pub fn remove_subsection(&mut self, section: &str, subsection: &str) {
        let section = section.to_ascii_lowercase();
        if let Some(subs) = self.entries.get_mut(&section) {
            subs.remove(subsection);
            if subs.is_empty() {
                self.entries.remove(&section);
            }
        }
    }

    /// Encodes the configuration in git's file format.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (section, subsections) in &self.entries {
            for (subsection, keys) in subsections {
                if subsection.is_empty() {
                    let _ = writeln!(out, "[{}]", section);
                } else {
                    let escaped = subsection.replace('\\', "\\\\").replace('"', "\\\"");
                    let _ = writeln!(out, "[{} \"{}\"]", section, escaped);
                }
                for (key, value) in keys {
                    let _ = writeln!(out, "\t{} = {}", key, parser::quote_value(value));
                }
            }
        }
        out
    }
}
