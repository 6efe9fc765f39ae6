//! Loose and packed reference storage.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::HEAD;
use crate::error::{Error, Result};
use crate::infra::{remove_empty_parents, LockFile};
use crate::objects::Oid;

/// Symbolic refs are followed at most this many levels.
const MAX_SYMREF_DEPTH: usize = 10;

const PACKED_REFS: &str = "packed-refs";

/// The stored value of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    /// A direct reference to an object ID.
    Direct(Oid),
    /// A symbolic reference to another ref (e.g., HEAD -> refs/heads/main).
    Symbolic(String),
}

impl RefValue {
    fn parse(name: &str, content: &str) -> Result<Self> {
        let content = content.trim();
        if let Some(target) = content.strip_prefix("ref:") {
            Ok(RefValue::Symbolic(target.trim().to_string()))
        } else {
            Oid::from_hex(content)
                .map(RefValue::Direct)
                .map_err(|_| Error::InvalidRefName(format!("{} holds {:?}", name, content)))
        }
    }

    fn encode(&self) -> String {
        match self {
            RefValue::Direct(oid) => format!("{}\n", oid),
            RefValue::Symbolic(target) => format!("ref: {}\n", target),
        }
    }
}

/// One line of `packed-refs`.
#[derive(Debug, Clone)]
struct PackedRef {
    oid: Oid,
    peeled: Option<Oid>,
}

/// Reads and writes refs under a git directory.
///
/// Writers serialize through `<ref>.lock` files; a concurrent writer sees
/// `Error::RefLocked`. Readers take no locks.
#[derive(Debug, Clone)]
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    /// Creates a ref store for the given git directory.
    pub fn new<P: AsRef<Path>>(git_dir: P) -> Self {
        RefStore {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    /// Maps a ref name to its loose file; names that would leave the git
    /// directory are rejected.
    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        if !is_contained(name) {
            return Err(Error::InvalidRefName(name.to_string()));
        }
        Ok(self.git_dir.join(name))
    }

    fn read_loose(&self, name: &str) -> Result<Option<RefValue>> {
        if !is_contained(name) {
            return Ok(None);
        }
        let path = self.git_dir.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        RefValue::parse(name, &content).map(Some)
    }

    fn read_packed(&self) -> Result<BTreeMap<String, PackedRef>> {
        let content = match fs::read_to_string(self.git_dir.join(PACKED_REFS)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut packed: BTreeMap<String, PackedRef> = BTreeMap::new();
        let mut last: Option<String> = None;
        for line in content.lines() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            if let Some(peeled) = line.strip_prefix('^') {
                if let Some(entry) = last.as_ref().and_then(|name| packed.get_mut(name)) {
                    entry.peeled = Oid::from_hex(peeled.trim()).ok();
                }
                continue;
            }
            if let Some((hex, name)) = line.split_once(' ') {
                let oid = Oid::from_hex(hex)?;
                packed.insert(name.to_string(), PackedRef { oid, peeled: None });
                last = Some(name.to_string());
            }
        }
        Ok(packed)
    }

    /// Reads a ref without following symbolic links.
    ///
    /// Loose refs shadow packed ones. Returns `Ok(None)` when the ref does
    /// not exist.
    pub fn read(&self, name: &str) -> Result<Option<RefValue>> {
        if let Some(value) = self.read_loose(name)? {
            return Ok(Some(value));
        }
        Ok(self
            .read_packed()?
            .remove(name)
            .map(|packed| RefValue::Direct(packed.oid)))
    }

    /// Returns true if the ref exists, loose or packed.
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.read(name)?.is_some())
    }

    /// Follows symbolic refs to the final ref name and its object id.
    ///
    /// The id is `None` when the chain ends at a ref that does not exist
    /// yet, which is how an unborn branch looks.
    pub fn resolve(&self, name: &str) -> Result<(String, Option<Oid>)> {
        let mut current = name.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read(&current)? {
                Some(RefValue::Direct(oid)) => return Ok((current, Some(oid))),
                Some(RefValue::Symbolic(target)) => current = target,
                None => return Ok((current, None)),
            }
        }
        Err(Error::InvalidRefName(format!(
            "too many levels of symbolic refs: {}",
            name
        )))
    }

    /// Resolves a ref to an object id, `None` if missing or unborn.
    pub fn resolve_oid(&self, name: &str) -> Result<Option<Oid>> {
        Ok(self.resolve(name)?.1)
    }

    /// Returns the full ref name HEAD points at, or `None` when detached.
    pub fn head_target(&self) -> Result<Option<String>> {
        match self.read(HEAD)? {
            Some(RefValue::Symbolic(target)) => Ok(Some(target)),
            Some(RefValue::Direct(_)) => Ok(None),
            None => Err(Error::RefNotFound(HEAD.to_string())),
        }
    }

    /// Lists every ref under `prefix` (e.g. `refs/heads/`) with its raw value.
    ///
    /// Results are sorted by full name. Loose refs shadow packed refs of the
    /// same name.
    pub fn list(&self, prefix: &str) -> Result<Vec<(String, RefValue)>> {
        let mut refs: BTreeMap<String, RefValue> = self
            .read_packed()?
            .into_iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, packed)| (name, RefValue::Direct(packed.oid)))
            .collect();

        let dir = self.ref_path(prefix.trim_end_matches('/'))?;
        if dir.is_dir() {
            for entry in WalkDir::new(&dir).min_depth(1) {
                let entry = entry.map_err(|e| {
                    Error::Io(e.into_io_error().unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::Other, "ref directory walk failed")
                    }))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = match entry.path().strip_prefix(&self.git_dir) {
                    Ok(relative) => relative,
                    Err(_) => continue,
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.ends_with(".lock") {
                    continue;
                }
                match self.read_loose(&name) {
                    Ok(Some(value)) => {
                        refs.insert(name, value);
                    }
                    Ok(None) => {}
                    Err(err) => warn!(reference = %name, error = %err, "skipping unreadable ref"),
                }
            }
        }

        Ok(refs.into_iter().collect())
    }

    /// Returns the peeled commit recorded in `packed-refs` for an annotated
    /// tag, if any.
    pub fn packed_peeled(&self, name: &str) -> Result<Option<Oid>> {
        Ok(self.read_packed()?.get(name).and_then(|p| p.peeled))
    }

    /// Creates a new direct ref. Fails with `RefAlreadyExists` if present.
    pub fn create(&self, name: &str, oid: &Oid) -> Result<()> {
        let lock = LockFile::acquire(&self.ref_path(name)?, name)?;
        if self.exists(name)? {
            return Err(Error::RefAlreadyExists(name.to_string()));
        }
        lock.commit(RefValue::Direct(*oid).encode().as_bytes())?;
        debug!(reference = name, oid = %oid.short(), "created ref");
        Ok(())
    }

    /// Points `name` at `oid`.
    ///
    /// When `expected` is given the update is a compare-and-swap: if the ref
    /// no longer holds that value the update fails with `RefChanged`.
    /// Symbolic refs are followed, so updating `HEAD` moves its branch.
    pub fn update(&self, name: &str, oid: &Oid, expected: Option<&Oid>) -> Result<()> {
        let (target, _) = self.resolve(name)?;
        let lock = LockFile::acquire(&self.ref_path(&target)?, &target)?;
        let current = self.resolve_oid(&target)?;
        if let Some(expected) = expected {
            if current.as_ref() != Some(expected) {
                return Err(Error::RefChanged(target));
            }
        }
        lock.commit(RefValue::Direct(*oid).encode().as_bytes())?;
        trace!(reference = %target, oid = %oid.short(), "updated ref");
        Ok(())
    }

    /// Writes a symbolic ref such as `HEAD -> refs/heads/main`.
    pub fn set_symbolic(&self, name: &str, target: &str) -> Result<()> {
        let lock = LockFile::acquire(&self.ref_path(name)?, name)?;
        lock.commit(RefValue::Symbolic(target.to_string()).encode().as_bytes())
    }

    /// Writes a direct ref without following symbolic links (detaches HEAD).
    pub fn set_direct(&self, name: &str, oid: &Oid) -> Result<()> {
        let lock = LockFile::acquire(&self.ref_path(name)?, name)?;
        lock.commit(RefValue::Direct(*oid).encode().as_bytes())
    }

    /// Deletes a ref from both loose storage and `packed-refs`.
    ///
    /// Fails with `RefNotFound` if it exists in neither. Empty parent
    /// directories of a loose ref are pruned.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.ref_path(name)?;
        if !self.exists(name)? {
            return Err(Error::RefNotFound(name.to_string()));
        }
        let lock = LockFile::acquire(&path, name)?;

        let loose = self.read_loose(name)?.is_some();
        let mut packed = self.read_packed()?;
        let in_packed = packed.remove(name).is_some();
        if !loose && !in_packed {
            return Err(Error::RefNotFound(name.to_string()));
        }

        if in_packed {
            self.write_packed(&packed)?;
        }
        lock.commit_delete()?;

        if let Some(parent) = path.parent() {
            remove_empty_parents(parent, &self.git_dir.join("refs"));
        }
        debug!(reference = name, "deleted ref");
        Ok(())
    }

    fn write_packed(&self, packed: &BTreeMap<String, PackedRef>) -> Result<()> {
        let path = self.git_dir.join(PACKED_REFS);
        let lock = LockFile::acquire(&path, PACKED_REFS)?;
        let mut out = String::from("# pack-refs with: peeled fully-peeled sorted \n");
        for (name, entry) in packed {
            out.push_str(&format!("{} {}\n", entry.oid, name));
            if let Some(peeled) = entry.peeled {
                out.push_str(&format!("^{}\n", peeled));
            }
        }
        lock.commit(out.as_bytes())
    }
}

fn is_contained(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('\\')
        && name.split('/').all(|part| !matches!(part, "" | "." | ".."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OID_A: &str = "1111111111111111111111111111111111111111";
    const OID_B: &str = "2222222222222222222222222222222222222222";
    const OID_C: &str = "3333333333333333333333333333333333333333";

    fn setup() -> (TempDir, RefStore) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("refs/heads")).unwrap();
        fs::create_dir_all(temp.path().join("refs/tags")).unwrap();
        fs::write(temp.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();
        let store = RefStore::new(temp.path());
        (temp, store)
    }

    fn oid(hex: &str) -> Oid {
        Oid::from_hex(hex).unwrap()
    }

    #[test]
    fn test_unborn_head_resolves_to_none() {
        let (_temp, store) = setup();
        let (name, target) = store.resolve(HEAD).unwrap();
        assert_eq!(name, "refs/heads/main");
        assert_eq!(target, None);
        assert_eq!(
            store.head_target().unwrap().as_deref(),
            Some("refs/heads/main")
        );
    }

    #[test]
    fn test_create_and_resolve_through_head() {
        let (_temp, store) = setup();
        store.create("refs/heads/main", &oid(OID_A)).unwrap();
        assert_eq!(store.resolve_oid(HEAD).unwrap(), Some(oid(OID_A)));
    }

    #[test]
    fn test_create_existing_fails() {
        let (_temp, store) = setup();
        store.create("refs/heads/main", &oid(OID_A)).unwrap();
        assert!(matches!(
            store.create("refs/heads/main", &oid(OID_B)),
            Err(Error::RefAlreadyExists(_))
        ));
    }

    #[test]
    fn test_update_compare_and_swap() {
        let (_temp, store) = setup();
        store.create("refs/heads/main", &oid(OID_A)).unwrap();

        store
            .update(HEAD, &oid(OID_B), Some(&oid(OID_A)))
            .unwrap();
        assert_eq!(store.resolve_oid("refs/heads/main").unwrap(), Some(oid(OID_B)));

        let stale = store.update(HEAD, &oid(OID_C), Some(&oid(OID_A)));
        assert!(matches!(stale, Err(Error::RefChanged(name)) if name == "refs/heads/main"));
    }

    #[test]
    fn test_locked_ref_reports_locked() {
        let (temp, store) = setup();
        store.create("refs/heads/main", &oid(OID_A)).unwrap();
        fs::write(temp.path().join("refs/heads/main.lock"), "").unwrap();

        assert!(matches!(
            store.update("refs/heads/main", &oid(OID_B), None),
            Err(Error::RefLocked(_))
        ));
        assert!(store
            .list("refs/heads/")
            .unwrap()
            .iter()
            .all(|(name, _)| name == "refs/heads/main"));
    }

    #[test]
    fn test_list_merges_packed_and_loose() {
        let (temp, store) = setup();
        fs::write(
            temp.path().join("packed-refs"),
            format!(
                "# pack-refs with: peeled\n{} refs/heads/old\n{} refs/tags/v1\n^{}\n",
                OID_A, OID_B, OID_C
            ),
        )
        .unwrap();
        store.create("refs/heads/feature/x", &oid(OID_C)).unwrap();

        let names: Vec<_> = store
            .list("refs/heads/")
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["refs/heads/feature/x", "refs/heads/old"]);
        assert_eq!(store.packed_peeled("refs/tags/v1").unwrap(), Some(oid(OID_C)));
    }

    #[test]
    fn test_delete_packed_and_loose() {
        let (temp, store) = setup();
        fs::write(
            temp.path().join("packed-refs"),
            format!("{} refs/tags/v1\n", OID_A),
        )
        .unwrap();
        store.create("refs/heads/topic/a", &oid(OID_B)).unwrap();

        store.delete("refs/tags/v1").unwrap();
        store.delete("refs/heads/topic/a").unwrap();

        assert!(!store.exists("refs/tags/v1").unwrap());
        assert!(!temp.path().join("refs/heads/topic").exists());
        assert!(matches!(
            store.delete("refs/heads/topic/a"),
            Err(Error::RefNotFound(_))
        ));
    }

    #[test]
    fn test_symbolic_loop_is_an_error() {
        let (_temp, store) = setup();
        store.set_symbolic("refs/heads/a", "refs/heads/b").unwrap();
        store.set_symbolic("refs/heads/b", "refs/heads/a").unwrap();
        assert!(store.resolve("refs/heads/a").is_err());
    }

    #[test]
    fn test_names_escaping_git_dir_are_rejected() {
        let (temp, store) = setup();
        store.create("refs/heads/main", &oid(OID_A)).unwrap();

        assert!(matches!(
            store.delete("refs/heads/../../HEAD"),
            Err(Error::InvalidRefName(_))
        ));
        assert!(matches!(
            store.create("refs/tags/../heads/main", &oid(OID_B)),
            Err(Error::InvalidRefName(_))
        ));
        assert!(matches!(
            store.set_direct("refs/heads/./x", &oid(OID_B)),
            Err(Error::InvalidRefName(_))
        ));
        assert_eq!(store.read("refs/tags/../heads/main").unwrap(), None);

        assert!(temp.path().join("HEAD").is_file());
        assert_eq!(store.resolve_oid(HEAD).unwrap(), Some(oid(OID_A)));
    }
}
