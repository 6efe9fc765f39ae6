//! Repository handle: layout detection, object and ref access, mutations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gitconfig::GitConfig;
use crate::objects::oid::is_hex_prefix;
use crate::objects::tree::{self, FlatTree};
use crate::objects::{
    format_commit, Commit, ObjectDatabase, ObjectHeader, ObjectType, Oid, Signature, TagObject,
    Tree, TreeEntry,
};
use crate::refs::{self, RefStore, HEAD, HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};
use crate::revwalk;
use crate::worktree;

/// Tag chains are peeled at most this many levels.
const MAX_PEEL_DEPTH: usize = 16;

/// An open git repository, bare or with a working tree.
///
/// A handle holds only paths; every read goes to disk, so two handles on
/// the same repository always observe each other's writes.
#[derive(Debug, Clone)]
pub struct Repository {
    git_dir: PathBuf,
    work_dir: Option<PathBuf>,
    objects: ObjectDatabase,
    refs: RefStore,
}

impl Repository {
    /// Returns true if `path` holds a repository in either layout: a `.git`
    /// entry, or a `HEAD` file next to an `objects` directory.
    pub fn is_repository<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        path.join(".git").exists() || (path.join("HEAD").is_file() && path.join("objects").is_dir())
    }

    fn validate_git_dir(git_dir: &Path) -> Result<()> {
        let valid = git_dir.join("HEAD").is_file()
            && git_dir.join("objects").is_dir()
            && git_dir.join("refs").is_dir();
        if valid {
            Ok(())
        } else {
            Err(Error::NotARepository(git_dir.to_path_buf()))
        }
    }

    fn from_dirs(git_dir: PathBuf, work_dir: Option<PathBuf>) -> Self {
        Repository {
            objects: ObjectDatabase::new(git_dir.join("objects")),
            refs: RefStore::new(&git_dir),
            git_dir,
            work_dir,
        }
    }

    /// Opens the repository at `path`.
    ///
    /// Metadata in `<path>/.git` gives a non-bare repository rooted at
    /// `path`; metadata directly in `path` gives a bare one. An explicit
    /// `core.bare = true` drops the working tree in either case.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let dot_git = path.join(".git");

        let (git_dir, work_dir) = if dot_git.is_dir() {
            (dot_git, Some(path.to_path_buf()))
        } else {
            (path.to_path_buf(), None)
        };
        Self::validate_git_dir(&git_dir).map_err(|_| Error::NotARepository(path.to_path_buf()))?;

        let mut repo = Self::from_dirs(git_dir, work_dir);
        if repo.config()?.get_bool("core", "", "bare")? == Some(true) {
            repo.work_dir = None;
        }
        debug!(path = %path.display(), bare = repo.is_bare(), "opened repository");
        Ok(repo)
    }

    /// Creates an empty repository at `path` whose HEAD names
    /// `default_branch` (unborn until the first commit).
    pub fn init<P: AsRef<Path>>(path: P, bare: bool, default_branch: &str) -> Result<Self> {
        let path = path.as_ref();
        if Self::is_repository(path) {
            return Err(Error::AlreadyARepository(path.to_path_buf()));
        }
        refs::validate_name(default_branch)?;

        let (git_dir, work_dir) = if bare {
            (path.to_path_buf(), None)
        } else {
            (path.join(".git"), Some(path.to_path_buf()))
        };
        for dir in ["objects/info", "objects/pack", "refs/heads", "refs/tags"] {
            fs::create_dir_all(git_dir.join(dir))?;
        }

        let repo = Self::from_dirs(git_dir, work_dir);
        repo.refs
            .set_symbolic(HEAD, &refs::branch_ref(default_branch))?;

        let mut config = GitConfig::default();
        config.set("core", "", "repositoryformatversion", "0");
        config.set("core", "", "filemode", "true");
        config.set("core", "", "bare", if bare { "true" } else { "false" });
        repo.save_config(&config)?;

        info!(path = %path.display(), bare, branch = default_branch, "initialized repository");
        Ok(repo)
    }

    /// Returns the metadata directory (`.git`, or the root when bare).
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Returns the working tree root, `None` for bare repositories.
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    /// Returns true if the repository has no working tree.
    pub fn is_bare(&self) -> bool {
        self.work_dir.is_none()
    }

    /// Returns the object database.
    pub fn objects(&self) -> &ObjectDatabase {
        &self.objects
    }

    /// Returns the ref store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Loads `config` from the metadata directory.
    pub fn config(&self) -> Result<GitConfig> {
        GitConfig::load(self.git_dir.join("config"))
    }

    /// Replaces `config` in the metadata directory.
    pub fn save_config(&self, config: &GitConfig) -> Result<()> {
        config.save(self.git_dir.join("config"))
    }

    // ---- HEAD -------------------------------------------------------------

    /// Returns the checked-out branch name, `None` when HEAD is detached.
    ///
    /// An unborn branch (no commits yet) is still reported.
    pub fn current_branch(&self) -> Result<Option<String>> {
        Ok(self
            .refs
            .head_target()?
            .and_then(|target| target.strip_prefix(HEADS_PREFIX).map(str::to_string)))
    }

    /// Returns the commit HEAD points at, `None` while unborn.
    pub fn head_oid(&self) -> Result<Option<Oid>> {
        self.refs.resolve_oid(HEAD)
    }

    // ---- objects ----------------------------------------------------------

    /// Reads and parses a commit.
    pub fn read_commit(&self, oid: &Oid) -> Result<Commit> {
        Commit::parse(*oid, self.objects.read(oid)?)
    }

    /// Reads and parses a tree.
    pub fn read_tree(&self, oid: &Oid) -> Result<Tree> {
        tree::read_tree(&self.objects, oid)
    }

    /// Reads and parses an annotated tag object.
    pub fn read_tag(&self, oid: &Oid) -> Result<TagObject> {
        TagObject::parse(oid, self.objects.read(oid)?)
    }

    /// Reads a blob's bytes.
    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>> {
        let raw = self.objects.read(oid)?;
        if raw.object_type != ObjectType::Blob {
            return Err(Error::TypeMismatch {
                expected: "blob",
                actual: raw.object_type.as_str(),
            });
        }
        Ok(raw.content)
    }

    /// Reads an object's type and size without loading its body.
    pub fn object_header(&self, oid: &Oid) -> Result<ObjectHeader> {
        self.objects.read_header(oid)
    }

    /// Follows annotated tags until a non-tag object is reached.
    pub fn peel(&self, oid: &Oid) -> Result<(Oid, ObjectType)> {
        let mut current = *oid;
        for _ in 0..MAX_PEEL_DEPTH {
            let header = self.objects.read_header(&current)?;
            if header.object_type != ObjectType::Tag {
                return Ok((current, header.object_type));
            }
            current = *self.read_tag(&current)?.target();
        }
        Err(Error::InvalidObject {
            oid: oid.to_hex(),
            reason: "tag chain too deep".to_string(),
        })
    }

    /// Flattens the tree of commit `oid` into a path map.
    pub fn commit_files(&self, oid: &Oid) -> Result<FlatTree> {
        let commit = self.read_commit(oid)?;
        tree::flatten(&self.objects, commit.tree())
    }

    /// Looks up `path` (`/`-separated, relative to the root) inside a tree.
    ///
    /// An empty path is not an entry; callers treat it as the root tree.
    pub fn find_entry(&self, tree_oid: &Oid, path: &str) -> Result<Option<TreeEntry>> {
        let mut current = *tree_oid;
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
        while let Some(name) = components.next() {
            let tree = self.read_tree(&current)?;
            let entry = match tree.get(name) {
                Some(entry) => entry.clone(),
                None => return Ok(None),
            };
            if components.peek().is_none() {
                return Ok(Some(entry));
            }
            if !entry.mode().is_directory() {
                return Ok(None);
            }
            current = *entry.oid();
        }
        Ok(None)
    }

    // ---- revisions --------------------------------------------------------

    /// Resolves a revision string to a commit id.
    ///
    /// Accepts `HEAD`, full ref names, short branch, tag and remote names,
    /// full or abbreviated object ids, and `^`, `^N`, `~N` suffixes.
    /// Annotated tags peel to their commit. Anything that does not name a
    /// commit yields `Ok(None)`.
    pub fn resolve_revision(&self, spec: &str) -> Result<Option<Oid>> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(None);
        }

        let split = spec.find(['^', '~']).unwrap_or(spec.len());
        let (base, mut suffix) = spec.split_at(split);

        let mut oid = match self.resolve_base(base)? {
            Some(oid) => oid,
            None => return Ok(None),
        };
        oid = match self.peel(&oid) {
            Ok((peeled, ObjectType::Commit)) => peeled,
            Ok(_) | Err(Error::ObjectNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        while let Some(op) = suffix.chars().next() {
            suffix = &suffix[op.len_utf8()..];
            if op != '^' && op != '~' {
                return Ok(None);
            }
            if op == '^' && suffix.starts_with('{') {
                // ^{} and ^{commit} peel, which has already happened.
                match suffix.find('}') {
                    Some(end) if matches!(&suffix[1..end], "" | "commit") => {
                        suffix = &suffix[end + 1..];
                        continue;
                    }
                    _ => return Ok(None),
                }
            }
            let digits = suffix.bytes().take_while(u8::is_ascii_digit).count();
            let count: usize = if digits == 0 {
                1
            } else {
                match suffix[..digits].parse() {
                    Ok(n) => n,
                    Err(_) => return Ok(None),
                }
            };
            suffix = &suffix[digits..];

            let next = match op {
                '^' if count == 0 => Some(oid),
                '^' => self.read_commit(&oid)?.parents().get(count - 1).copied(),
                _ => self.first_parent_ancestor(oid, count)?,
            };
            oid = match next {
                Some(oid) => oid,
                None => return Ok(None),
            };
        }

        Ok(Some(oid))
    }

    /// Follows first parents `count` times; `None` once history runs out.
    fn first_parent_ancestor(&self, start: Oid, count: usize) -> Result<Option<Oid>> {
        let mut current = start;
        for _ in 0..count {
            match self.read_commit(&current)?.parents().first() {
                Some(parent) => current = *parent,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn resolve_base(&self, base: &str) -> Result<Option<Oid>> {
        if base.is_empty() {
            return Ok(None);
        }
        let path_like = base.starts_with('/') || base.contains("..") || base.contains('\\');
        let candidates = [
            base.to_string(),
            format!("refs/{}", base),
            format!("{}{}", TAGS_PREFIX, base),
            format!("{}{}", HEADS_PREFIX, base),
            format!("{}{}", REMOTES_PREFIX, base),
            format!("{}{}/HEAD", REMOTES_PREFIX, base),
        ];
        for name in candidates.iter() {
            if path_like || (name != HEAD && !name.starts_with("refs/")) {
                continue;
            }
            if let Some(oid) = self.refs.resolve_oid(name)? {
                return Ok(Some(oid));
            }
        }

        if is_hex_prefix(base) {
            return match self.objects.resolve_prefix(base) {
                Ok(found) => Ok(found),
                Err(Error::AmbiguousOid(_)) => Ok(None),
                Err(e) => Err(e),
            };
        }
        Ok(None)
    }

    // ---- branches ---------------------------------------------------------

    /// Creates `refs/heads/<name>` at `target`.
    pub fn create_branch(&self, name: &str, target: &Oid) -> Result<()> {
        refs::validate_name(name)?;
        self.read_commit(target)?;
        self.refs.create(&refs::branch_ref(name), target)?;
        info!(branch = name, target = %target.short(), "created branch");
        Ok(())
    }

    /// Deletes a local branch.
    ///
    /// Without `force`, a branch whose tip is not reachable from HEAD or any
    /// other ref fails with `NotFullyMerged`.
    pub fn delete_branch(&self, name: &str, force: bool) -> Result<()> {
        refs::validate_name(name)?;
        let full = refs::branch_ref(name);
        let tip = match self.refs.resolve_oid(&full)? {
            Some(tip) => tip,
            None => return Err(Error::RefNotFound(full)),
        };

        if !force && !self.is_merged_elsewhere(&full, &tip)? {
            return Err(Error::NotFullyMerged(name.to_string()));
        }

        self.refs.delete(&full)?;
        let mut config = self.config()?;
        if config.get("branch", name, "remote").is_some()
            || config.get("branch", name, "merge").is_some()
        {
            config.remove_subsection("branch", name);
            self.save_config(&config)?;
        }
        info!(branch = name, "deleted branch");
        Ok(())
    }

    fn is_merged_elsewhere(&self, branch_ref: &str, tip: &Oid) -> Result<bool> {
        let mut tips = Vec::new();
        if let Some(head) = self.head_oid()? {
            tips.push(head);
        }
        for prefix in [HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX] {
            for (name, _) in self.refs.list(prefix)? {
                if name == branch_ref {
                    continue;
                }
                if let Some(oid) = self.refs.resolve_oid(&name)? {
                    if let Ok((peeled, ObjectType::Commit)) = self.peel(&oid) {
                        tips.push(peeled);
                    }
                }
            }
        }
        Ok(revwalk::reachable(self, &tips)?.contains(tip))
    }

    /// Switches HEAD (and the working tree, if any) to a local branch.
    ///
    /// Tracked files that differ from HEAD make this fail with
    /// `DirtyWorkingTree` before anything is touched.
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        refs::validate_name(name)?;
        let full = refs::branch_ref(name);
        let target = self
            .refs
            .resolve_oid(&full)?
            .ok_or_else(|| Error::RefNotFound(full.clone()))?;

        if !self.is_bare() {
            let current = self.head_oid()?;
            let from = match current {
                Some(oid) => self.commit_files(&oid)?,
                None => FlatTree::new(),
            };
            if worktree::is_dirty(self, &from)? {
                return Err(Error::DirtyWorkingTree);
            }
            let to = self.commit_files(&target)?;
            worktree::migrate(self, &from, &to)?;
        }

        self.refs.set_symbolic(HEAD, &full)?;
        info!(branch = name, target = %target.short(), "checked out branch");
        Ok(())
    }

    // ---- writing ----------------------------------------------------------

    /// Writes a commit object and returns its id. Refs are not touched.
    pub fn write_commit(
        &self,
        tree: &Oid,
        parents: &[Oid],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<Oid> {
        let body = format_commit(tree, parents, author, committer, message);
        self.objects.write(ObjectType::Commit, &body)
    }

    /// Commits every file in the working tree on top of HEAD.
    pub fn commit_worktree(&self, message: &str, signature: &Signature) -> Result<Oid> {
        let files = worktree::snapshot(self)?;
        let tree = tree::write_flat(&self.objects, &files)?;
        let parent = self.head_oid()?;
        let parents: Vec<Oid> = parent.into_iter().collect();

        let oid = self.write_commit(&tree, &parents, signature, signature, message)?;
        self.refs.update(HEAD, &oid, parent.as_ref())?;
        debug!(commit = %oid.short(), "committed working tree");
        Ok(oid)
    }

    /// Creates a tag pointing at `target`.
    ///
    /// With `annotation` an annotated tag object is written and the ref
    /// points at it; otherwise the ref points straight at `target`.
    pub fn create_tag(
        &self,
        name: &str,
        target: &Oid,
        annotation: Option<(&Signature, &str)>,
    ) -> Result<Oid> {
        refs::validate_name(name)?;
        let full = refs::tag_ref(name);
        if self.refs.exists(&full)? {
            return Err(Error::RefAlreadyExists(full));
        }

        let ref_target = match annotation {
            Some((tagger, message)) => {
                let kind = self.objects.read_header(target)?.object_type;
                let tag = TagObject::new(*target, kind, name, tagger.clone(), message);
                self.objects.write(ObjectType::Tag, &tag.serialize())?
            }
            None => *target,
        };
        self.refs.create(&full, &ref_target)?;
        info!(tag = name, target = %target.short(), annotated = annotation.is_some(), "created tag");
        Ok(ref_target)
    }

    /// Deletes `refs/tags/<name>`.
    pub fn delete_tag(&self, name: &str) -> Result<()> {
        refs::validate_name(name)?;
        self.refs.delete(&refs::tag_ref(name))?;
        info!(tag = name, "deleted tag");
        Ok(())
    }
}
