//! The registry of repositories under a root directory.

use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use super::branches::BranchManager;
use super::browser::TreeBrowser;
use super::error::{Context, ManagerError, ManagerResult};
use super::model::RepositoryInfo;
use super::tags::TagManager;
use crate::config::{Identity, ManagerConfig};
use crate::error::Error;
use crate::infra::remove_tree;
use crate::repository::Repository;
use crate::transport::{
    self, ssh, LocalTransport, RemoteUrl, SessionFactory, SshConfig, SshKeyInfo, Transport,
};

const PLACEHOLDER_DESCRIPTION: &str = "Unnamed repository;";

/// Owns the repositories below one root directory.
///
/// The store keeps no per-repository state: every operation opens a fresh
/// handle, so concurrent callers only share what is on disk.
#[derive(Clone)]
pub struct RepositoryStore {
    root: PathBuf,
    default_branch: String,
    identity: Identity,
    ssh: SshConfig,
    session_factory: Option<Arc<dyn SessionFactory>>,
}

impl std::fmt::Debug for RepositoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryStore")
            .field("root", &self.root)
            .field("default_branch", &self.default_branch)
            .field("identity", &self.identity)
            .field("ssh", &self.ssh)
            .field("session_factory", &self.session_factory.is_some())
            .finish()
    }
}

impl RepositoryStore {
    /// A store rooted at `root` with default settings.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::from_config(&ManagerConfig::new(root))
    }

    pub fn from_config(config: &ManagerConfig) -> Self {
        RepositoryStore {
            root: config.root.clone(),
            default_branch: config.default_branch.clone(),
            identity: config.identity.clone(),
            ssh: config.ssh.clone(),
            session_factory: None,
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// Replaces the SSH settings used by later clones.
    pub fn with_ssh(mut self, ssh: SshConfig) -> Self {
        self.ssh = ssh;
        self
    }

    /// Sets the factory that opens SSH transports for clones with `use_ssh`.
    pub fn with_session_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.session_factory = Some(factory);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn ssh_config(&self) -> &SshConfig {
        &self.ssh
    }

    /// Branch operations.
    pub fn branches(&self) -> BranchManager<'_> {
        BranchManager::new(self)
    }

    /// Tag operations.
    pub fn tags(&self) -> TagManager<'_> {
        TagManager::new(self)
    }

    /// Tree and file content reads.
    pub fn browser(&self) -> TreeBrowser<'_> {
        TreeBrowser::new(self)
    }

    fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    fn repo_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of an existing repository, or `RepositoryNotFound`.
    fn existing_path(&self, name: &str) -> ManagerResult<PathBuf> {
        let path = self.repo_path(name);
        if Self::is_valid_name(name) && Repository::is_repository(&path) {
            Ok(path)
        } else {
            Err(ManagerError::RepositoryNotFound(name.to_string()))
        }
    }

    /// Path for a repository about to be created.
    fn vacant_path(&self, name: &str) -> ManagerResult<PathBuf> {
        if !Self::is_valid_name(name) {
            return Err(ManagerError::InvalidOperation(format!(
                "invalid repository name: {:?}",
                name
            )));
        }
        let path = self.repo_path(name);
        if path.is_dir() {
            return Err(ManagerError::RepositoryAlreadyExists(name.to_string()));
        }
        Ok(path)
    }

    /// Opens a scoped handle on repository `name`.
    pub fn open(&self, name: &str) -> ManagerResult<RepositoryHandle> {
        let path = self.existing_path(name)?;
        let repo = Repository::open(&path).map_err(|e| match e {
            Error::NotARepository(_) => ManagerError::RepositoryNotFound(name.to_string()),
            other => ManagerError::internal(format!("failed to open repository {}", name), other),
        })?;
        debug!(repo = name, "acquired repository handle");
        Ok(RepositoryHandle {
            name: name.to_string(),
            repo,
        })
    }

    /// Creates an empty repository.
    #[instrument(skip(self))]
    pub fn create(&self, name: &str, bare: bool) -> ManagerResult<RepositoryInfo> {
        let path = self.vacant_path(name)?;
        Repository::init(&path, bare, &self.default_branch).map_err(|e| match e {
            Error::AlreadyARepository(_) => ManagerError::RepositoryAlreadyExists(name.to_string()),
            other => ManagerError::internal("failed to create repository", other),
        })?;
        info!(repo = name, bare, "created repository");
        self.get(name)
    }

    /// Clones `url` into a new repository `name`.
    ///
    /// With `use_ssh` the transport comes from the configured session
    /// factory; otherwise only local paths can be cloned. A failed clone
    /// leaves nothing behind.
    #[instrument(skip(self))]
    pub fn clone_repository(
        &self,
        url: &str,
        name: &str,
        branch: Option<&str>,
        use_ssh: bool,
    ) -> ManagerResult<RepositoryInfo> {
        let path = self.vacant_path(name)?;
        let remote = RemoteUrl::parse(url)
            .map_err(|e| ManagerError::clone_failed(format!("invalid url {}", url), Some(e)))?;
        let transport = self.transport_for(&remote, use_ssh)?;

        match transport::clone_repository(transport.as_ref(), url, &path, branch) {
            Ok(_) => {
                info!(repo = name, url, "cloned repository");
                self.get(name)
            }
            Err(e) => {
                if path.exists() {
                    let failures = remove_tree(&path);
                    debug!(repo = name, failures, "removed partial clone");
                }
                Err(ManagerError::clone_failed(
                    format!("failed to clone {}", url),
                    Some(e),
                ))
            }
        }
    }

    fn transport_for(&self, remote: &RemoteUrl, use_ssh: bool) -> ManagerResult<Box<dyn Transport>> {
        if use_ssh {
            let factory = self
                .session_factory
                .as_ref()
                .ok_or_else(|| ManagerError::ssh("no SSH session factory configured", None))?;
            return factory
                .open(remote, &self.ssh)
                .map_err(|e| ManagerError::ssh(format!("failed to open session to {}", remote), Some(e)));
        }
        match remote {
            RemoteUrl::Local(path) => LocalTransport::open(path)
                .map(|t| Box::new(t) as Box<dyn Transport>)
                .map_err(|e| {
                    ManagerError::clone_failed(format!("cannot read {}", path.display()), Some(e))
                }),
            other => Err(ManagerError::clone_failed(
                format!("no transport for {}", other),
                None,
            )),
        }
    }

    /// Lists every repository directly under the root.
    ///
    /// Directories that are not repositories are ignored, and repositories
    /// that cannot be inspected are skipped with a warning.
    #[instrument(skip(self))]
    pub fn list(&self) -> ManagerResult<Vec<RepositoryInfo>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ManagerError::internal("failed to read root", e.into())),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ManagerError::internal("failed to read root", e.into()))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut repos = Vec::new();
        for name in names {
            if !Self::is_valid_name(&name) || !Repository::is_repository(self.repo_path(&name)) {
                continue;
            }
            match self.get(&name) {
                Ok(info) => repos.push(info),
                Err(err) => warn!(repo = %name, error = %err, "skipping unreadable repository"),
            }
        }
        Ok(repos)
    }

    /// Describes repository `name`.
    pub fn get(&self, name: &str) -> ManagerResult<RepositoryInfo> {
        let handle = self.open(name)?;
        let repo = &*handle;
        let current_branch = repo
            .current_branch()
            .context("failed to read HEAD")?;

        let git_dir = repo.git_dir();
        let created_at = fs::metadata(git_dir)
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .map(to_utc);
        let updated_at = [
            git_dir.to_path_buf(),
            git_dir.join("HEAD"),
            git_dir.join("refs"),
            git_dir.join("refs/heads"),
            git_dir.join("packed-refs"),
        ]
        .iter()
        .filter_map(|p| fs::metadata(p).and_then(|m| m.modified()).ok())
        .max()
        .map(to_utc);

        Ok(RepositoryInfo {
            name: name.to_string(),
            path: self.repo_path(name).display().to_string(),
            description: read_description(git_dir),
            current_branch,
            created_at,
            updated_at,
            bare: repo.is_bare(),
        })
    }

    /// Removes repository `name` from disk.
    ///
    /// Removal is best effort: entries that cannot be deleted are logged and
    /// skipped, and entries already removed are not restored.
    #[instrument(skip(self))]
    pub fn delete(&self, name: &str) -> ManagerResult<()> {
        let path = self.existing_path(name)?;
        let failures = remove_tree(&path);
        if failures > 0 {
            warn!(repo = name, failures, "repository only partially removed");
        }
        info!(repo = name, "deleted repository");
        Ok(())
    }

    /// Which SSH key clones would use.
    pub fn ssh_key_info(&self) -> SshKeyInfo {
        self.ssh.key_info()
    }

    /// Probes an SSH server with the store's settings.
    pub fn test_ssh_connection(&self, host: &str, port: u16) -> bool {
        ssh::test_connection(&self.ssh, host, port)
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

fn read_description(git_dir: &Path) -> Option<String> {
    let text = fs::read_to_string(git_dir.join("description")).ok()?;
    let text = text.trim();
    if text.is_empty() || text.starts_with(PLACEHOLDER_DESCRIPTION) {
        None
    } else {
        Some(text.to_string())
    }
}

/// A repository opened for the duration of one operation.
///
/// Dereferences to [`Repository`]; dropping it releases the handle.
#[derive(Debug)]
pub struct RepositoryHandle {
    name: String,
    repo: Repository,
}

impl RepositoryHandle {
    /// The repository's name in the store.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Deref for RepositoryHandle {
    type Target = Repository;

    fn deref(&self) -> &Repository {
        &self.repo
    }
}

impl Drop for RepositoryHandle {
    fn drop(&mut self) {
        debug!(repo = %self.name, "released repository handle");
    }
}
