//! Async facade over [`RepositoryStore`].
//!
//! Each call runs on its own blocking worker. Workers share only the
//! immutable store settings; repository state is re-read from disk per call.

use std::io;
use std::sync::Arc;

use tracing::error;

use crate::error::Error;
use crate::manager::{
    BranchInfo, FileContent, FileTreeNode, ManagerError, ManagerResult, MergeOutcome,
    RepositoryInfo, RepositoryStore, TagInfo,
};
use crate::transport::SshKeyInfo;

/// Cloneable handle that runs store operations off the async runtime.
#[derive(Debug, Clone)]
pub struct GitService {
    store: Arc<RepositoryStore>,
}

impl GitService {
    pub fn new(store: RepositoryStore) -> Self {
        GitService {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &RepositoryStore {
        &self.store
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> ManagerResult<T>
    where
        F: FnOnce(&RepositoryStore) -> ManagerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || f(&store)).await {
            Ok(result) => result,
            Err(join) => {
                error!(op, error = %join, "worker did not complete");
                Err(ManagerError::internal(
                    op,
                    Error::Io(io::Error::new(io::ErrorKind::Other, join.to_string())),
                ))
            }
        }
    }

    pub async fn create_repository(
        &self,
        name: impl Into<String>,
        bare: bool,
    ) -> ManagerResult<RepositoryInfo> {
        let name = name.into();
        self.run("create repository", move |s| s.create(&name, bare))
            .await
    }

    pub async fn clone_repository(
        &self,
        url: impl Into<String>,
        name: impl Into<String>,
        branch: Option<String>,
        use_ssh: bool,
    ) -> ManagerResult<RepositoryInfo> {
        let (url, name) = (url.into(), name.into());
        self.run("clone repository", move |s| {
            s.clone_repository(&url, &name, branch.as_deref(), use_ssh)
        })
        .await
    }

    pub async fn list_repositories(&self) -> ManagerResult<Vec<RepositoryInfo>> {
        self.run("list repositories", |s| s.list()).await
    }

    pub async fn get_repository(&self, name: impl Into<String>) -> ManagerResult<RepositoryInfo> {
        let name = name.into();
        self.run("get repository", move |s| s.get(&name)).await
    }

    pub async fn delete_repository(&self, name: impl Into<String>) -> ManagerResult<()> {
        let name = name.into();
        self.run("delete repository", move |s| s.delete(&name)).await
    }

    pub async fn list_branches(
        &self,
        repo: impl Into<String>,
        include_remote: bool,
    ) -> ManagerResult<Vec<BranchInfo>> {
        let repo = repo.into();
        self.run("list branches", move |s| {
            s.branches().list(&repo, include_remote)
        })
        .await
    }

    pub async fn create_branch(
        &self,
        repo: impl Into<String>,
        name: impl Into<String>,
        start_point: Option<String>,
        checkout: bool,
    ) -> ManagerResult<BranchInfo> {
        let (repo, name) = (repo.into(), name.into());
        self.run("create branch", move |s| {
            s.branches()
                .create(&repo, &name, start_point.as_deref(), checkout)
        })
        .await
    }

    pub async fn delete_branch(
        &self,
        repo: impl Into<String>,
        name: impl Into<String>,
        force: bool,
    ) -> ManagerResult<()> {
        let (repo, name) = (repo.into(), name.into());
        self.run("delete branch", move |s| s.branches().delete(&repo, &name, force))
            .await
    }

    pub async fn checkout_branch(
        &self,
        repo: impl Into<String>,
        name: impl Into<String>,
    ) -> ManagerResult<BranchInfo> {
        let (repo, name) = (repo.into(), name.into());
        self.run("checkout branch", move |s| s.branches().checkout(&repo, &name))
            .await
    }

    pub async fn merge_branch(
        &self,
        repo: impl Into<String>,
        source: impl Into<String>,
        message: Option<String>,
        squash: bool,
    ) -> ManagerResult<MergeOutcome> {
        let (repo, source) = (repo.into(), source.into());
        self.run("merge branch", move |s| {
            s.branches()
                .merge(&repo, &source, message.as_deref(), squash)
        })
        .await
    }

    pub async fn list_tags(&self, repo: impl Into<String>) -> ManagerResult<Vec<TagInfo>> {
        let repo = repo.into();
        self.run("list tags", move |s| s.tags().list(&repo)).await
    }

    pub async fn create_tag(
        &self,
        repo: impl Into<String>,
        name: impl Into<String>,
        message: Option<String>,
        commit_id: Option<String>,
        annotated: bool,
    ) -> ManagerResult<TagInfo> {
        let (repo, name) = (repo.into(), name.into());
        self.run("create tag", move |s| {
            s.tags().create(
                &repo,
                &name,
                message.as_deref(),
                commit_id.as_deref(),
                annotated,
            )
        })
        .await
    }

    pub async fn get_tag(
        &self,
        repo: impl Into<String>,
        name: impl Into<String>,
    ) -> ManagerResult<TagInfo> {
        let (repo, name) = (repo.into(), name.into());
        self.run("get tag", move |s| s.tags().get(&repo, &name)).await
    }

    pub async fn delete_tag(
        &self,
        repo: impl Into<String>,
        name: impl Into<String>,
    ) -> ManagerResult<()> {
        let (repo, name) = (repo.into(), name.into());
        self.run("delete tag", move |s| s.tags().delete(&repo, &name))
            .await
    }

    pub async fn get_tree(
        &self,
        repo: impl Into<String>,
        rev: Option<String>,
        path: impl Into<String>,
    ) -> ManagerResult<FileTreeNode> {
        let (repo, path) = (repo.into(), path.into());
        self.run("get tree", move |s| {
            s.browser().get_tree(&repo, rev.as_deref(), &path)
        })
        .await
    }

    pub async fn get_content(
        &self,
        repo: impl Into<String>,
        rev: Option<String>,
        path: impl Into<String>,
    ) -> ManagerResult<FileContent> {
        let (repo, path) = (repo.into(), path.into());
        self.run("get content", move |s| {
            s.browser().get_content(&repo, rev.as_deref(), &path)
        })
        .await
    }

    pub fn ssh_key_info(&self) -> SshKeyInfo {
        self.store.ssh_key_info()
    }

    /// Probes an SSH server without blocking the runtime.
    pub async fn test_ssh_connection(&self, host: impl Into<String>, port: u16) -> bool {
        let host = host.into();
        self.run("test ssh connection", move |s| {
            Ok(s.test_ssh_connection(&host, port))
        })
        .await
        .unwrap_or(false)
    }
}
