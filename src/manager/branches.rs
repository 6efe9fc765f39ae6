//! Branch listing, creation, checkout, deletion and merging.

use tracing::{info, instrument, warn};

use super::error::{Context, ManagerError, ManagerResult};
use super::model::{BranchInfo, MergeOutcome, MergeOutcomeStatus};
use super::resolver::{display_name, RefResolver};
use super::store::RepositoryStore;
use crate::error::Error;
use crate::merge::{self, MergeOptions, MergeStatus};
use crate::objects::Oid;
use crate::refs::{self, RefValue, HEADS_PREFIX, REMOTES_PREFIX};
use crate::repository::Repository;
use crate::transport;

/// Branch operations on the repositories of one store.
#[derive(Debug, Clone, Copy)]
pub struct BranchManager<'a> {
    store: &'a RepositoryStore,
}

impl<'a> BranchManager<'a> {
    pub(crate) fn new(store: &'a RepositoryStore) -> Self {
        BranchManager { store }
    }

    /// Lists local branches, plus remote-tracking ones with `include_remote`.
    ///
    /// An unborn current branch is reported with empty commit fields.
    /// Branches whose commit cannot be read are skipped.
    #[instrument(skip(self))]
    pub fn list(&self, repo_name: &str, include_remote: bool) -> ManagerResult<Vec<BranchInfo>> {
        let repo = self.store.open(repo_name)?;
        let current = repo.current_branch().context("failed to read HEAD")?;

        let mut prefixes = vec![HEADS_PREFIX];
        if include_remote {
            prefixes.push(REMOTES_PREFIX);
        }

        let mut branches = Vec::new();
        for prefix in prefixes {
            let listed = repo.refs().list(prefix).context("failed to list branches")?;
            for (full, value) in listed {
                // refs/remotes/<remote>/HEAD and similar aliases
                if matches!(value, RefValue::Symbolic(_)) {
                    continue;
                }
                match branch_info(&repo, &full, current.as_deref()) {
                    Ok(info) => branches.push(info),
                    Err(err) => warn!(reference = %full, error = %err, "skipping unreadable branch"),
                }
            }
        }

        if let Some(name) = current {
            let exists = repo
                .refs()
                .exists(&refs::branch_ref(&name))
                .context("failed to read branch")?;
            if !exists {
                branches.insert(0, BranchInfo::unborn(name, true));
            }
        }
        Ok(branches)
    }

    /// Creates a branch at `start_point` (HEAD when absent), optionally
    /// checking it out.
    ///
    /// The checkout is a separate step: if it fails the error is returned
    /// but the branch stays.
    #[instrument(skip(self))]
    pub fn create(
        &self,
        repo_name: &str,
        name: &str,
        start_point: Option<&str>,
        checkout: bool,
    ) -> ManagerResult<BranchInfo> {
        let repo = self.store.open(repo_name)?;
        refs::validate_name(name)
            .map_err(|_| ManagerError::InvalidOperation(format!("invalid branch name: {:?}", name)))?;

        let full = refs::branch_ref(name);
        if repo.refs().exists(&full).context("failed to read branch")? {
            return Err(ManagerError::BranchAlreadyExists(name.to_string()));
        }

        let start = RefResolver::resolve(&repo, start_point)?;
        repo.create_branch(name, &start).map_err(|e| match e {
            Error::RefAlreadyExists(_) => ManagerError::BranchAlreadyExists(name.to_string()),
            other => ManagerError::internal(format!("failed to create branch {}", name), other),
        })?;
        info!(repo = repo_name, branch = name, start = %start.short(), "created branch");

        if checkout {
            repo.checkout_branch(name)
                .map_err(|e| checkout_error(name, e))?;
            info!(repo = repo_name, branch = name, "checked out new branch");
        }

        let current = repo.current_branch().context("failed to read HEAD")?;
        branch_info(&repo, &full, current.as_deref()).context("failed to read branch")
    }

    /// Deletes a local branch other than the current one.
    ///
    /// Without `force`, a branch whose commits are not reachable from HEAD
    /// or another ref is refused.
    #[instrument(skip(self))]
    pub fn delete(&self, repo_name: &str, name: &str, force: bool) -> ManagerResult<()> {
        let repo = self.store.open(repo_name)?;
        if refs::validate_name(name).is_err() {
            return Err(ManagerError::BranchNotFound(name.to_string()));
        }
        let current = repo.current_branch().context("failed to read HEAD")?;
        if current.as_deref() == Some(name) {
            return Err(ManagerError::InvalidOperation(format!(
                "cannot delete the current branch: {}",
                name
            )));
        }

        repo.delete_branch(name, force).map_err(|e| match e {
            Error::RefNotFound(_) => ManagerError::BranchNotFound(name.to_string()),
            Error::NotFullyMerged(_) => ManagerError::InvalidOperation(format!(
                "branch {} is not fully merged; delete with force",
                name
            )),
            other => ManagerError::internal(format!("failed to delete branch {}", name), other),
        })?;
        info!(repo = repo_name, branch = name, force, "deleted branch");
        Ok(())
    }

    /// Switches the working tree and HEAD to branch `name`.
    ///
    /// A name with no local branch but exactly one remote-tracking branch
    /// `<remote>/<name>` gets a local tracking branch first.
    #[instrument(skip(self))]
    pub fn checkout(&self, repo_name: &str, name: &str) -> ManagerResult<BranchInfo> {
        let repo = self.store.open(repo_name)?;
        if refs::validate_name(name).is_err() {
            return Err(ManagerError::BranchNotFound(name.to_string()));
        }
        let full = refs::branch_ref(name);

        if !repo.refs().exists(&full).context("failed to read branch")? {
            let (remote, tip) = match unique_remote_branch(&repo, name)? {
                Some(found) => found,
                None => return Err(ManagerError::BranchNotFound(name.to_string())),
            };
            repo.create_branch(name, &tip)
                .map_err(|e| ManagerError::internal(format!("failed to create branch {}", name), e))?;
            let mut config = repo.config().context("failed to read config")?;
            transport::track(&mut config, &remote, name);
            repo.save_config(&config).context("failed to write config")?;
            info!(repo = repo_name, branch = name, remote = %remote, "created tracking branch");
        }

        repo.checkout_branch(name)
            .map_err(|e| checkout_error(name, e))?;
        info!(repo = repo_name, branch = name, "checked out branch");

        branch_info(&repo, &full, Some(name)).context("failed to read branch")
    }

    /// Merges `source` into the current branch.
    #[instrument(skip(self))]
    pub fn merge(
        &self,
        repo_name: &str,
        source: &str,
        message: Option<&str>,
        squash: bool,
    ) -> ManagerResult<MergeOutcome> {
        let repo = self.store.open(repo_name)?;
        if repo.is_bare() {
            return Err(ManagerError::InvalidOperation(
                "cannot merge in a bare repository".to_string(),
            ));
        }

        let target = repo
            .resolve_revision(source)
            .context("failed to resolve branch")?
            .ok_or_else(|| ManagerError::BranchNotFound(source.to_string()))?;

        let opts = MergeOptions {
            squash,
            message: message.filter(|m| !m.is_empty()).map(str::to_string),
            label: source.to_string(),
            committer: self.store.identity().signature(),
        };
        let report = merge::merge(&repo, &target, &opts)
            .map_err(|e| ManagerError::internal(format!("failed to merge {}", source), e))?;

        let status = map_merge_status(report.status);
        info!(
            repo = repo_name,
            source,
            status = ?status,
            engine_status = %report.status,
            "merged branch"
        );
        Ok(MergeOutcome {
            successful: status.is_successful(),
            merged_commit_id: report.new_head,
            message: report.status.label().to_string(),
            status,
            conflicts: report.conflicts,
        })
    }
}

/// Collapses an engine merge status into the outcome classes callers see.
pub fn map_merge_status(status: MergeStatus) -> MergeOutcomeStatus {
    match status {
        MergeStatus::FastForward | MergeStatus::FastForwardSquashed => {
            MergeOutcomeStatus::FastForward
        }
        MergeStatus::Merged
        | MergeStatus::MergedSquashed
        | MergeStatus::MergedNotCommitted
        | MergeStatus::MergedSquashedNotCommitted => MergeOutcomeStatus::Merged,
        MergeStatus::AlreadyUpToDate => MergeOutcomeStatus::AlreadyUpToDate,
        MergeStatus::Conflicting => MergeOutcomeStatus::Conflicting,
        MergeStatus::Aborted => MergeOutcomeStatus::Aborted,
        MergeStatus::Failed | MergeStatus::NotSupported | MergeStatus::CheckoutConflict => {
            MergeOutcomeStatus::Failed
        }
    }
}

fn checkout_error(name: &str, e: Error) -> ManagerError {
    match e {
        Error::RefNotFound(_) => ManagerError::BranchNotFound(name.to_string()),
        Error::DirtyWorkingTree => ManagerError::InvalidOperation(
            "working tree has uncommitted changes to tracked files".to_string(),
        ),
        other => ManagerError::internal(format!("failed to check out {}", name), other),
    }
}

/// Builds the listing entry for full ref `full`.
fn branch_info(repo: &Repository, full: &str, current: Option<&str>) -> crate::Result<BranchInfo> {
    let remote = full.starts_with(REMOTES_PREFIX);
    let name = display_name(full).to_string();
    let is_current = !remote && current == Some(name.as_str());

    let oid = match repo.refs().resolve_oid(full)? {
        Some(oid) => oid,
        None => {
            let mut info = BranchInfo::unborn(name, is_current);
            info.remote = remote;
            return Ok(info);
        }
    };
    let commit = repo.read_commit(&oid)?;
    Ok(BranchInfo {
        name,
        commit_id: Some(oid),
        commit_message: Some(commit.summary().to_string()),
        author: Some(commit.author().name().to_string()),
        commit_date: Some(commit.committer().when()),
        remote,
        current: is_current,
    })
}

/// Finds the single `refs/remotes/<remote>/<name>`, if exactly one exists.
fn unique_remote_branch(repo: &Repository, name: &str) -> ManagerResult<Option<(String, Oid)>> {
    let suffix = format!("/{}", name);
    let mut found = Vec::new();
    for (full, value) in repo
        .refs()
        .list(REMOTES_PREFIX)
        .context("failed to list remote branches")?
    {
        let RefValue::Direct(oid) = value else {
            continue;
        };
        let short = display_name(&full);
        if let Some(remote) = short.strip_suffix(&suffix) {
            if !remote.contains('/') {
                found.push((remote.to_string(), oid));
            }
        }
    }
    Ok(if found.len() == 1 { found.pop() } else { None })
}
