//! Tag listing, creation, lookup and deletion.

use tracing::{info, instrument, warn};

use super::error::{Context, ManagerError, ManagerResult};
use super::model::{TagInfo, TagTarget};
use super::resolver::{display_name, RefResolver};
use super::store::RepositoryStore;
use crate::error::Error;
use crate::objects::{ObjectType, Oid};
use crate::refs::{self, TAGS_PREFIX};
use crate::repository::Repository;

/// Tag operations on the repositories of one store.
#[derive(Debug, Clone, Copy)]
pub struct TagManager<'a> {
    store: &'a RepositoryStore,
}

impl<'a> TagManager<'a> {
    pub(crate) fn new(store: &'a RepositoryStore) -> Self {
        TagManager { store }
    }

    /// Lists every tag. Tags that cannot be read are skipped.
    #[instrument(skip(self))]
    pub fn list(&self, repo_name: &str) -> ManagerResult<Vec<TagInfo>> {
        let repo = self.store.open(repo_name)?;
        list_tags(&repo)
    }

    /// Creates a tag at `commit_id` (HEAD when absent).
    ///
    /// Lightweight tags ignore `message`.
    #[instrument(skip(self, message))]
    pub fn create(
        &self,
        repo_name: &str,
        name: &str,
        message: Option<&str>,
        commit_id: Option<&str>,
        annotated: bool,
    ) -> ManagerResult<TagInfo> {
        let repo = self.store.open(repo_name)?;
        refs::validate_name(name)
            .map_err(|_| ManagerError::InvalidOperation(format!("invalid tag name: {:?}", name)))?;
        if repo.refs().exists(&refs::tag_ref(name)).context("failed to read tag")? {
            return Err(ManagerError::TagAlreadyExists(name.to_string()));
        }

        let target = RefResolver::resolve(&repo, commit_id)?;
        let tagger = self.store.identity().signature();
        let annotation = annotated.then(|| (&tagger, message.unwrap_or("")));

        let ref_target = repo
            .create_tag(name, &target, annotation)
            .map_err(|e| match e {
                Error::RefAlreadyExists(_) => ManagerError::TagAlreadyExists(name.to_string()),
                other => ManagerError::internal(format!("failed to create tag {}", name), other),
            })?;
        info!(repo = repo_name, tag = name, target = %target.short(), annotated, "created tag");

        let resolved = read_target(&repo, &ref_target).context("failed to read tag")?;
        Ok(TagInfo::new(name.to_string(), resolved))
    }

    /// Finds tag `name`.
    pub fn get(&self, repo_name: &str, name: &str) -> ManagerResult<TagInfo> {
        let repo = self.store.open(repo_name)?;
        list_tags(&repo)?
            .into_iter()
            .find(|tag| tag.name == name)
            .ok_or_else(|| ManagerError::TagNotFound(name.to_string()))
    }

    /// Deletes tag `name`.
    #[instrument(skip(self))]
    pub fn delete(&self, repo_name: &str, name: &str) -> ManagerResult<()> {
        let repo = self.store.open(repo_name)?;
        if refs::validate_name(name).is_err() {
            return Err(ManagerError::TagNotFound(name.to_string()));
        }
        repo.delete_tag(name).map_err(|e| match e {
            Error::RefNotFound(_) => ManagerError::TagNotFound(name.to_string()),
            other => ManagerError::internal(format!("failed to delete tag {}", name), other),
        })?;
        info!(repo = repo_name, tag = name, "deleted tag");
        Ok(())
    }
}

fn list_tags(repo: &Repository) -> ManagerResult<Vec<TagInfo>> {
    let listed = repo.refs().list(TAGS_PREFIX).context("failed to list tags")?;
    let mut tags = Vec::with_capacity(listed.len());
    for (full, _) in listed {
        let resolved = repo
            .refs()
            .resolve_oid(&full)
            .and_then(|oid| oid.ok_or_else(|| Error::RefNotFound(full.clone())))
            .and_then(|oid| read_target(repo, &oid));
        match resolved {
            Ok(target) => tags.push(TagInfo::new(display_name(&full).to_string(), target)),
            Err(err) => warn!(reference = %full, error = %err, "skipping unreadable tag"),
        }
    }
    Ok(tags)
}

/// Decides whether `oid` is a tag object or a plain object and gathers the
/// matching metadata.
fn read_target(repo: &Repository, oid: &Oid) -> crate::Result<TagTarget> {
    let header = repo.object_header(oid)?;
    if header.object_type == ObjectType::Tag {
        let tag = repo.read_tag(oid)?;
        let (peeled, _) = repo.peel(oid)?;
        return Ok(TagTarget::Annotated {
            message: tag.message().to_string(),
            tagger: tag.tagger().map(|t| t.name().to_string()),
            date: tag.tagger().map(|t| t.when()),
            commit_id: peeled,
        });
    }

    if header.object_type == ObjectType::Commit {
        let commit = repo.read_commit(oid)?;
        return Ok(TagTarget::Lightweight {
            commit_id: *oid,
            author: Some(commit.author().name().to_string()),
            date: Some(commit.committer().when()),
        });
    }

    Ok(TagTarget::Lightweight {
        commit_id: *oid,
        author: None,
        date: None,
    })
}
