//! Fetching repositories from elsewhere.
//!
//! Network protocols are not implemented here. A [`Transport`] is anything
//! that can advertise refs and copy objects into a local database; the crate
//! ships [`LocalTransport`] for repositories on disk, and SSH remotes are
//! reached through a caller-supplied [`SessionFactory`].

pub mod local;
pub mod ssh;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gitconfig::GitConfig;
use crate::objects::{ObjectDatabase, ObjectType, Oid};
use crate::refs::{self, HEAD, HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX};
use crate::repository::Repository;
use crate::worktree;

pub use local::LocalTransport;
pub use ssh::{SessionFactory, SshConfig, SshKeyInfo};

/// Name of the remote a clone is wired to.
pub const ORIGIN: &str = "origin";

/// Refs offered by a remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisedRefs {
    /// Full ref name to object id.
    pub refs: BTreeMap<String, Oid>,
    /// The ref the remote's HEAD points at, e.g. `refs/heads/main`.
    pub head: Option<String>,
}

impl AdvertisedRefs {
    /// Branch names (without `refs/heads/`) and their tips.
    pub fn branches(&self) -> impl Iterator<Item = (&str, &Oid)> {
        self.refs
            .iter()
            .filter_map(|(name, oid)| name.strip_prefix(HEADS_PREFIX).map(|b| (b, oid)))
    }

    /// Tag names (without `refs/tags/`) and the objects they point at.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &Oid)> {
        self.refs
            .iter()
            .filter_map(|(name, oid)| name.strip_prefix(TAGS_PREFIX).map(|t| (t, oid)))
    }

    /// The branch a clone checks out by default.
    ///
    /// Follows the remote HEAD when it names an advertised branch; otherwise
    /// prefers `main`, then `master`, then the first branch.
    pub fn default_branch(&self) -> Option<&str> {
        let has = |b: &str| self.refs.contains_key(&refs::branch_ref(b));
        self.head
            .as_deref()
            .and_then(|h| h.strip_prefix(HEADS_PREFIX))
            .filter(|b| has(*b))
            .or_else(|| ["main", "master"].into_iter().find(|b| has(*b)))
            .or_else(|| self.branches().next().map(|(b, _)| b))
    }
}

/// A source of refs and objects.
pub trait Transport {
    /// Lists the refs the remote offers.
    fn advertised_refs(&self) -> Result<AdvertisedRefs>;

    /// Copies every object reachable from `wants` into `into`.
    ///
    /// Returns the number of objects copied.
    fn fetch(&self, wants: &[Oid], into: &ObjectDatabase) -> Result<usize>;
}

/// A classified remote location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteUrl {
    /// A path on this machine, given bare or as `file://`.
    Local(PathBuf),
    /// `ssh://[user@]host[:port]/path` or scp-like `[user@]host:path`.
    Ssh {
        user: Option<String>,
        host: String,
        port: Option<u16>,
        path: String,
    },
    /// `http://` or `https://`.
    Http(String),
    /// `git://`.
    Git(String),
}

impl RemoteUrl {
    /// Classifies a clone URL.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Transport("empty remote url".to_string()));
        }

        if let Some(path) = url.strip_prefix("file://") {
            return Ok(RemoteUrl::Local(PathBuf::from(path)));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(RemoteUrl::Http(url.to_string()));
        }
        if url.starts_with("git://") {
            return Ok(RemoteUrl::Git(url.to_string()));
        }
        if let Some(rest) = url
            .strip_prefix("ssh://")
            .or_else(|| url.strip_prefix("git+ssh://"))
        {
            return Self::parse_ssh(url, rest);
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(Error::Transport(format!("unsupported url scheme: {}", scheme)));
        }

        // scp-like syntax has a colon before the first slash; a single
        // letter before it is a drive letter instead.
        if let Some(colon) = url.find(':') {
            let before = &url[..colon];
            if !before.contains('/') && before.len() > 1 {
                let (user, host) = split_user(before);
                if host.is_empty() || url.len() == colon + 1 {
                    return Err(Error::Transport(format!("invalid scp-like url: {}", url)));
                }
                return Ok(RemoteUrl::Ssh {
                    user,
                    host: host.to_string(),
                    port: None,
                    path: url[colon + 1..].to_string(),
                });
            }
        }

        Ok(RemoteUrl::Local(PathBuf::from(url)))
    }

    fn parse_ssh(url: &str, rest: &str) -> Result<Self> {
        let invalid = || Error::Transport(format!("invalid ssh url: {}", url));
        let (authority, path) = rest.split_once('/').ok_or_else(invalid)?;
        let (user, host_port) = split_user(authority);
        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port.parse::<u16>().map_err(|_| invalid())?)),
            None => (host_port, None),
        };
        if host.is_empty() || path.is_empty() {
            return Err(invalid());
        }
        Ok(RemoteUrl::Ssh {
            user,
            host: host.to_string(),
            port,
            path: format!("/{}", path),
        })
    }

    /// Returns true for paths on this machine.
    pub fn is_local(&self) -> bool {
        matches!(self, RemoteUrl::Local(_))
    }

    /// Returns true for SSH remotes.
    pub fn is_ssh(&self) -> bool {
        matches!(self, RemoteUrl::Ssh { .. })
    }
}

fn split_user(authority: &str) -> (Option<String>, &str) {
    match authority.rsplit_once('@') {
        Some((user, host)) => (Some(user.to_string()), host),
        None => (None, authority),
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteUrl::Local(path) => write!(f, "{}", path.display()),
            RemoteUrl::Ssh {
                user,
                host,
                port,
                path,
            } => {
                f.write_str("ssh://")?;
                if let Some(user) = user {
                    write!(f, "{}@", user)?;
                }
                f.write_str(host)?;
                if let Some(port) = port {
                    write!(f, ":{}", port)?;
                }
                if !path.starts_with('/') {
                    f.write_str("/")?;
                }
                f.write_str(path)
            }
            RemoteUrl::Http(url) | RemoteUrl::Git(url) => f.write_str(url),
        }
    }
}

/// Clones what `transport` offers into a new repository at `dest`.
///
/// Remote branches land under `refs/remotes/origin/`, tags under
/// `refs/tags/`, and `branch` (or the remote's default branch) becomes a
/// local tracking branch that is checked out. `dest` is left as created on
/// failure; callers own cleanup.
pub fn clone_repository(
    transport: &dyn Transport,
    url: &str,
    dest: &Path,
    branch: Option<&str>,
) -> Result<Repository> {
    let advertised = transport.advertised_refs()?;

    let selected = match branch {
        Some(requested) => {
            let name = requested.strip_prefix(HEADS_PREFIX).unwrap_or(requested);
            if !advertised.refs.contains_key(&refs::branch_ref(name)) {
                return Err(Error::RefNotFound(refs::branch_ref(name)));
            }
            Some(name.to_string())
        }
        None => advertised.default_branch().map(str::to_string),
    };
    let initial = selected.clone().unwrap_or_else(|| {
        advertised
            .head
            .as_deref()
            .and_then(|h| h.strip_prefix(HEADS_PREFIX))
            .unwrap_or("main")
            .to_string()
    });

    let repo = Repository::init(dest, false, &initial)?;

    let wants: Vec<Oid> = advertised
        .branches()
        .chain(advertised.tags())
        .map(|(_, oid)| *oid)
        .collect();
    let copied = transport.fetch(&wants, repo.objects())?;
    debug!(objects = copied, "fetched objects");

    for (name, oid) in advertised.branches() {
        repo.refs()
            .set_direct(&format!("{}{}/{}", REMOTES_PREFIX, ORIGIN, name), oid)?;
    }
    for (name, oid) in advertised.tags() {
        repo.refs().set_direct(&refs::tag_ref(name), oid)?;
    }
    if let Some(remote_head) = advertised.default_branch() {
        repo.refs().set_symbolic(
            &format!("{}{}/{}", REMOTES_PREFIX, ORIGIN, HEAD),
            &format!("{}{}/{}", REMOTES_PREFIX, ORIGIN, remote_head),
        )?;
    }

    let mut config = repo.config()?;
    config.set("remote", ORIGIN, "url", url);
    config.set(
        "remote",
        ORIGIN,
        "fetch",
        &format!("+{}*:{}{}/*", HEADS_PREFIX, REMOTES_PREFIX, ORIGIN),
    );

    if let Some(name) = &selected {
        let tip = advertised.refs[&refs::branch_ref(name)];
        track(&mut config, ORIGIN, name);
        repo.save_config(&config)?;

        repo.refs().create(&refs::branch_ref(name), &tip)?;
        let files = repo.commit_files(&tip)?;
        worktree::migrate(&repo, &Default::default(), &files)?;
    } else {
        repo.save_config(&config)?;
    }

    info!(url, branch = selected.as_deref().unwrap_or("<none>"), "cloned repository");
    Ok(repo)
}

/// Records `branch.<name>.remote/merge` so the branch tracks `remote`.
pub fn track(config: &mut GitConfig, remote: &str, name: &str) {
    config.set("branch", name, "remote", remote);
    config.set("branch", name, "merge", &refs::branch_ref(name));
}

/// Walks objects reachable from `wants`, copying each one missing from
/// `into`. Objects already present are assumed complete and not descended.
pub(crate) fn copy_reachable(
    source: &ObjectDatabase,
    wants: &[Oid],
    into: &ObjectDatabase,
) -> Result<usize> {
    let mut stack: Vec<Oid> = wants.to_vec();
    let mut copied = 0;

    while let Some(oid) = stack.pop() {
        if !into.copy_from(source, &oid)? {
            continue;
        }
        copied += 1;

        let raw = source.read(&oid)?;
        match raw.object_type {
            ObjectType::Blob => {}
            ObjectType::Commit => {
                let commit = crate::objects::Commit::parse(oid, raw)?;
                stack.push(*commit.tree());
                stack.extend(commit.parents().iter().copied());
            }
            ObjectType::Tree => {
                let tree = crate::objects::Tree::parse(raw)?;
                stack.extend(
                    tree.entries()
                        .iter()
                        .filter(|e| e.mode() != crate::objects::FileMode::Submodule)
                        .map(|e| *e.oid()),
                );
            }
            ObjectType::Tag => {
                let tag = crate::objects::TagObject::parse(&oid, raw)?;
                stack.push(*tag.target());
            }
        }
    }
    Ok(copied)
}
