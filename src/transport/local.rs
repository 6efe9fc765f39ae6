//! Transport for repositories reachable through the filesystem.

use std::path::Path;

use tracing::warn;

use super::{copy_reachable, AdvertisedRefs, Transport};
use crate::error::Result;
use crate::objects::{ObjectDatabase, Oid};
use crate::refs::{HEADS_PREFIX, TAGS_PREFIX};
use crate::repository::Repository;

/// Reads refs and objects straight out of another repository on disk.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    source: Repository,
}

impl LocalTransport {
    /// Opens the repository at `path` (bare or not) as a clone source.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(LocalTransport {
            source: Repository::open(path)?,
        })
    }
}

impl Transport for LocalTransport {
    fn advertised_refs(&self) -> Result<AdvertisedRefs> {
        let store = self.source.refs();
        let mut advertised = AdvertisedRefs {
            head: store.head_target()?,
            ..Default::default()
        };
        for prefix in [HEADS_PREFIX, TAGS_PREFIX] {
            for (name, _) in store.list(prefix)? {
                match store.resolve_oid(&name) {
                    Ok(Some(oid)) => {
                        advertised.refs.insert(name, oid);
                    }
                    Ok(None) => {}
                    Err(err) => warn!(reference = %name, error = %err, "skipping unreadable ref"),
                }
            }
        }
        Ok(advertised)
    }

    fn fetch(&self, wants: &[Oid], into: &ObjectDatabase) -> Result<usize> {
        copy_reachable(self.source.objects(), wants, into)
    }
}
