//! Repository management: lifecycle, branches, tags and content browsing.
//!
//! Every operation takes a repository name, opens a handle through
//! [`RepositoryStore`], does its work and releases the handle before
//! returning. Failures carry one [`ErrorKind`] from a closed set.
//!
//! ```no_run
//! use repokeeper::manager::RepositoryStore;
//!
//! # fn main() -> Result<(), repokeeper::manager::ManagerError> {
//! let store = RepositoryStore::new("/srv/repos");
//! store.create("billing", false)?;
//! for branch in store.branches().list("billing", false)? {
//!     println!("{} current={}", branch.name, branch.current);
//! }
//! # Ok(())
//! # }
//! ```

pub mod branches;
pub mod browser;
pub mod error;
pub mod model;
pub mod resolver;
pub mod store;
pub mod tags;

pub use branches::{map_merge_status, BranchManager};
pub use browser::{TreeBrowser, BINARY_SNIFF_LEN, MAX_CONTENT_SIZE};
pub use error::{ErrorKind, ManagerError, ManagerResult};
pub use model::{
    BranchInfo, FileContent, FileTreeNode, FileType, MergeOutcome, MergeOutcomeStatus,
    RepositoryInfo, TagInfo, TagTarget,
};
pub use resolver::{classify, display_name, RefNamespace, RefResolver};
pub use store::{RepositoryHandle, RepositoryStore};
pub use tags::TagManager;
