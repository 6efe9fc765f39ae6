//! Git object types (tree, commit, tag) and the loose object database.

pub mod commit;
pub mod oid;
pub mod store;
pub mod tag;
pub mod tree;

pub use commit::{format_commit, Commit, Signature};
pub use oid::Oid;
pub use store::{ObjectDatabase, ObjectHeader, ObjectType, RawObject};
pub use tag::TagObject;
pub use tree::{FileMode, FlatEntry, FlatTree, Tree, TreeEntry};
