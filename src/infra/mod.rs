//! Infrastructure utilities (compression, filesystem, locking).

pub mod compression;
pub mod fs;

pub use compression::{compress, decompress, inflate_prefix};
pub use fs::{read_file, remove_empty_parents, remove_tree, write_file_atomic, LockFile};
