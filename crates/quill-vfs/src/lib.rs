//! Virtual file system layer for Quill.
//!
//! The VFS is responsible for:
//! - Storing one project's files and directories in an in-memory tree that
//!   answers filesystem-shaped queries (existence, listing, read).
//! - Tracking per-file versions so the engine can detect staleness without
//!   re-reading content.
//! - Representing "known to exist but not loaded" files, which is what drives
//!   the lazy-load path.
//! - Abstracting the host-side backing store the files ultimately come from.

mod path;
mod store;
mod tree;

pub use path::{basename, canonical, dirname, extension, is_root, normalize, segments};
pub use store::{BackingStore, BoxFuture, MemoryStore, StoreError, StoreFile};
pub use tree::{FileRead, FileTree, TreeError};
