//! Read-only access to the Git object store and ref database.

pub mod blame;
pub mod cache;
pub mod repository;
pub mod tree;
pub mod walk;

#[cfg(test)]
pub(crate) mod testutil;

pub use blame::{blame_file, BlameLine};
pub use cache::{ObjectCache, DEFAULT_CACHE_CAPACITY};
pub use repository::{
    CommitInfo, EntryKind, GitRepo, ReaderStatsSnapshot, RefInfo, RefKind, TreeEntryInfo,
};
pub use tree::{FileRow, TreeFiles};
pub use walk::AncestryWalk;
