//! Lazy flattening of a tree into full file paths.
//!
//! Deep trees are walked with an explicit work-list of pending
//! (path-prefix, tree-id) pairs instead of recursion, so nesting depth
//! cannot overflow the stack. Entries within one tree keep Git's stored
//! order; subtrees are expanded depth-first.

use std::collections::VecDeque;
use std::sync::Arc;

use git2::Oid;

use crate::error::Result;

use super::repository::{EntryKind, GitRepo};

/// One file (or submodule pointer) reachable from a tree, with its full
/// slash-joined path.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub path: String,
    /// Raw Git filemode.
    pub mode: i32,
    pub blob_id: Oid,
    pub kind: EntryKind,
}

/// Iterator over all files under a root tree.
pub struct TreeFiles {
    repo: Arc<GitRepo>,
    pending: Vec<(String, Oid)>,
    ready: VecDeque<FileRow>,
}

impl TreeFiles {
    pub fn new(repo: Arc<GitRepo>, root: Oid) -> Self {
        Self {
            repo,
            pending: vec![(String::new(), root)],
            ready: VecDeque::new(),
        }
    }

    fn expand_next(&mut self) -> Result<bool> {
        let Some((prefix, tree_id)) = self.pending.pop() else {
            return Ok(false);
        };
        let entries = self.repo.list_tree(tree_id)?;
        let mut subtrees = Vec::new();
        for entry in entries.iter() {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };
            match entry.kind {
                EntryKind::Tree => subtrees.push((path, entry.id)),
                EntryKind::Blob | EntryKind::Commit => self.ready.push_back(FileRow {
                    path,
                    mode: entry.mode,
                    blob_id: entry.id,
                    kind: entry.kind,
                }),
                EntryKind::Other => {}
            }
        }
        // Reversed so the pop order matches the stored tree order.
        self.pending.extend(subtrees.into_iter().rev());
        Ok(true)
    }
}

impl Iterator for TreeFiles {
    type Item = Result<FileRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.ready.pop_front() {
                return Some(Ok(row));
            }
            match self.expand_next() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
