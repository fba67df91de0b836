//! Ancestry walk over the commit graph.
//!
//! Explicit frontier walk rather than libgit2's revwalk: the frontier is a
//! max-heap ordered by (committer timestamp, id), so commits come out
//! reverse-chronologically with a deterministic tie-break (higher id
//! first), and a visited set deduplicates commits reachable from several
//! starting refs. Each scan builds a fresh walk; dropping it mid-iteration
//! releases all state.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use git2::Oid;

use crate::error::Result;

use super::repository::{CommitInfo, GitRepo};

#[derive(PartialEq, Eq)]
struct WalkEntry {
    committed_at: i64,
    id: Oid,
    /// Generation distance from the nearest starting tip, 1-based.
    depth: u32,
}

impl Ord for WalkEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.committed_at
            .cmp(&other.committed_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for WalkEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazy, restartable walk over commit ancestry.
pub struct AncestryWalk {
    repo: Arc<GitRepo>,
    frontier: BinaryHeap<WalkEntry>,
    seen: HashSet<Oid>,
    /// Parents beyond this generation distance are not expanded.
    depth_limit: Option<u32>,
}

impl AncestryWalk {
    /// Starts a walk from the given tips. Tips appearing more than once
    /// are walked once.
    pub fn new(repo: Arc<GitRepo>, starts: &[Oid], depth_limit: Option<u32>) -> Result<Self> {
        let mut walk = Self {
            repo,
            frontier: BinaryHeap::new(),
            seen: HashSet::new(),
            depth_limit,
        };
        for &id in starts {
            walk.push(id, 1)?;
        }
        Ok(walk)
    }

    fn push(&mut self, id: Oid, depth: u32) -> Result<()> {
        if !self.seen.insert(id) {
            return Ok(());
        }
        let info = self.repo.commit_info(id)?;
        self.frontier.push(WalkEntry {
            committed_at: info.committed_at,
            id,
            depth,
        });
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<Arc<CommitInfo>>> {
        let Some(entry) = self.frontier.pop() else {
            return Ok(None);
        };
        let info = self.repo.commit_info(entry.id)?;
        let expand = match self.depth_limit {
            Some(limit) => entry.depth < limit,
            None => true,
        };
        if expand {
            let parents = info.parents.clone();
            for parent in parents {
                self.push(parent, entry.depth + 1)?;
            }
        }
        Ok(Some(info))
    }
}

impl Iterator for AncestryWalk {
    type Item = Result<Arc<CommitInfo>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}
