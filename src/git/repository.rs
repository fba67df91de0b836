//! Git repository wrapper: the read-only object access layer.
//!
//! `GitRepo` owns the libgit2 handle behind a mutex (scans run on whichever
//! thread drives the SQLite cursor) together with the shared object cache
//! and read counters. All access is read-only; refs are re-resolved on
//! every call so repository updates between queries are visible, while
//! immutable objects (commits, trees) are served from the cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use git2::{ErrorCode, ObjectType, Oid, Repository};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::cache::{CachedObject, ObjectCache, DEFAULT_CACHE_CAPACITY};

/// Commit metadata, decoded once and cached by id.
///
/// Author and committer fields are `None` when the underlying signature is
/// missing or not valid UTF-8; they surface as SQL NULL, never as a
/// placeholder string.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: Oid,
    pub parents: Vec<Oid>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    /// Author timestamp, epoch seconds.
    pub authored_at: i64,
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    /// Committer timestamp, epoch seconds. Ancestry ordering uses this.
    pub committed_at: i64,
    pub summary: Option<String>,
    pub message: Option<String>,
    pub tree_id: Oid,
}

/// One entry of a tree listing.
#[derive(Debug, Clone)]
pub struct TreeEntryInfo {
    pub name: String,
    /// Raw Git filemode, e.g. 0o100644.
    pub mode: i32,
    pub id: Oid,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointer (gitlink).
    Commit,
    Other,
}

/// A named ref and the commit it points at.
#[derive(Debug, Clone)]
pub struct RefInfo {
    /// Full ref name, e.g. `refs/heads/main`.
    pub name: String,
    /// Shorthand, e.g. `main` or `origin/main`.
    pub short_name: String,
    pub kind: RefKind,
    /// Peeled commit id; `None` when the ref does not point at a commit.
    pub target: Option<Oid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Remote,
    Tag,
    Note,
    Other,
}

impl RefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RefKind::Branch => "branch",
            RefKind::Remote => "remote",
            RefKind::Tag => "tag",
            RefKind::Note => "note",
            RefKind::Other => "other",
        }
    }
}

/// Counters over actual object-store reads (cache misses only).
///
/// Tests use these to verify that predicate pushdown avoids walking
/// unrelated history.
#[derive(Default)]
pub struct ReaderStats {
    commits: AtomicU64,
    trees: AtomicU64,
    blobs: AtomicU64,
    refs: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStatsSnapshot {
    pub commits: u64,
    pub trees: u64,
    pub blobs: u64,
    pub refs: u64,
}

impl ReaderStats {
    fn snapshot(&self) -> ReaderStatsSnapshot {
        ReaderStatsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            trees: self.trees.load(Ordering::Relaxed),
            blobs: self.blobs.load(Ordering::Relaxed),
            refs: self.refs.load(Ordering::Relaxed),
        }
    }
}

/// Read-only handle to an opened Git repository.
pub struct GitRepo {
    repo: Mutex<Repository>,
    cache: ObjectCache,
    stats: ReaderStats,
    path: PathBuf,
}

impl GitRepo {
    /// Opens the repository at `path`, discovering the repository root from
    /// nested directories.
    ///
    /// # Errors
    ///
    /// `Error::RepositoryNotFound` if no Git repository is found there.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let repo = Repository::discover(path_ref).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::RepositoryNotFound(path_ref.display().to_string())
            } else {
                Error::Git(e)
            }
        })?;

        let display_path = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo.path().to_path_buf());
        debug!(path = %display_path.display(), "opened repository");

        Ok(Self {
            repo: Mutex::new(repo),
            cache: ObjectCache::new(DEFAULT_CACHE_CAPACITY),
            stats: ReaderStats::default(),
            path: display_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> ReaderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolves a ref name, shorthand, or revspec to a commit id.
    ///
    /// # Errors
    ///
    /// `Error::RefNotFound` if the name does not resolve to a commit.
    pub fn resolve_ref(&self, name: &str) -> Result<Oid> {
        let repo = self.repo.lock();
        let object = repo.revparse_single(name).map_err(|e| {
            if e.code() == ErrorCode::NotFound || e.code() == ErrorCode::InvalidSpec {
                Error::RefNotFound(name.to_string())
            } else {
                Error::Git(e)
            }
        })?;
        let commit = object
            .peel(ObjectType::Commit)
            .map_err(|_| Error::RefNotFound(name.to_string()))?;
        Ok(commit.id())
    }

    /// Lists all refs with their peeled commit targets.
    pub fn list_refs(&self) -> Result<Vec<RefInfo>> {
        let repo = self.repo.lock();
        let mut refs = Vec::new();
        for reference in repo.references()? {
            let reference = reference?;
            let Some(name) = reference.name() else {
                continue;
            };
            let kind = if reference.is_branch() {
                RefKind::Branch
            } else if reference.is_remote() {
                RefKind::Remote
            } else if reference.is_tag() {
                RefKind::Tag
            } else if reference.is_note() {
                RefKind::Note
            } else {
                RefKind::Other
            };
            let target = reference.peel_to_commit().ok().map(|c| c.id());
            refs.push(RefInfo {
                name: name.to_string(),
                short_name: reference.shorthand().unwrap_or(name).to_string(),
                kind,
                target,
            });
        }
        self.stats.refs.fetch_add(1, Ordering::Relaxed);
        Ok(refs)
    }

    /// The commit HEAD points at, or `None` on an unborn branch.
    pub fn head_id(&self) -> Result<Option<Oid>> {
        let repo = self.repo.lock();
        let result = match repo.head() {
            Ok(head) => Ok(head.peel_to_commit().ok().map(|c| c.id())),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(None)
            }
            Err(e) => Err(Error::Git(e)),
        };
        result
    }

    /// Starting points for an unqualified ancestry walk: every ref that
    /// peels to a commit, plus HEAD (covers detached-head repositories).
    pub fn tip_ids(&self) -> Result<Vec<Oid>> {
        let mut tips = Vec::new();
        for r in self.list_refs()? {
            if let Some(target) = r.target {
                if !tips.contains(&target) {
                    tips.push(target);
                }
            }
        }
        if let Some(head) = self.head_id()? {
            if !tips.contains(&head) {
                tips.push(head);
            }
        }
        Ok(tips)
    }

    /// Loads commit metadata, `Error::CorruptObject` on any read failure.
    ///
    /// Use this for ids produced by the walk itself, where a missing object
    /// means a broken store.
    pub fn commit_info(&self, id: Oid) -> Result<Arc<CommitInfo>> {
        self.try_commit_info(id)?.ok_or_else(|| Error::CorruptObject {
            id: id.to_string(),
            source: git2::Error::from_str("commit object missing"),
        })
    }

    /// Loads commit metadata, `Ok(None)` when the id does not name a
    /// commit. Use this for user-supplied ids from pushed predicates.
    pub fn try_commit_info(&self, id: Oid) -> Result<Option<Arc<CommitInfo>>> {
        if let Some(CachedObject::Commit(info)) = self.cache.get(&id) {
            return Ok(Some(info));
        }

        let repo = self.repo.lock();
        let commit = match repo.find_commit(id) {
            Ok(commit) => commit,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                self.cache.evict(&id);
                return Err(Error::CorruptObject {
                    id: id.to_string(),
                    source: e,
                });
            }
        };
        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        trace!(id = %id, "loaded commit");

        let author = commit.author();
        let committer = commit.committer();
        let info = Arc::new(CommitInfo {
            id,
            parents: commit.parent_ids().collect(),
            author_name: author.name().map(str::to_string),
            author_email: author.email().map(str::to_string),
            authored_at: author.when().seconds(),
            committer_name: committer.name().map(str::to_string),
            committer_email: committer.email().map(str::to_string),
            committed_at: commit.time().seconds(),
            summary: commit.summary().map(str::to_string),
            message: commit.message().map(str::to_string),
            tree_id: commit.tree_id(),
        });
        drop(author);
        drop(committer);
        drop(commit);
        drop(repo);

        self.cache.insert(id, CachedObject::Commit(info.clone()));
        Ok(Some(info))
    }

    /// Lists a tree's entries in stored order, via the cache.
    pub fn list_tree(&self, id: Oid) -> Result<Arc<Vec<TreeEntryInfo>>> {
        if let Some(CachedObject::Tree(entries)) = self.cache.get(&id) {
            return Ok(entries);
        }

        let repo = self.repo.lock();
        let tree = repo.find_tree(id).map_err(|e| {
            self.cache.evict(&id);
            Error::CorruptObject {
                id: id.to_string(),
                source: e,
            }
        })?;
        self.stats.trees.fetch_add(1, Ordering::Relaxed);

        let entries: Vec<TreeEntryInfo> = tree
            .iter()
            .filter_map(|entry| {
                let name = entry.name()?.to_string();
                let kind = match entry.kind() {
                    Some(ObjectType::Blob) => EntryKind::Blob,
                    Some(ObjectType::Tree) => EntryKind::Tree,
                    Some(ObjectType::Commit) => EntryKind::Commit,
                    _ => EntryKind::Other,
                };
                Some(TreeEntryInfo {
                    name,
                    mode: entry.filemode(),
                    id: entry.id(),
                    kind,
                })
            })
            .collect();
        drop(tree);
        drop(repo);

        let entries = Arc::new(entries);
        self.cache.insert(id, CachedObject::Tree(entries.clone()));
        Ok(entries)
    }

    /// Reads a blob's full contents as owned bytes.
    pub fn read_blob(&self, id: Oid) -> Result<Vec<u8>> {
        let repo = self.repo.lock();
        let blob = repo.find_blob(id).map_err(|e| Error::CorruptObject {
            id: id.to_string(),
            source: e,
        })?;
        self.stats.blobs.fetch_add(1, Ordering::Relaxed);
        Ok(blob.content().to_vec())
    }

    /// A blob's byte length without copying its content.
    pub fn blob_size(&self, id: Oid) -> Result<u64> {
        let repo = self.repo.lock();
        let odb = repo.odb()?;
        let (size, _) = odb.read_header(id).map_err(|e| Error::CorruptObject {
            id: id.to_string(),
            source: e,
        })?;
        self.stats.blobs.fetch_add(1, Ordering::Relaxed);
        Ok(size as u64)
    }

    /// Finds the tree entry at a slash-separated `path` inside a commit's
    /// tree, descending through the cached tree listings.
    pub fn path_entry_in_commit(
        &self,
        commit_id: Oid,
        path: &str,
    ) -> Result<Option<TreeEntryInfo>> {
        let Some(info) = self.try_commit_info(commit_id)? else {
            return Ok(None);
        };
        self.path_entry_in_tree(info.tree_id, path)
    }

    /// Same lookup, starting from a tree id.
    pub fn path_entry_in_tree(&self, tree_id: Oid, path: &str) -> Result<Option<TreeEntryInfo>> {
        let mut current = tree_id;
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        if segments.peek().is_none() {
            return Ok(None);
        }
        while let Some(segment) = segments.next() {
            let entries = self.list_tree(current)?;
            let Some(entry) = entries.iter().find(|e| e.name == segment) else {
                return Ok(None);
            };
            if segments.peek().is_none() {
                return Ok(Some(entry.clone()));
            }
            if entry.kind != EntryKind::Tree {
                return Ok(None);
            }
            current = entry.id;
        }
        Ok(None)
    }

    /// Hunk spans of the diff for a single path between two trees, with
    /// zero context, in file order. Renames are not tracked.
    pub fn diff_path_hunks(
        &self,
        old_tree: Option<Oid>,
        new_tree: Oid,
        path: &str,
    ) -> Result<Vec<HunkSpan>> {
        let repo = self.repo.lock();
        let new = repo.find_tree(new_tree)?;
        let old = old_tree.map(|id| repo.find_tree(id)).transpose()?;

        let mut opts = git2::DiffOptions::new();
        opts.pathspec(path);
        opts.context_lines(0);
        let diff = repo.diff_tree_to_tree(old.as_ref(), Some(&new), Some(&mut opts))?;

        let mut hunks = Vec::new();
        diff.foreach(
            &mut |_, _| true,
            None,
            Some(&mut |_, hunk| {
                hunks.push(HunkSpan {
                    old_start: hunk.old_start(),
                    old_lines: hunk.old_lines(),
                    new_start: hunk.new_start(),
                    new_lines: hunk.new_lines(),
                });
                true
            }),
            None,
        )?;
        Ok(hunks)
    }
}

/// One hunk of a unified diff, line spans only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkSpan {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
}
