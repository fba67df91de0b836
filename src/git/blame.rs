//! Per-line blame: which commit last modified each line of a file.
//!
//! Classic backward walk. Lines of the file at the target commit flow
//! through ancestry as long as a parent still has them; a line no parent
//! has is attributed to the commit under inspection. Line identity across
//! a commit/parent pair comes from the hunk boundaries of a zero-context
//! diff confined to the path: lines outside every hunk map by offset,
//! lines inside a hunk's new range were (re)introduced by the commit.
//!
//! Merge commits follow the first parent; a line the first parent lacks
//! falls back to the remaining parents in declared order. Renames are not
//! tracked, so history ends where the path first appears.
//!
//! Cost grows with file length times the number of ancestors that touched
//! the path - a known boundary of this implementation; there is no
//! caching of intermediate diffs across queries.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use git2::Oid;

use crate::error::Result;

use super::repository::{EntryKind, GitRepo, HunkSpan};

/// One attributed line of the target file.
#[derive(Debug, Clone)]
pub struct BlameLine {
    /// 1-based line number in the file at the target commit.
    pub line_no: u32,
    /// The commit that introduced this line's current content.
    pub commit_id: Oid,
    pub content: String,
}

#[derive(PartialEq, Eq)]
struct QueueEntry {
    committed_at: i64,
    id: Oid,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.committed_at
            .cmp(&other.committed_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How lines of a commit's version of the path map into one parent's
/// version.
enum LineMap {
    /// Identical blobs: every line maps to itself.
    Identity,
    /// Path absent in the parent: nothing maps.
    AllNew,
    /// Changed: map by hunk offsets.
    Hunks(Vec<HunkSpan>),
}

impl LineMap {
    /// Maps a 1-based line number in the new version to the old version,
    /// or `None` if the commit introduced it.
    fn map_line(&self, n: u32) -> Option<u32> {
        match self {
            LineMap::Identity => Some(n),
            LineMap::AllNew => None,
            LineMap::Hunks(hunks) => map_through_hunks(hunks, n),
        }
    }
}

fn map_through_hunks(hunks: &[HunkSpan], n: u32) -> Option<u32> {
    let mut delta: i64 = 0;
    for h in hunks {
        if h.new_lines == 0 {
            // Pure deletion: occupies no new lines, shifts everything after.
            if n <= h.new_start {
                break;
            }
        } else {
            if n < h.new_start {
                break;
            }
            if n < h.new_start + h.new_lines {
                return None;
            }
        }
        delta += i64::from(h.new_lines) - i64::from(h.old_lines);
    }
    Some((i64::from(n) - delta) as u32)
}

/// Blames `path` as of `at_commit`. Returns no rows when the path does
/// not name a blob there.
pub fn blame_file(repo: &GitRepo, at_commit: Oid, path: &str) -> Result<Vec<BlameLine>> {
    let Some(entry) = repo.path_entry_in_commit(at_commit, path)? else {
        return Ok(Vec::new());
    };
    if entry.kind != EntryKind::Blob {
        return Ok(Vec::new());
    }
    let lines = split_lines(&repo.read_blob(entry.id)?);
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let mut walker = BlameWalk::new(repo, path);
    // (line number in that commit's version, index into `lines`)
    let initial: Vec<(u32, usize)> = (0..lines.len()).map(|i| (i as u32 + 1, i)).collect();
    walker.enqueue(at_commit, initial)?;

    let mut rows = Vec::with_capacity(lines.len());
    while let Some((commit, pending)) = walker.pop()? {
        for (target_idx, _) in walker.settle(commit, pending)? {
            rows.push(BlameLine {
                line_no: target_idx as u32 + 1,
                commit_id: commit,
                content: lines[target_idx].clone(),
            });
        }
    }

    rows.sort_by_key(|l| l.line_no);
    Ok(rows)
}

struct BlameWalk<'a> {
    repo: &'a GitRepo,
    path: &'a str,
    pending: HashMap<Oid, Vec<(u32, usize)>>,
    heap: BinaryHeap<QueueEntry>,
    queued: HashSet<Oid>,
    path_blobs: HashMap<Oid, Option<Oid>>,
    line_maps: HashMap<(Oid, Oid), LineMap>,
}

impl<'a> BlameWalk<'a> {
    fn new(repo: &'a GitRepo, path: &'a str) -> Self {
        Self {
            repo,
            path,
            pending: HashMap::new(),
            heap: BinaryHeap::new(),
            queued: HashSet::new(),
            path_blobs: HashMap::new(),
            line_maps: HashMap::new(),
        }
    }

    fn enqueue(&mut self, commit: Oid, lines: Vec<(u32, usize)>) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        self.pending.entry(commit).or_default().extend(lines);
        if self.queued.insert(commit) {
            let info = self.repo.commit_info(commit)?;
            self.heap.push(QueueEntry {
                committed_at: info.committed_at,
                id: commit,
            });
        }
        Ok(())
    }

    /// Pops the newest commit that still has unattributed lines.
    fn pop(&mut self) -> Result<Option<(Oid, Vec<(u32, usize)>)>> {
        while let Some(entry) = self.heap.pop() {
            self.queued.remove(&entry.id);
            if let Some(lines) = self.pending.remove(&entry.id) {
                return Ok(Some((entry.id, lines)));
            }
        }
        Ok(None)
    }

    /// Flows lines into the commit's parents where possible; returns the
    /// (target index, line number) pairs this commit is charged with.
    fn settle(
        &mut self,
        commit: Oid,
        pending: Vec<(u32, usize)>,
    ) -> Result<Vec<(usize, u32)>> {
        let info = self.repo.commit_info(commit)?;
        let parents = info.parents.clone();
        if parents.is_empty() {
            return Ok(pending.into_iter().map(|(n, idx)| (idx, n)).collect());
        }

        let mut attributed = Vec::new();
        let mut flowed: HashMap<Oid, Vec<(u32, usize)>> = HashMap::new();
        for (line, target_idx) in pending {
            let mut assigned = false;
            for &parent in &parents {
                let mapped = self.line_map(commit, parent)?.map_line(line);
                if let Some(parent_line) = mapped {
                    flowed.entry(parent).or_default().push((parent_line, target_idx));
                    assigned = true;
                    break;
                }
            }
            if !assigned {
                attributed.push((target_idx, line));
            }
        }
        for (parent, lines) in flowed {
            self.enqueue(parent, lines)?;
        }
        Ok(attributed)
    }

    fn path_blob(&mut self, commit: Oid) -> Result<Option<Oid>> {
        if let Some(cached) = self.path_blobs.get(&commit) {
            return Ok(*cached);
        }
        let blob = self
            .repo
            .path_entry_in_commit(commit, self.path)?
            .filter(|e| e.kind == EntryKind::Blob)
            .map(|e| e.id);
        self.path_blobs.insert(commit, blob);
        Ok(blob)
    }

    fn line_map(&mut self, commit: Oid, parent: Oid) -> Result<&LineMap> {
        let key = (commit, parent);
        if !self.line_maps.contains_key(&key) {
            let map = self.compute_line_map(commit, parent)?;
            self.line_maps.insert(key, map);
        }
        Ok(&self.line_maps[&key])
    }

    fn compute_line_map(&mut self, commit: Oid, parent: Oid) -> Result<LineMap> {
        let blob_c = self.path_blob(commit)?;
        let blob_p = self.path_blob(parent)?;
        match (blob_c, blob_p) {
            (_, None) => Ok(LineMap::AllNew),
            (Some(c), Some(p)) if c == p => Ok(LineMap::Identity),
            _ => {
                let commit_tree = self.repo.commit_info(commit)?.tree_id;
                let parent_tree = self.repo.commit_info(parent)?.tree_id;
                let hunks =
                    self.repo
                        .diff_path_hunks(Some(parent_tree), commit_tree, self.path)?;
                Ok(LineMap::Hunks(hunks))
            }
        }
    }
}

fn split_lines(content: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(content);
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}
