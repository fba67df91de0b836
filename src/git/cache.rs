//! Bounded object cache shared across scans on one repository handle.
//!
//! Git objects are content-addressed and immutable, so a cached entry never
//! goes stale; the cache is bounded only to cap memory growth. Eviction is
//! least-recently-used, tracked with a monotonic access counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use git2::Oid;
use parking_lot::RwLock;

use super::repository::{CommitInfo, TreeEntryInfo};

/// Default number of cached objects per repository handle.
pub const DEFAULT_CACHE_CAPACITY: usize = 8192;

/// A cached immutable object: commit metadata or a tree listing.
///
/// Blob contents are deliberately not cached; they are the only unbounded
/// payloads and are cheap to re-read from the object store.
#[derive(Clone)]
pub enum CachedObject {
    Commit(Arc<CommitInfo>),
    Tree(Arc<Vec<TreeEntryInfo>>),
}

struct Slot {
    object: CachedObject,
    last_access: AtomicU64,
}

/// LRU cache keyed by object id.
///
/// Lookups of present entries take the read lock only; the access stamp is
/// atomic so concurrent readers do not contend. Insertion and eviction take
/// the write lock.
pub struct ObjectCache {
    capacity: usize,
    tick: AtomicU64,
    entries: RwLock<HashMap<Oid, Slot>>,
}

impl ObjectCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &Oid) -> Option<CachedObject> {
        let entries = self.entries.read();
        let slot = entries.get(id)?;
        let stamp = self.tick.fetch_add(1, Ordering::Relaxed);
        slot.last_access.store(stamp, Ordering::Relaxed);
        Some(slot.object.clone())
    }

    pub fn insert(&self, id: Oid, object: CachedObject) {
        let stamp = self.tick.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity && !entries.contains_key(&id) {
            evict_oldest(&mut entries);
        }
        entries.insert(
            id,
            Slot {
                object,
                last_access: AtomicU64::new(stamp),
            },
        );
    }

    /// Drops an entry, used when a read of the underlying object failed and
    /// the cached copy can no longer be trusted.
    pub fn evict(&self, id: &Oid) {
        self.entries.write().remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn evict_oldest(entries: &mut HashMap<Oid, Slot>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, slot)| slot.last_access.load(Ordering::Relaxed))
        .map(|(id, _)| *id);
    if let Some(id) = oldest {
        entries.remove(&id);
    }
}
