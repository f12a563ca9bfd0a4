//! Bounded rotating media store
//!
//! Keeps captured images ordered by arrival and enforces a retention bound:
//! once more than `capacity` entries are live, the oldest are evicted.
//!
//! A single mutex guards the ordered index, the id counter and the set of
//! in-flight reservations. Blob I/O never runs under it. A put reserves an
//! id, writes its blob unlocked, then commits; commits happen in id order so
//! a listing never shows an id whose lower neighbours are still in flight.

pub mod deletion_queue;
pub mod entry;
mod recovery;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::blob::{BlobError, BlobStorage};
use crate::error::{Result, StoreError};
use self::deletion_queue::{DeletionQueue, RetryReport};
pub use self::entry::{key_for_id, Entry};

/// Diagnostics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub capacity: Option<usize>,
    pub total_bytes: u64,
    pub in_flight: usize,
    pub pending_deletions: usize,
}

#[derive(Default)]
struct Index {
    entries: BTreeMap<u64, Entry>,
    by_key: HashMap<String, u64>,
    next_id: u64,
    /// Ids reserved by puts whose blob write has not resolved yet
    pending: BTreeSet<u64>,
    last_created_at: Option<DateTime<Utc>>,
    shut_down: bool,
}

impl Index {
    fn new(next_id: u64) -> Self {
        Self { next_id, ..Self::default() }
    }

    fn insert(&mut self, entry: Entry) {
        self.last_created_at = Some(match self.last_created_at {
            Some(last) => last.max(entry.created_at),
            None => entry.created_at,
        });
        self.by_key.insert(entry.key.clone(), entry.id);
        self.entries.insert(entry.id, entry);
    }

    /// Current time, clamped so timestamps never go backwards across commits
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    fn evict_to(&mut self, capacity: Option<usize>) -> Vec<Entry> {
        let mut evicted = Vec::new();
        if let Some(capacity) = capacity {
            while self.entries.len() > capacity {
                match self.entries.pop_first() {
                    Some((_, entry)) => {
                        self.by_key.remove(&entry.key);
                        evicted.push(entry);
                    }
                    None => break,
                }
            }
        }
        evicted
    }

    fn take_all(&mut self) -> Vec<Entry> {
        self.by_key.clear();
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

pub struct RotatingStore {
    blob: Arc<dyn BlobStorage>,
    capacity: Option<usize>,
    index: Mutex<Index>,
    /// Signalled whenever a reservation resolves
    committed: Condvar,
    deletions: DeletionQueue,
}

/// An id held by an in-flight put. Dropping it without committing releases
/// the slot so later puts are not blocked behind it.
struct Reservation<'a> {
    store: &'a RotatingStore,
    id: u64,
    resolved: bool,
}

impl Reservation<'_> {
    /// Publish the entry once every lower reservation has resolved.
    ///
    /// There is no timeout here: a write that never returns holds back every
    /// later commit, though not their blob writes. Backends are expected to
    /// fail slow writes themselves rather than hang.
    fn commit(mut self, key: String, size_bytes: u64) -> (Entry, Vec<Entry>) {
        let store = self.store;
        let mut index = store.lock_index();
        while index.pending.first() != Some(&self.id) {
            index = store.committed.wait(index).unwrap_or_else(PoisonError::into_inner);
        }

        index.pending.remove(&self.id);
        let entry = Entry {
            id: self.id,
            key,
            created_at: index.next_timestamp(),
            size_bytes,
        };
        index.insert(entry.clone());
        let evicted = index.evict_to(store.capacity);
        self.resolved = true;
        drop(index);

        store.committed.notify_all();
        (entry, evicted)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        self.store.lock_index().pending.remove(&self.id);
        self.store.committed.notify_all();
        debug!("Released reservation for id {}", self.id);
    }
}

impl RotatingStore {
    /// Create an empty store. `capacity == 0` means unbounded.
    pub fn new(blob: Arc<dyn BlobStorage>, capacity: usize) -> Self {
        Self::with_index(blob, capacity, Index::new(1))
    }

    fn with_index(blob: Arc<dyn BlobStorage>, capacity: usize, index: Index) -> Self {
        Self {
            blob,
            capacity: (capacity > 0).then_some(capacity),
            index: Mutex::new(index),
            committed: Condvar::new(),
            deletions: DeletionQueue::new(),
        }
    }

    fn lock_index(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn reserve(&self) -> Result<Reservation<'_>> {
        let mut index = self.lock_index();
        if index.shut_down {
            return Err(StoreError::ShutDown);
        }
        let id = index.next_id;
        index.next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        index.pending.insert(id);
        Ok(Reservation { store: self, id, resolved: false })
    }

    /// Persist a new image and return its entry. May evict the oldest
    /// entries when the store is over capacity afterwards.
    pub fn put(&self, payload: &[u8]) -> Result<Entry> {
        if payload.is_empty() {
            return Err(StoreError::InvalidInput("empty payload".to_string()));
        }

        let reservation = self.reserve()?;
        let key = key_for_id(reservation.id);

        if let Err(e) = self.blob.write(&key, payload) {
            error!("Failed to persist {} ({} bytes): {}", key, payload.len(), e);
            return Err(StoreError::StorageWriteFailure(e));
        }

        let (entry, evicted) = reservation.commit(key, payload.len() as u64);
        info!("Stored {} ({} bytes)", entry.key, entry.size_bytes);

        if !evicted.is_empty() {
            debug!("Evicting {} entries over capacity {:?}", evicted.len(), self.capacity);
            self.delete_blobs(evicted);
        }
        Ok(entry)
    }

    /// Point-in-time snapshot of live entries, oldest first
    pub fn list(&self) -> Vec<Entry> {
        self.lock_index().entries.values().cloned().collect()
    }

    /// The newest `n` entries, oldest first
    pub fn latest(&self, n: usize) -> Vec<Entry> {
        let mut snapshot = self.list();
        let skip = snapshot.len().saturating_sub(n);
        snapshot.drain(..skip);
        snapshot
    }

    pub fn len(&self) -> usize {
        self.lock_index().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_index().entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Entry> {
        let index = self.lock_index();
        index.by_key.get(key).and_then(|id| index.entries.get(id)).cloned()
    }

    /// Fetch a live entry together with its content
    pub fn read(&self, key: &str) -> Result<(Entry, Bytes)> {
        let entry = self
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        match self.blob.read(&entry.key) {
            Ok(data) => Ok((entry, data)),
            // Evicted or cleared between the lookup and the read
            Err(BlobError::NotFound(_)) => Err(StoreError::NotFound(key.to_string())),
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                Err(StoreError::StorageReadFailure(e))
            }
        }
    }

    /// Remove every entry and its blob, returning how many were removed.
    /// Puts still writing when the index is emptied commit afterwards.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.lock_index().take_all();
        let count = removed.len();
        self.delete_blobs(removed);
        info!("Cleared {} entries", count);
        Ok(count)
    }

    /// Stop accepting puts and wait up to `timeout` for in-flight ones to
    /// finish. Returns false if some were still writing when time ran out.
    /// Listing, reading and clearing keep working.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut index = self.lock_index();
        index.shut_down = true;
        while !index.pending.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Store shut down with {} puts still in flight", index.pending.len());
                return false;
            }
            index = self
                .committed
                .wait_timeout(index, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        info!("Store shut down with {} entries", index.entries.len());
        true
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock_index().shut_down
    }

    pub fn stats(&self) -> StoreStats {
        let index = self.lock_index();
        StoreStats {
            entries: index.entries.len(),
            capacity: self.capacity,
            total_bytes: index.entries.values().map(|e| e.size_bytes).sum(),
            in_flight: index.pending.len(),
            pending_deletions: self.deletions.len(),
        }
    }

    pub fn pending_deletions(&self) -> Vec<String> {
        self.deletions.keys()
    }

    /// Re-attempt blob deletes that failed during eviction or clear
    pub fn retry_pending_deletions(&self, max_attempts: u32) -> RetryReport {
        self.deletions.retry(self.blob.as_ref(), max_attempts)
    }

    /// Entries are already gone from the index; a failed delete leaves an
    /// orphaned blob that is queued for retry.
    fn delete_blobs(&self, entries: Vec<Entry>) {
        for entry in entries {
            match self.blob.delete(&entry.key) {
                Ok(()) => debug!("Deleted blob {}", entry.key),
                Err(BlobError::NotFound(_)) => debug!("Blob {} already gone", entry.key),
                Err(e) => {
                    warn!("{}; queued {} for retry", StoreError::StorageDeleteFailure(e), entry.key);
                    self.deletions.defer(self.blob.as_ref(), entry.key);
                }
            }
        }
    }
}
