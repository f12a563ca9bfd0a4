//! Rebuilding the index from blobs left by a previous process

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::blob::{BlobError, BlobInfo, BlobStorage};
use crate::error::{Result, StoreError};
use super::deletion_queue::{remove_tombstone, tombstoned_key};
use super::entry::{is_image_key, ordinal_from_key, Entry};
use super::{Index, RotatingStore};

impl RotatingStore {
    /// Open a store over a backend that may already hold images.
    ///
    /// Recovered blobs are ordered by modification time (ties broken by the
    /// ordinal in the key, then the key itself) and numbered from 1. The id
    /// counter starts above both that count and any ordinal found in a key,
    /// so new keys never collide with recovered ones.
    ///
    /// Blobs with a tombstone were evicted or cleared before the restart and
    /// are deleted again instead of being recovered.
    pub fn recover(blob: Arc<dyn BlobStorage>, capacity: usize) -> Result<Self> {
        let listed = blob.list().map_err(StoreError::StorageReadFailure)?;

        let tombstoned: HashSet<String> = listed
            .iter()
            .filter_map(|info| tombstoned_key(&info.key))
            .map(str::to_string)
            .collect();
        let highest_ordinal = listed
            .iter()
            .filter_map(|info| ordinal_from_key(tombstoned_key(&info.key).unwrap_or(&info.key)))
            .max()
            .unwrap_or(0);

        let mut orphans = Vec::new();
        let mut found: Vec<BlobInfo> = listed
            .into_iter()
            .filter(|info| {
                if !is_image_key(&info.key) {
                    debug!("Ignoring non-image blob {}", info.key);
                    return false;
                }
                if tombstoned.contains(&info.key) {
                    orphans.push(info.key.clone());
                    return false;
                }
                if info.size == 0 {
                    warn!("Skipping empty blob {}", info.key);
                    return false;
                }
                true
            })
            .collect();

        found.sort_by(|a, b| {
            let a_key = (a.modified.unwrap_or(DateTime::<Utc>::UNIX_EPOCH), ordinal_from_key(&a.key), &a.key);
            let b_key = (b.modified.unwrap_or(DateTime::<Utc>::UNIX_EPOCH), ordinal_from_key(&b.key), &b.key);
            a_key.cmp(&b_key)
        });

        let recovered = found.len() as u64;
        let next_id = recovered
            .max(highest_ordinal)
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted)?;

        let mut index = Index::new(next_id);
        for (info, id) in found.into_iter().zip(1u64..) {
            index.insert(Entry {
                id,
                created_at: info.modified.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                size_bytes: info.size,
                key: info.key,
            });
        }

        let store = Self::with_index(blob, capacity, index);
        store.purge_tombstoned(&tombstoned, orphans);

        let evicted = store.lock_index().evict_to(store.capacity);
        if !evicted.is_empty() {
            info!("Evicting {} recovered entries over capacity {:?}", evicted.len(), store.capacity);
            store.delete_blobs(evicted);
        }

        info!("Recovered {} entries, keeping {}", recovered, store.len());
        Ok(store)
    }

    /// Delete blobs left behind by deletes that never completed. Ones that
    /// still fail go back on the retry queue with their tombstone kept.
    fn purge_tombstoned(&self, tombstoned: &HashSet<String>, orphans: Vec<String>) {
        for key in tombstoned.iter().filter(|key| !orphans.contains(key)) {
            remove_tombstone(self.blob.as_ref(), key);
        }
        if orphans.is_empty() {
            return;
        }

        info!("Deleting {} blobs removed before the last shutdown", orphans.len());
        for key in orphans {
            match self.blob.delete(&key) {
                Ok(()) | Err(BlobError::NotFound(_)) => remove_tombstone(self.blob.as_ref(), &key),
                Err(e) => {
                    warn!("{}; queued {} for retry", StoreError::StorageDeleteFailure(e), key);
                    self.deletions.push(key);
                }
            }
        }
    }
}
