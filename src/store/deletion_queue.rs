//! Blob deletes that failed during eviction or clear, kept for retry.
//!
//! The index drops an entry before its blob is deleted, so a failed delete
//! leaves an orphaned blob rather than a listed entry with missing content.
//! Orphans are re-attempted here until they succeed or run out of attempts.
//!
//! Every queued key also gets a tombstone blob (`<key>.tombstone`) so a
//! restart does not bring the orphan back as a live entry. The tombstone is
//! removed once the blob itself is gone.

use crate::blob::{BlobError, BlobStorage};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use log::{debug, error, info, warn};

const TOMBSTONE_SUFFIX: &str = ".tombstone";

/// Marker key recording that `key` was removed from the index
pub fn tombstone_key(key: &str) -> String {
    format!("{}{}", key, TOMBSTONE_SUFFIX)
}

/// The key a tombstone marks, if `key` is a tombstone
pub fn tombstoned_key(key: &str) -> Option<&str> {
    key.strip_suffix(TOMBSTONE_SUFFIX).filter(|k| !k.is_empty())
}

/// Drop the tombstone for a key whose blob is confirmed gone
pub fn remove_tombstone(blob: &dyn BlobStorage, key: &str) {
    match blob.delete(&tombstone_key(key)) {
        Ok(()) | Err(BlobError::NotFound(_)) => {}
        // A stale tombstone without its blob is swept at the next recovery
        Err(e) => warn!("Failed to remove tombstone for {}: {}", key, e),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeletion {
    pub key: String,
    /// Delete attempts made so far, including the one that queued it
    pub attempts: u32,
}

/// Outcome of one retry pass
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RetryReport {
    pub deleted: usize,
    pub requeued: usize,
    pub abandoned: usize,
}

#[derive(Default)]
pub struct DeletionQueue {
    queue: Mutex<VecDeque<PendingDeletion>>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<PendingDeletion>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a key whose delete just failed, persisting its tombstone first
    pub fn defer(&self, blob: &dyn BlobStorage, key: String) {
        if let Err(e) = blob.write(&tombstone_key(&key), key.as_bytes()) {
            error!("Failed to write tombstone for {}; it may reappear after a restart: {}", key, e);
        }
        self.push(key);
    }

    /// Queue a key whose tombstone is already persisted
    pub fn push(&self, key: String) {
        self.pending().push_back(PendingDeletion { key, attempts: 1 });
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.pending().iter().map(|p| p.key.clone()).collect()
    }

    /// Re-issue every queued delete once. Keys that keep failing are dropped
    /// after `max_attempts` total attempts.
    pub fn retry(&self, blob: &dyn BlobStorage, max_attempts: u32) -> RetryReport {
        let batch: Vec<PendingDeletion> = self.pending().drain(..).collect();
        let mut report = RetryReport::default();
        let mut requeue = Vec::new();

        for mut pending in batch {
            match blob.delete(&pending.key) {
                Ok(()) | Err(BlobError::NotFound(_)) => {
                    debug!("Deferred delete of {} completed", pending.key);
                    remove_tombstone(blob, &pending.key);
                    report.deleted += 1;
                }
                Err(e) => {
                    pending.attempts += 1;
                    if pending.attempts >= max_attempts {
                        // The tombstone stays, so the next recovery retries it
                        error!("Giving up on deleting {} after {} attempts: {}",
                               pending.key, pending.attempts, e);
                        report.abandoned += 1;
                    } else {
                        warn!("Retry {} of deleting {} failed: {}", pending.attempts, pending.key, e);
                        requeue.push(pending);
                    }
                }
            }
        }

        report.requeued = requeue.len();
        if !requeue.is_empty() {
            self.pending().extend(requeue);
        }

        if report.deleted + report.abandoned > 0 {
            info!("Deletion retry pass: deleted={}, requeued={}, abandoned={}",
                  report.deleted, report.requeued, report.abandoned);
        }
        report
    }
}
