//! Mock implementation of BlobStorage for testing

use crate::blob::{BlobError, BlobInfo, BlobStorage};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use log::info;

/// In-memory blob store with switches for injecting backend failures
pub struct MockBlobStore {
    // key -> (data, modified)
    data: Mutex<HashMap<String, (Bytes, DateTime<Utc>)>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, (Bytes, DateTime<Utc>)>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the number of stored blobs
    pub fn object_count(&self) -> usize {
        self.objects().len()
    }

    /// Check if a blob exists
    pub fn object_exists(&self, key: &str) -> bool {
        self.objects().contains_key(key)
    }

    /// Seed a blob with an explicit modification time
    pub fn insert_with_modified(&self, key: &str, data: &[u8], modified: DateTime<Utc>) {
        self.objects().insert(key.to_string(), (Bytes::copy_from_slice(data), modified));
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn injected(op: &str, key: &str) -> BlobError {
        BlobError::Io(io::Error::other(format!("mock {} failure for {}", op, key)))
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStorage for MockBlobStore {
    fn write(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write", key));
        }
        self.insert_with_modified(key, data, Utc::now());
        info!("Mock: Wrote {} bytes under {}", data.len(), key);
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Bytes, BlobError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("read", key));
        }
        self.objects()
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete", key));
        }
        match self.objects().remove(key) {
            Some(_) => {
                info!("Mock: Deleted {}", key);
                Ok(())
            }
            None => Err(BlobError::NotFound(key.to_string())),
        }
    }

    fn list(&self) -> Result<Vec<BlobInfo>, BlobError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("list", "*"));
        }
        Ok(self
            .objects()
            .iter()
            .map(|(key, (data, modified))| BlobInfo {
                key: key.clone(),
                size: data.len() as u64,
                modified: Some(*modified),
            })
            .collect())
    }
}
