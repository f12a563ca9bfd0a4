//! Background deletion worker
//!
//! Blob deletes that fail during eviction or clear leave orphaned files
//! behind. This worker runs periodically and re-attempts them until they
//! succeed or exhaust their attempts.

use crate::config::DeletionConfig;
use crate::store::deletion_queue::RetryReport;
use crate::store::RotatingStore;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Background deletion worker
pub struct DeletionWorker {
    store: Arc<RotatingStore>,
    retry_interval: Duration,
    max_attempts: u32,
}

impl DeletionWorker {
    pub fn new(store: Arc<RotatingStore>, config: &DeletionConfig) -> Self {
        Self {
            store,
            retry_interval: Duration::from_secs(config.retry_interval.max(1)),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Start the deletion worker as a background task (non-blocking)
    pub fn start_background(self) -> tokio::task::JoinHandle<()> {
        info!("Starting deletion worker with {}s interval", self.retry_interval.as_secs());

        tokio::spawn(async move {
            let mut interval = time::interval(self.retry_interval);

            loop {
                interval.tick().await;

                if let Err(e) = self.process_deletions().await {
                    error!("Error processing deletions: {}", e);
                }
            }
        })
    }

    /// Run one retry pass over the pending deletes
    pub async fn process_deletions(&self) -> Result<RetryReport, Box<dyn std::error::Error + Send + Sync>> {
        if self.store.stats().pending_deletions == 0 {
            return Ok(RetryReport::default());
        }

        let store = self.store.clone();
        let max_attempts = self.max_attempts;
        let report = tokio::task::spawn_blocking(move || store.retry_pending_deletions(max_attempts)).await?;

        debug!("Deletion pass finished: {:?}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::mock_store::MockBlobStore;

    #[tokio::test]
    async fn test_deletion_worker_creation() {
        let store = Arc::new(RotatingStore::new(Arc::new(MockBlobStore::new()), 0));
        let worker = DeletionWorker::new(store, &DeletionConfig::default());
        assert_eq!(worker.max_attempts, 5);
        assert_eq!(worker.retry_interval.as_secs(), 30);
    }

    #[tokio::test]
    async fn test_process_deletions_removes_orphans() {
        let blob = Arc::new(MockBlobStore::new());
        let store = Arc::new(RotatingStore::new(blob.clone(), 0));
        store.put(b"orphan").unwrap();

        blob.set_fail_deletes(true);
        store.clear().unwrap();
        // The orphan plus its tombstone
        assert_eq!(blob.object_count(), 2);

        let worker = DeletionWorker::new(store.clone(), &DeletionConfig::default());
        let report = worker.process_deletions().await.unwrap();
        assert_eq!(report.requeued, 1);

        blob.set_fail_deletes(false);
        let report = worker.process_deletions().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(blob.object_count(), 0);
        assert_eq!(worker.process_deletions().await.unwrap(), RetryReport::default());
    }

    #[tokio::test]
    async fn test_background_worker_drains_queue() {
        let blob = Arc::new(MockBlobStore::new());
        let store = Arc::new(RotatingStore::new(blob.clone(), 1));
        store.put(b"a").unwrap();
        blob.set_fail_deletes(true);
        store.put(b"b").unwrap();
        blob.set_fail_deletes(false);

        let config = DeletionConfig { enabled: true, retry_interval: 1, max_attempts: 3 };
        let handle = DeletionWorker::new(store.clone(), &config).start_background();

        // The first tick fires immediately
        for _ in 0..50 {
            if store.stats().pending_deletions == 0 {
                break;
            }
            time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert_eq!(store.stats().pending_deletions, 0);
        assert_eq!(blob.object_count(), 1);
    }
}
