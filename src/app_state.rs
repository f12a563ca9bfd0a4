//! Application State Management
//!
//! Holds the rotating store and configuration shared by every request
//! handler, built once at startup.

use std::io;
use std::sync::Arc;
use log::info;

use crate::blob::BlobStorage;
use crate::blob::mock_store::MockBlobStore;
use crate::config::AppConfig;
use crate::store::RotatingStore;

/// Application state containing the store and its configuration
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RotatingStore>,
    pub config: AppConfig,
}

impl AppState {
    /// Open the configured backend and recover any images already stored there
    pub fn from_config(config: AppConfig) -> io::Result<Self> {
        info!("Initializing application state with configuration");

        let blob: Arc<dyn BlobStorage> = config.storage.create_store()?;
        let store = RotatingStore::recover(blob, config.retention.capacity)
            .map_err(|e| io::Error::other(e.to_string()))?;

        info!("Application state initialized: {} entries, capacity {:?}", store.len(), store.capacity());
        Ok(Self {
            store: Arc::new(store),
            config,
        })
    }

    /// Wrap an already constructed store
    pub fn with_store(store: Arc<RotatingStore>, config: AppConfig) -> Self {
        Self { store, config }
    }

    /// Create application state for testing with an in-memory backend
    pub fn new_for_testing(capacity: usize) -> Self {
        let mut config = AppConfig::default();
        config.retention.capacity = capacity;
        let store = RotatingStore::new(Arc::new(MockBlobStore::new()), capacity);
        Self::with_store(Arc::new(store), config)
    }
}
