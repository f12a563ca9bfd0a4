//! Configuration for blob storage backends

use crate::blob::{BlobStorage, local_store::LocalBlobStore, mock_store::MockBlobStore};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use log::info;

/// Available blob storage backends
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum BlobBackend {
    #[default]
    #[serde(alias = "local", alias = "localfs", alias = "fs")]
    LocalFs,
    #[serde(alias = "mock", alias = "memory")]
    Mock,
}

impl std::str::FromStr for BlobBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "localfs" | "local" | "fs" => Ok(BlobBackend::LocalFs),
            "mock" | "memory" => Ok(BlobBackend::Mock),
            _ => Err(format!("Unknown storage backend: {}", s))
        }
    }
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlobConfig {
    /// Storage backend type
    pub backend: BlobBackend,
    /// Directory holding one file per stored image
    pub base_path: String,
    /// Staging directory for in-flight writes; must be on the same filesystem as `base_path`
    pub temp_path: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::default(),
            base_path: "./photos".to_string(),
            temp_path: "./photos/.tmp".to_string(),
        }
    }
}

impl BlobConfig {
    /// Create a blob store instance based on the configuration
    pub fn create_store(&self) -> io::Result<Arc<dyn BlobStorage>> {
        match self.backend {
            BlobBackend::LocalFs => {
                info!("Using local filesystem blob backend with base_path: {}, temp_path: {}",
                      self.base_path, self.temp_path);
                Ok(Arc::new(LocalBlobStore::new(&self.base_path, &self.temp_path)?))
            }
            BlobBackend::Mock => {
                info!("Using in-memory mock blob backend");
                Ok(Arc::new(MockBlobStore::new()))
            }
        }
    }
}
