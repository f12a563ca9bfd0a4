//! Blob Storage Layer Abstraction
//!
//! Key-addressed storage for captured images. The rotating store only needs
//! four capabilities from a backend (write, read, delete, list), so the same
//! retention logic runs on a local directory or an in-memory map.

pub mod config;
pub mod local_store;
pub mod mock_store;


use std::fmt;
use std::io;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// What a backend knows about one stored blob
#[derive(Debug, Clone, PartialEq)]
pub struct BlobInfo {
    pub key: String,
    pub size: u64,
    /// Last modification time, when the backend tracks one
    pub modified: Option<DateTime<Utc>>,
}

/// Backend-level failures
#[derive(Debug)]
pub enum BlobError {
    NotFound(String),
    InvalidKey(String),
    Io(io::Error),
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::NotFound(key) => write!(f, "blob not found: {}", key),
            BlobError::InvalidKey(key) => write!(f, "invalid blob key: {:?}", key),
            BlobError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BlobError {
    fn from(err: io::Error) -> Self {
        BlobError::Io(err)
    }
}

/// Trait defining the blob storage interface
pub trait BlobStorage: Send + Sync {
    /// Store `data` under `key`. Must not return until the bytes are durably readable.
    fn write(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Read the full content stored under `key`
    fn read(&self, key: &str) -> Result<Bytes, BlobError>;

    /// Remove the blob stored under `key`
    fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Enumerate every stored blob, in no particular order
    fn list(&self) -> Result<Vec<BlobInfo>, BlobError>;
}
