//! Error types for the capture store

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::blob::BlobError;

/// Failures surfaced by the store and the HTTP layer on top of it
#[derive(Debug)]
pub enum StoreError {
    /// Empty or malformed payload, undecodable base64, bad request shape
    InvalidInput(String),
    /// No live entry under the requested key
    NotFound(String),
    /// Durable persist failed; the index was not updated
    StorageWriteFailure(BlobError),
    /// Reading a blob or scanning the backend failed
    StorageReadFailure(BlobError),
    /// Deleting an evicted or cleared blob failed; the key is queued for retry
    StorageDeleteFailure(BlobError),
    /// The store no longer accepts puts
    ShutDown,
    /// No id is left above the highest one in use
    IdsExhausted,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            StoreError::NotFound(key) => write!(f, "Not found: {}", key),
            StoreError::StorageWriteFailure(err) => write!(f, "Storage write failure: {}", err),
            StoreError::StorageReadFailure(err) => write!(f, "Storage read failure: {}", err),
            StoreError::StorageDeleteFailure(err) => write!(f, "Storage delete failure: {}", err),
            StoreError::ShutDown => write!(f, "Store is shut down"),
            StoreError::IdsExhausted => write!(f, "Entry id space exhausted"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::StorageWriteFailure(err)
            | StoreError::StorageReadFailure(err)
            | StoreError::StorageDeleteFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::IdsExhausted => StatusCode::INSUFFICIENT_STORAGE,
            StoreError::StorageWriteFailure(_)
            | StoreError::StorageReadFailure(_)
            | StoreError::StorageDeleteFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
