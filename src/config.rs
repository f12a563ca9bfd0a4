//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults and a few
//! environment overrides for container deployments.

use serde::{Deserialize, Serialize};
use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::blob::config::{BlobBackend, BlobConfig};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Blob storage configuration
    pub storage: BlobConfig,
    /// Retention configuration
    pub retention: RetentionConfig,
    /// Deletion retry worker configuration
    pub deletion: DeletionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum JSON body size in bytes
    pub max_payload_size: usize,
    /// Seconds to wait for in-flight uploads after the server stops
    pub shutdown_timeout: u64,
}

/// Retention configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Number of newest images kept; 0 keeps everything
    pub capacity: usize,
}

/// Deletion retry worker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeletionConfig {
    /// Enable deletion worker
    pub enabled: bool,
    /// Retry interval in seconds
    pub retry_interval: u64,
    /// Attempts per blob before giving up
    pub max_attempts: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: 4,
            max_payload_size: 10 * 1024 * 1024,
            shutdown_timeout: 30,
        }
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry_interval: 30,
            max_attempts: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `CAPTURE_CONFIG` (or `config.yaml`), then apply
    /// environment overrides
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let config_path = env::var("CAPTURE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = Self::load_from(Path::new(&config_path))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from file, use defaults if not found
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn Error>> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// `PORT`, `STORAGE_DIRECTORY`, `STORAGE_BACKEND` and `CAPTURE_CAPACITY` win over the file
    pub fn apply_env_overrides(&mut self) -> Result<(), Box<dyn Error>> {
        if let Ok(port) = env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| format!("Invalid PORT {:?}: {}", port, e))?;
        }
        if let Ok(dir) = env::var("STORAGE_DIRECTORY") {
            self.storage.temp_path = Path::new(&dir).join(".tmp").display().to_string();
            self.storage.base_path = dir;
        }
        if let Ok(backend) = env::var("STORAGE_BACKEND") {
            self.storage.backend = backend.parse::<BlobBackend>()?;
        }
        if let Ok(capacity) = env::var("CAPTURE_CAPACITY") {
            self.retention.capacity = capacity
                .parse()
                .map_err(|e| format!("Invalid CAPTURE_CAPACITY {:?}: {}", capacity, e))?;
        }
        Ok(())
    }
}
