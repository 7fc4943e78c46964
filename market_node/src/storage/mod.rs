//! Key-value persistence for the client-side marketplace state
//!
//! One authoritative store per profile. Rentals live under `rental:<id>`
//! keys and account profiles under `account:<address>`; all writers go
//! through the typed stores layered on top of this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod file;
pub mod memory;

pub use file::FileKvStorage;
pub use memory::MemoryKvStorage;

// Storage-specific Result type
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageError {
    NotFound(String),
    WriteError(String),
    ReadError(String),
    QuotaExceeded(String),
    InvalidData(String),
    Other(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::WriteError(msg) => write!(f, "Write error: {}", msg),
            StorageError::ReadError(msg) => write!(f, "Read error: {}", msg),
            StorageError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            StorageError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            StorageError::Other(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub num_entries: u64,
    pub used_size: u64,
}

/// Core key-value storage trait
#[async_trait]
pub trait KvStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
    async fn get_stats(&self) -> Result<StorageStats>;
}
