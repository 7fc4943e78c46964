use super::{KvStorage, Result, StorageError, StorageStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory storage for tests and ephemeral profiles
///
/// An optional entry cap emulates the quota behavior of a browser-local
/// key-value area: inserting a new key past the cap fails with
/// `QuotaExceeded`, overwrites of existing keys always succeed.
pub struct MemoryKvStorage {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    max_entries: Option<usize>,
}

impl Default for MemoryKvStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            max_entries: None,
        }
    }

    pub fn with_capacity_limit(max_entries: usize) -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            max_entries: Some(max_entries),
        }
    }
}

#[async_trait]
impl KvStorage for MemoryKvStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        if let Some(max) = self.max_entries {
            if !data.contains_key(key) && data.len() >= max {
                return Err(StorageError::QuotaExceeded(format!(
                    "{} entries, cap {}",
                    data.len(),
                    max
                )));
            }
        }
        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        data.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let data = self.data.lock().unwrap();
        Ok(data.contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let data = self.data.lock().unwrap();
        let keys: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        Ok(keys)
    }

    async fn get_stats(&self) -> Result<StorageStats> {
        let data = self.data.lock().unwrap();
        Ok(StorageStats {
            num_entries: data.len() as u64,
            used_size: data.values().map(|v| v.len() as u64).sum(),
        })
    }
}
