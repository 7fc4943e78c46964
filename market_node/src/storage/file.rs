use super::{KvStorage, Result, StorageError, StorageStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// File-backed storage: one flat textual record per key under a profile
/// directory, loaded eagerly at open and flushed on every write
///
/// Filenames are the hex encoding of the key, so arbitrary key characters
/// (`rental:<signature>`) never touch the filesystem namespace.
pub struct FileKvStorage {
    dir: PathBuf,
    cache: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FileKvStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StorageError::Other(format!("create {}: {}", dir.display(), e)))?;

        let mut cache = HashMap::new();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| StorageError::ReadError(format!("read {}: {}", dir.display(), e)))?;
        for entry in entries.flatten() {
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let key_bytes = match hex::decode(&name) {
                Ok(bytes) => bytes,
                Err(_) => continue, // not one of ours
            };
            let key = match String::from_utf8(key_bytes) {
                Ok(key) => key,
                Err(_) => continue,
            };
            let value = std::fs::read(entry.path())
                .map_err(|e| StorageError::ReadError(format!("read {}: {}", name, e)))?;
            cache.insert(key, value);
        }

        Ok(Self {
            dir,
            cache: Arc::new(Mutex::new(cache)),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(key.as_bytes()))
    }
}

#[async_trait]
impl KvStorage for FileKvStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let cache = self.cache.lock().unwrap();
        Ok(cache.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        std::fs::write(self.path_for(key), value)
            .map_err(|e| StorageError::WriteError(format!("write {}: {}", key, e)))?;
        let mut cache = self.cache.lock().unwrap();
        cache.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| StorageError::WriteError(format!("delete {}: {}", key, e)))?;
        }
        let mut cache = self.cache.lock().unwrap();
        cache.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let cache = self.cache.lock().unwrap();
        Ok(cache.contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let cache = self.cache.lock().unwrap();
        Ok(cache
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get_stats(&self) -> Result<StorageStats> {
        let cache = self.cache.lock().unwrap();
        Ok(StorageStats {
            num_entries: cache.len() as u64,
            used_size: cache.values().map(|v| v.len() as u64).sum(),
        })
    }
}
