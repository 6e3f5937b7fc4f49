use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::core::interfaces::ports::KeyValueStorage;
use crate::global_constants::{APPLICATION_DIR_NAME, LOG_TAG_STORAGE, STORAGE_FILE_NAME};

/// Key/value storage kept as one pretty-printed JSON object on disk.
///
/// Every call re-reads the file, so two coordinators pointed at the same
/// path see each other's writes.
pub struct JsonFileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        log::info!("{} Using storage file {:?}", LOG_TAG_STORAGE, path);
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_config_dir() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join(APPLICATION_DIR_NAME);

        Ok(Self::at(config_dir.join(STORAGE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} No storage file yet at {:?}", LOG_TAG_STORAGE, self.path);
                return Ok(HashMap::new());
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("Failed to read storage file {:?}", self.path))
            }
        };

        serde_json::from_str(&contents)
            .with_context(|| format!("Storage file {:?} is not a JSON object", self.path))
    }

    async fn persist(&self, entries: &HashMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("Failed to write storage file {:?}", self.path))?;

        log::debug!("{} Saved {} keys to {:?}", LOG_TAG_STORAGE, entries.len(), self.path);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        for key in keys {
            entries.remove(*key);
        }
        if entries.len() == before {
            return Ok(());
        }
        self.persist(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::at(dir.path().join("storage.json"));

        assert_eq!(storage.get("tabId").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let first = JsonFileStorage::at(&path);
        first.set("tabId", json!(7)).await.unwrap();
        first.set("capturedImage", json!("data:image/png;base64,AAAA")).await.unwrap();

        let second = JsonFileStorage::at(&path);
        assert_eq!(second.get("tabId").await.unwrap(), Some(json!(7)));
        assert_eq!(
            second.get("capturedImage").await.unwrap(),
            Some(json!("data:image/png;base64,AAAA"))
        );
    }

    #[tokio::test]
    async fn test_remove_deletes_only_named_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::at(dir.path().join("storage.json"));
        storage.set("tabId", json!(1)).await.unwrap();
        storage.set("croppedImage", json!("x")).await.unwrap();

        storage.remove(&["croppedImage", "neverSet"]).await.unwrap();

        assert_eq!(storage.get("croppedImage").await.unwrap(), None);
        assert_eq!(storage.get("tabId").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(JsonFileStorage::at(&path).get("tabId").await.is_err());
    }
}
