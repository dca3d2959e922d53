//! On-device key/value storage.
//!
//! The stats synchronizer keeps its degraded-mode snapshot here. Values are
//! plain strings; [`load_json`] and [`store_json`] layer serde on top.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{DocEnclaveError, Result};

/// Simple string key/value persistence.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read the value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Read and delete the value under `key` in one step.
    ///
    /// When several callers race for the same key, at most one gets the value.
    async fn take(&self, key: &str) -> Result<Option<String>>;
}

/// Read and deserialize the value under `key`.
///
/// # Errors
///
/// Returns [`DocEnclaveError::LocalStorage`] if the stored text is not valid
/// JSON for `T`, or the storage error itself.
pub async fn load_json<T>(storage: &dyn KeyValueStorage, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match storage.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| DocEnclaveError::local_storage(key, err)),
        None => Ok(None),
    }
}

/// Like [`load_json`], but removes the value so no other caller sees it.
pub async fn take_json<T>(storage: &dyn KeyValueStorage, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match storage.take(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| DocEnclaveError::local_storage(key, err)),
        None => Ok(None),
    }
}

/// Serialize `value` and write it under `key`.
pub async fn store_json<T>(storage: &dyn KeyValueStorage, key: &str, value: &T) -> Result<()>
where
    T: Serialize + Sync,
{
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw).await
}

/// One file per key inside a directory.
///
/// Writes go to a uniquely named temporary file first and are renamed into
/// place, so neither a crash nor a concurrent writer leaves a half-written
/// value behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(DocEnclaveError::local_storage(key, "invalid key"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn scratch_path(path: &Path, purpose: &str) -> PathBuf {
        path.with_extension(format!("json.{}.{purpose}", Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(DocEnclaveError::local_storage(key, err)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| DocEnclaveError::local_storage(key, err))?;

        let tmp = Self::scratch_path(&path, "tmp");
        let written = match tokio::fs::write(&tmp, value).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(DocEnclaveError::local_storage(key, err));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(DocEnclaveError::local_storage(key, err)),
        }
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        // Renaming is atomic, so only one caller can claim the file.
        let claimed = Self::scratch_path(&path, "claimed");
        match tokio::fs::rename(&path, &claimed).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(DocEnclaveError::local_storage(key, err)),
        }

        let raw = tokio::fs::read_to_string(&claimed)
            .await
            .map_err(|err| DocEnclaveError::local_storage(key, err))?;
        tokio::fs::remove_file(&claimed)
            .await
            .map_err(|err| DocEnclaveError::local_storage(key, err))?;
        Ok(Some(raw))
    }
}

/// Volatile storage, for tests and hosts without a disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_storage_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("state"));

        assert_eq!(storage.get("docenclave-stats").await.unwrap(), None);

        storage.set("docenclave-stats", "{\"visits\":3}").await.unwrap();
        assert_eq!(
            storage.get("docenclave-stats").await.unwrap().as_deref(),
            Some("{\"visits\":3}")
        );
        assert!(dir.path().join("state/docenclave-stats.json").exists());
        assert_eq!(std::fs::read_dir(dir.path().join("state")).unwrap().count(), 1);

        storage.remove("docenclave-stats").await.unwrap();
        storage.remove("docenclave-stats").await.unwrap();
        assert_eq!(storage.get("docenclave-stats").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_key() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()));

        let writes = (0..16).map(|i| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move { storage.set("shared", &i.to_string()).await })
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap().unwrap();
        }

        let value: u32 = storage.get("shared").await.unwrap().unwrap().parse().unwrap();
        assert!(value < 16);
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_take_hands_value_to_one_caller() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()));
        storage.set("pending", "{\"visits\":1}").await.unwrap();

        let takers = (0..8).map(|_| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move { storage.take("pending").await })
        });
        let taken: Vec<_> = futures::future::join_all(takers)
            .await
            .into_iter()
            .filter_map(|result| result.unwrap().unwrap())
            .collect();

        assert_eq!(taken, vec!["{\"visits\":1}".to_string()]);
        assert_eq!(storage.get("pending").await.unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_memory_take() {
        let storage = MemoryStorage::new();
        storage.set("k", "v").await.unwrap();
        assert_eq!(storage.take("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(storage.take("k").await.unwrap(), None);
        assert!(storage.is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("../escape")]
    #[case(".hidden")]
    #[case("a/b")]
    #[tokio::test]
    async fn test_file_storage_rejects_bad_keys(#[case] key: &str) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        let err = storage.set(key, "x").await.unwrap_err();
        assert!(matches!(err, DocEnclaveError::LocalStorage { .. }));
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let storage = MemoryStorage::new();
        let mut value = BTreeMap::new();
        value.insert("pdf-merge".to_string(), 4u64);

        store_json(&storage, "k", &value).await.unwrap();
        let loaded: Option<BTreeMap<String, u64>> = load_json(&storage, "k").await.unwrap();
        assert_eq!(loaded, Some(value));

        storage.set("k", "not json").await.unwrap();
        let err = load_json::<BTreeMap<String, u64>>(&storage, "k")
            .await
            .unwrap_err();
        assert!(matches!(err, DocEnclaveError::LocalStorage { .. }));
    }
}
