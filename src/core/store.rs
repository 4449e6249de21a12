//! Persistent key-value storage behind the cache manager.
//!
//! The SDK only needs string values keyed by string. [`MemoryStore`] keeps
//! them in process, [`FileStore`] keeps them in a JSON file so they survive
//! restarts.

use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AppLaunchError, ErrorCode, Result};

/// File name of the persisted key-value map.
pub const STORE_FILE_NAME: &str = "applaunch-store.json";

const LOCK_FILE_NAME: &str = "applaunch-store.lock";

/// Durable string storage keyed by string.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Writes every entry or none of them.
    ///
    /// The default writes one key at a time and, on failure, restores the
    /// keys it already wrote. Stores that can commit a batch in one step
    /// should override it.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut previous: Vec<(&str, Option<String>)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let before = match self.get(key) {
                Ok(before) => before,
                Err(e) => {
                    restore(self, &previous);
                    return Err(e);
                }
            };
            if let Err(e) = self.set(key, value) {
                restore(self, &previous);
                return Err(e);
            }
            previous.push((*key, before));
        }
        Ok(())
    }
}

fn restore<S: KeyValueStore + ?Sized>(store: &S, previous: &[(&str, Option<String>)]) {
    for (key, before) in previous.iter().rev() {
        let restored = match before {
            Some(value) => store.set(key, value),
            None => store.remove(key),
        };
        if let Err(e) = restored {
            tracing::warn!("Failed to restore store key {}: {}", key, e);
        }
    }
}

/// In-process store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of every entry, for inspection.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }
}

/// Store persisted as a single JSON object in a directory.
///
/// Every mutation rewrites the file through a temporary file and a rename
/// while holding an exclusive lock on a sibling lock file, so a crash never
/// leaves a half-written map behind.
pub struct FileStore {
    entries: RwLock<HashMap<String, String>>,
    data_file: PathBuf,
    lock_file_path: PathBuf,
}

impl FileStore {
    /// Opens (or creates) the store in `storage_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// store file cannot be read. A store file that is not valid JSON is
    /// discarded with a warning.
    pub fn open(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();
        fs::create_dir_all(&storage_path).map_err(|e| {
            AppLaunchError::with_source(
                ErrorCode::CacheStorageError,
                format!("Failed to create storage directory: {}", storage_path.display()),
                e,
            )
        })?;

        let store = Self {
            entries: RwLock::new(HashMap::new()),
            data_file: storage_path.join(STORE_FILE_NAME),
            lock_file_path: storage_path.join(LOCK_FILE_NAME),
        };

        let loaded = store.load()?;
        tracing::debug!(
            "Opened store {} with {} entries",
            store.data_file.display(),
            loaded.len()
        );
        *store.entries.write() = loaded;

        Ok(store)
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        let contents = match fs::read_to_string(&self.data_file) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(AppLaunchError::with_source(
                    ErrorCode::CacheReadError,
                    format!("Failed to read store file: {}", self.data_file.display()),
                    e,
                ));
            }
        };

        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    "Discarding unreadable store file {}: {}",
                    self.data_file.display(),
                    e
                );
                Ok(HashMap::new())
            }
        }
    }

    /// Applies `change` to a copy of the map and swaps it in once the copy
    /// is on disk. `change` returns whether anything changed.
    fn update(&self, change: impl FnOnce(&mut HashMap<String, String>) -> bool) -> Result<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let lock_file = self.acquire_lock()?;

        let serialized = serde_json::to_vec(entries).map_err(|e| {
            AppLaunchError::with_source(ErrorCode::CacheWriteError, "Failed to serialize store", e)
        })?;

        let tmp_path = self.data_file.with_extension("json.tmp");
        let mut file = File::create(&tmp_path).map_err(|e| {
            AppLaunchError::with_source(
                ErrorCode::CacheWriteError,
                format!("Failed to create temp store file: {}", tmp_path.display()),
                e,
            )
        })?;
        file.write_all(&serialized).map_err(|e| {
            AppLaunchError::with_source(ErrorCode::CacheWriteError, "Failed to write store", e)
        })?;
        file.sync_all().map_err(|e| {
            AppLaunchError::with_source(ErrorCode::CacheWriteError, "Failed to sync store", e)
        })?;

        fs::rename(&tmp_path, &self.data_file).map_err(|e| {
            AppLaunchError::with_source(
                ErrorCode::CacheWriteError,
                format!("Failed to replace store file: {}", self.data_file.display()),
                e,
            )
        })?;

        drop(lock_file);
        Ok(())
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_file_path)
            .map_err(|e| {
                AppLaunchError::with_source(
                    ErrorCode::CacheStorageError,
                    "Failed to open lock file",
                    e,
                )
            })?;

        lock_file.lock_exclusive().map_err(|e| {
            AppLaunchError::with_source(ErrorCode::CacheStorageError, "Failed to acquire file lock", e)
        })?;

        Ok(lock_file)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn set_many(&self, batch: &[(&str, String)]) -> Result<()> {
        self.update(|entries| {
            for (key, value) in batch {
                entries.insert((*key).to_string(), value.clone());
            }
            !batch.is_empty()
        })
    }
}
