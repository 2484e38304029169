use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value storage with whole-value writes, the local analogue of
/// browser `localStorage` / `sessionStorage`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ---------------- In-memory (session-scoped) ----------------
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let m = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(m.get(key).cloned())
    }
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut m = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        m.insert(key.to_string(), value.to_string());
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut m = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        m.remove(key);
        Ok(())
    }
}

// ---------------- Filesystem (one JSON file per key) ----------------
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Keys embed usernames (`liked_by_<name>`), so they are percent-encoded
    // before becoming file names.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl KeyValueStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // write-then-rename so a crash never leaves a half-written snapshot
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read and decode a persisted value.
///
/// Missing keys yield `None`. Unreadable or malformed values are logged,
/// discarded from the store, and also yield `None` so callers fall back to
/// their defaults.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "no persisted value");
            return None;
        }
        Err(e) => {
            warn!(key, error = %e, "failed to read persisted value; ignoring");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "malformed persisted value; discarding");
            if let Err(e) = store.remove(key) {
                error!(key, error = %e, "failed to discard malformed value");
            }
            None
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let s = serde_json::to_string(value)?;
    store.set(key, &s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_store_encodes_keys_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(store.get("liked_by_a/b").unwrap().is_none());
        store.set("liked_by_a/b", "[1]").unwrap();
        assert_eq!(store.get("liked_by_a/b").unwrap().as_deref(), Some("[1]"));
        assert!(dir.path().join("liked_by_a%2Fb.json").exists());
        store.remove("liked_by_a/b").unwrap();
        store.remove("liked_by_a/b").unwrap();
        assert!(store.get("liked_by_a/b").unwrap().is_none());
    }

    #[test]
    fn malformed_value_is_discarded() {
        let store = MemoryStore::new();
        store.set("users", "{not json").unwrap();
        assert!(load_json::<Vec<String>>(&store, "users").is_none());
        assert!(store.get("users").unwrap().is_none());
    }
}
