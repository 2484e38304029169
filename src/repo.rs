use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::error;

use crate::storage::{save_json, KeyValueStore};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
}

pub type RepoResult<T> = Result<T, RepoError>;

/// In-memory state mirrored to one storage key.
///
/// Every successful mutation rewrites the whole value under `key`; a failed
/// mutation (closure returned `Err`) leaves both memory and storage untouched.
/// Cloning shares the same state.
pub struct Snapshot<T> {
    state: Arc<RwLock<T>>,
    storage: Arc<dyn KeyValueStore>,
    key: Arc<str>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            storage: self.storage.clone(),
            key: self.key.clone(),
        }
    }
}

impl<T: Serialize> Snapshot<T> {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: &str, initial: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            storage,
            key: Arc::from(key),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let s = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&s)
    }

    pub fn mutate<R>(&self, f: impl FnOnce(&mut T) -> RepoResult<R>) -> RepoResult<R> {
        let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut s)?;
        self.persist(&s);
        Ok(out)
    }

    /// Swap in a whole new value and persist it.
    pub fn replace(&self, value: T) {
        let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *s = value;
        self.persist(&s);
    }

    // Memory stays authoritative when the write fails; the next successful
    // mutation rewrites the full value anyway.
    fn persist(&self, value: &T) {
        if let Err(e) = save_json(self.storage.as_ref(), &self.key, value) {
            error!(key = %self.key, error = %e, "failed to persist snapshot");
        }
    }
}
