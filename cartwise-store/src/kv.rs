//! Fallback key-value store.
//!
//! A flat map of string keys to serialized JSON strings, flushed to a single
//! file after every write. It backs the offline queue mirror and holds a
//! shadow copy of each collection for when the primary engine is unusable.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::persistence::{load_json_or_default, save_json};

/// Durable string map.
#[derive(Debug, Default)]
pub struct KvStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, String>>,
    fail_writes: AtomicBool,
}

impl KvStore {
    /// Creates a store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a file-backed store. A missing or corrupt file starts empty.
    pub async fn open(path: &Path) -> Self {
        let entries: BTreeMap<String, String> = load_json_or_default(path).await;
        debug!(path = %path.display(), keys = entries.len(), "Opened fallback store");
        Self {
            path: Some(path.to_path_buf()),
            entries: RwLock::new(entries),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Makes writes fail with [`StoreError::Unavailable`] (or succeed again).
    ///
    /// Simulates a full or revoked device store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the raw string stored under `key`.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    /// Stores `value` under `key` and flushes.
    ///
    /// # Errors
    ///
    /// Returns error if writes are failing or the file cannot be written.
    /// The in-memory map is left unchanged on failure.
    pub async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.check_write()?;
        let mut entries = self.entries.write().await;
        let previous = entries.insert(key.to_string(), value);
        if let Err(e) = self.flush(&entries).await {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Removes `key` and flushes. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns error if writes are failing or the file cannot be written.
    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.check_write()?;
        let mut entries = self.entries.write().await;
        let Some(previous) = entries.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.flush(&entries).await {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    /// Reads and deserializes the value under `key`.
    ///
    /// An undecodable value is logged and treated as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Ignoring undecodable fallback entry");
                None
            }
        }
    }

    /// Serializes `value` and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw).await
    }

    /// All keys currently present.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "fallback store rejecting writes".to_string(),
            ));
        }
        Ok(())
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => save_json(path, entries).await,
            None => Ok(()),
        }
    }
}
