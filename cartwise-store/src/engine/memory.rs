//! In-process engine.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Collection, SCHEMA_VERSION, StorageEngine};
use crate::error::StoreError;

/// Engine that keeps every collection in memory.
///
/// Used for `--in-memory` runs and for exercising the offline paths: reads
/// and writes can be switched to fail with [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryEngine {
    collections: Mutex<HashMap<Collection, BTreeMap<String, Value>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read and write fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.fail_reads.store(offline, Ordering::SeqCst);
        self.fail_writes.store(offline, Ordering::SeqCst);
    }

    /// Makes writes fail while reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes reads fail while writes keep working.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Returns true if writes are currently failing.
    pub fn is_failing_writes(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }

    /// Number of records held for a collection, ignoring fault injection.
    pub fn record_count(&self, collection: Collection) -> usize {
        self.lock().get(&collection).map_or(0, BTreeMap::len)
    }

    /// Reads a record directly, ignoring fault injection.
    pub fn peek(&self, collection: Collection, key: &str) -> Option<Value> {
        self.lock()
            .get(&collection)
            .and_then(|records| records.get(key).cloned())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Collection, BTreeMap<String, Value>>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory engine offline".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory engine rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_read()?;
        Ok(self.peek(collection, key))
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.check_read()?;
        Ok(self
            .lock()
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(
        &self,
        collection: Collection,
        key: &str,
        record: &Value,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.lock()
            .entry(collection)
            .or_default()
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        self.check_write()?;
        Ok(self
            .lock()
            .get_mut(&collection)
            .is_some_and(|records| records.remove(key).is_some()))
    }

    async fn schema_version(&self) -> Result<u32, StoreError> {
        Ok(SCHEMA_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_offline_rejects_everything() {
        let engine = MemoryEngine::new();
        engine
            .put(Collection::Lists, "a", &json!({}))
            .await
            .unwrap();

        engine.set_offline(true);
        assert!(engine.get(Collection::Lists, "a").await.is_err());
        assert!(engine.put(Collection::Lists, "b", &json!({})).await.is_err());

        engine.set_offline(false);
        assert!(engine.get(Collection::Lists, "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fail_writes_keeps_reads() {
        let engine = MemoryEngine::new();
        engine
            .put(Collection::Items, "i", &json!({ "n": 1 }))
            .await
            .unwrap();
        engine.set_fail_writes(true);

        let err = engine.delete(Collection::Items, "i").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(engine.get_all(Collection::Items).await.unwrap().len(), 1);
        assert_eq!(engine.record_count(Collection::Items), 1);
    }

    #[tokio::test]
    async fn test_fail_reads_keeps_writes() {
        let engine = MemoryEngine::new();
        engine.set_fail_reads(true);

        engine
            .put(Collection::Settings, "profile", &json!({ "theme": "dark" }))
            .await
            .unwrap();
        assert!(engine.get(Collection::Settings, "profile").await.is_err());
        assert!(engine.peek(Collection::Settings, "profile").is_some());
    }
}
