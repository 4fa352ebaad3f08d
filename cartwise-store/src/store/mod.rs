//! The persistent store.
//!
//! [`Store`] is the one handle the rest of the application talks to. It
//! writes through a primary [`StorageEngine`], keeps a copy of every record
//! in the [`KvStore`] to read from when the engine is unusable, queues
//! rejected writes for replay, and emits a [`ChangeEvent`] for every
//! successful mutation.

mod analytics;
mod budgets;
mod items;
mod lists;
mod outcome;
mod payload;
mod replay;
mod settings;
mod stats;

pub use outcome::WriteOutcome;
pub use replay::ReplayReport;

use cartwise_core::{OfflineOperation, OperationKind, ProfileSettings};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{RetryPolicy, StoreConfig};
use crate::engine::{Collection, MemoryEngine, SqliteEngine, StorageEngine};
use crate::error::StoreError;
use crate::kv::KvStore;
use crate::notifier::{ChangeAction, ChangeEvent, ChangeNotifier, ChangeTopic};
use crate::persistence::ensure_dir;
use crate::queue::OfflineQueue;

// ============================================================================
// Store
// ============================================================================

/// Offline-first store for lists, items, product statistics, budgets and
/// settings.
pub struct Store {
    primary: Option<Arc<dyn StorageEngine>>,
    fallback: Arc<KvStore>,
    notifier: Arc<ChangeNotifier>,
    queue: OfflineQueue,
    retry: RetryPolicy,
    shadow_lock: Mutex<()>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("primary", &self.primary.as_ref().map(|e| e.name()))
            .field("fallback", &self.fallback.path())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// What a write does to its record.
#[derive(Clone, Copy)]
enum Mutation<'a> {
    Put(&'a Value),
    Remove,
}

/// Where a write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    Persisted,
    Queued,
}

impl Written {
    fn outcome<T>(self, record: T) -> WriteOutcome<T> {
        match self {
            Written::Persisted => WriteOutcome::Persisted(record),
            Written::Queued => WriteOutcome::Queued(record),
        }
    }
}

impl Store {
    /// Opens the store described by `config`.
    ///
    /// An unusable database is not an error: the store then runs on the
    /// fallback store alone and queues every write.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the data directory
    /// cannot be created.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        if config.in_memory {
            info!("Opening in-memory store");
            let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
            return Ok(Self::with_engine(engine, Arc::new(KvStore::in_memory()), config.retry).await);
        }

        ensure_dir(&config.data_dir).await?;
        let fallback = Arc::new(KvStore::open(&config.fallback_path()).await);

        match SqliteEngine::open(&config.database_path()).await {
            Ok(engine) => {
                info!(path = %config.database_path().display(), "Store opened");
                Ok(Self::with_engine(Arc::new(engine), fallback, config.retry).await)
            }
            Err(e) => {
                warn!(error = %e, "Primary engine unavailable, running on fallback store");
                Ok(Self::fallback_only(fallback, config.retry).await)
            }
        }
    }

    /// Builds a store over an already open engine.
    pub async fn with_engine(
        engine: Arc<dyn StorageEngine>,
        fallback: Arc<KvStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self::from_parts(Some(engine), fallback, retry).await
    }

    /// Builds a store with no primary engine.
    pub async fn fallback_only(fallback: Arc<KvStore>, retry: RetryPolicy) -> Self {
        Self::from_parts(None, fallback, retry).await
    }

    async fn from_parts(
        primary: Option<Arc<dyn StorageEngine>>,
        fallback: Arc<KvStore>,
        retry: RetryPolicy,
    ) -> Self {
        let queue = OfflineQueue::load(Arc::clone(&fallback)).await;
        let store = Self {
            primary,
            fallback,
            notifier: Arc::new(ChangeNotifier::new()),
            queue,
            retry,
            shadow_lock: Mutex::new(()),
        };
        store.sync_shadow().await;
        store
    }

    /// The notifier every mutation emits on.
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Returns true when there is no primary engine.
    pub fn is_degraded(&self) -> bool {
        self.primary.is_none()
    }

    /// Name of the primary engine, if any.
    pub fn engine_name(&self) -> Option<&'static str> {
        self.primary.as_ref().map(|e| e.name())
    }

    /// Schema version of the primary engine.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` without a primary engine, or the
    /// engine's error.
    pub async fn schema_version(&self) -> Result<u32, StoreError> {
        match &self.primary {
            Some(engine) => engine.schema_version().await,
            None => Err(StoreError::Unavailable("no primary engine".to_string())),
        }
    }

    /// The fallback store.
    pub fn fallback(&self) -> &Arc<KvStore> {
        &self.fallback
    }

    /// Retry policy used by replay.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Pending offline operations, oldest first.
    pub async fn offline_queue(&self) -> Vec<OfflineOperation> {
        self.queue.pending().await
    }

    /// Operations that exhausted their retries.
    pub async fn dead_letters(&self) -> Vec<OfflineOperation> {
        self.queue.dead_letters().await
    }

    /// Drops every dead letter. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if the fallback store cannot be written.
    pub async fn clear_dead_letters(&self) -> Result<usize, StoreError> {
        self.queue.clear_dead_letters().await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Every decodable record of a collection.
    ///
    /// Records with queued writes are read from the fallback copy, which
    /// holds their latest local state. Any primary failure reads the whole
    /// collection from the fallback copy; a missing or corrupt copy reads as
    /// empty.
    async fn read_all<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        let values = match &self.primary {
            Some(engine) => match engine.get_all(collection).await {
                Ok(values) => self.overlay_queued(collection, values).await,
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Read failed, using fallback store");
                    self.shadow(collection).await.into_values().collect()
                }
            },
            None => self.shadow(collection).await.into_values().collect(),
        };
        values
            .into_iter()
            .filter_map(|value| decode_record(collection, value))
            .collect()
    }

    /// Replaces records that have queued writes with their fallback copy.
    async fn overlay_queued(&self, collection: Collection, values: Vec<Value>) -> Vec<Value> {
        let queued = self.queued_keys(collection).await;
        if queued.is_empty() {
            return values;
        }
        let mut records: BTreeMap<String, Value> = values
            .into_iter()
            .filter_map(|value| Some((record_key(collection, &value)?, value)))
            .collect();
        let shadow = self.shadow(collection).await;
        for key in queued {
            match shadow.get(&key) {
                Some(value) => records.insert(key, value.clone()),
                None => records.remove(&key),
            };
        }
        records.into_values().collect()
    }

    /// One record by key, with the same fallback rule as [`Store::read_all`].
    async fn read_one<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Option<T> {
        match self.lookup(collection, key).await {
            Ok(record) => record,
            Err(e) => {
                warn!(collection = %collection, key, error = %e, "Record unreadable");
                None
            }
        }
    }

    /// Finds a record for reading or as a mutation target.
    ///
    /// # Errors
    ///
    /// Returns the primary's error when it cannot be read and the fallback
    /// copy has no such record either, so a caller can tell "missing" from
    /// "unknown".
    async fn lookup<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let queued = self.is_queued(collection, key).await;
        let value = match &self.primary {
            Some(engine) if !queued => {
                match engine.get(collection, key).await {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(collection = %collection, key, error = %e, "Read failed, using fallback store");
                        match self.shadow(collection).await.remove(key) {
                            Some(value) => Some(value),
                            None => return Err(e),
                        }
                    }
                }
            }
            _ => self.shadow(collection).await.remove(key),
        };
        Ok(value.and_then(|v| decode_record(collection, v)))
    }

    /// Keys of `collection` that queued operations still have to write.
    async fn queued_keys(&self, collection: Collection) -> BTreeSet<String> {
        self.queue
            .outstanding()
            .await
            .iter()
            .filter_map(payload::target)
            .filter(|(c, _)| *c == collection)
            .map(|(_, key)| key)
            .collect()
    }

    /// Returns true if a queued operation still has to write this record.
    async fn is_queued(&self, collection: Collection, key: &str) -> bool {
        self.queue
            .outstanding()
            .await
            .iter()
            .filter_map(payload::target)
            .any(|(c, k)| c == collection && k == key)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Applies a mutation to the primary engine, queueing it on failure.
    ///
    /// A record that still has queued writes is never written directly: the
    /// mutation queues behind them so replay keeps the order it was made in.
    ///
    /// # Errors
    ///
    /// Returns error only when the operation had to be queued and could not
    /// be.
    async fn write(
        &self,
        collection: Collection,
        key: &str,
        mutation: Mutation<'_>,
        kind: OperationKind,
        payload: Value,
    ) -> Result<Written, StoreError> {
        if self.is_queued(collection, key).await {
            debug!(collection = %collection, key, kind = %kind, "Record has queued writes, queueing behind them");
            return self.defer(collection, key, mutation, kind, payload).await;
        }

        let primary_error = match &self.primary {
            Some(engine) => {
                let result = match mutation {
                    Mutation::Put(record) => engine.put(collection, key, record).await,
                    Mutation::Remove => engine.delete(collection, key).await.map(|_| ()),
                };
                match result {
                    Ok(()) => {
                        debug!(collection = %collection, key, "Record written");
                        if let Err(e) = self.update_shadow(collection, key, &mutation).await {
                            warn!(collection = %collection, key, error = %e, "Could not mirror write to fallback store");
                        }
                        return Ok(Written::Persisted);
                    }
                    Err(e) => e,
                }
            }
            None => StoreError::Unavailable("no primary engine".to_string()),
        };

        warn!(
            collection = %collection,
            key,
            kind = %kind,
            error = %primary_error,
            "Write failed, queueing for replay"
        );
        self.defer(collection, key, mutation, kind, payload).await
    }

    /// Queues a mutation for replay and applies it to the fallback copy.
    async fn defer(
        &self,
        collection: Collection,
        key: &str,
        mutation: Mutation<'_>,
        kind: OperationKind,
        payload: Value,
    ) -> Result<Written, StoreError> {
        let op = OfflineOperation::new(kind, payload, Utc::now());
        self.queue.enqueue(op).await?;

        if let Err(e) = self.update_shadow(collection, key, &mutation).await {
            warn!(collection = %collection, key, error = %e, "Could not shadow queued write");
        }
        Ok(Written::Queued)
    }

    /// Emits a change event for `record`.
    fn emit<T: Serialize>(&self, topic: ChangeTopic, action: ChangeAction, record: &T) {
        match serde_json::to_value(record) {
            Ok(value) => {
                self.notifier.emit(&ChangeEvent::new(topic, action, value));
            }
            Err(e) => warn!(topic = %topic, error = %e, "Could not encode change event"),
        }
    }

    // ========================================================================
    // Shadow Collections
    // ========================================================================

    /// The fallback copy of a collection, keyed by record key.
    async fn shadow(&self, collection: Collection) -> BTreeMap<String, Value> {
        self.fallback
            .get_json(&collection.fallback_key())
            .await
            .unwrap_or_default()
    }

    async fn update_shadow(
        &self,
        collection: Collection,
        key: &str,
        mutation: &Mutation<'_>,
    ) -> Result<(), StoreError> {
        let _guard = self.shadow_lock.lock().await;
        let mut records = self.shadow(collection).await;
        match mutation {
            Mutation::Put(record) => {
                records.insert(key.to_string(), (*record).clone());
            }
            Mutation::Remove => {
                if records.remove(key).is_none() {
                    return Ok(());
                }
            }
        }
        self.fallback
            .set_json(&collection.fallback_key(), &records)
            .await
    }

    /// Rebuilds the fallback copy from the primary engine.
    ///
    /// Records with queued writes keep their local state. A collection the
    /// primary cannot read is left alone.
    async fn sync_shadow(&self) {
        let Some(engine) = &self.primary else {
            return;
        };
        let _guard = self.shadow_lock.lock().await;
        for &collection in Collection::all() {
            let values = match engine.get_all(collection).await {
                Ok(values) => values,
                Err(e) => {
                    debug!(collection = %collection, error = %e, "Primary unreadable, fallback copy kept");
                    continue;
                }
            };
            let mut records: BTreeMap<String, Value> = values
                .into_iter()
                .filter_map(|value| Some((record_key(collection, &value)?, value)))
                .collect();
            let queued = self.queued_keys(collection).await;
            if !queued.is_empty() {
                let shadow = self.shadow(collection).await;
                for key in queued {
                    match shadow.get(&key) {
                        Some(value) => records.insert(key, value.clone()),
                        None => records.remove(&key),
                    };
                }
            }
            if let Err(e) = self
                .fallback
                .set_json(&collection.fallback_key(), &records)
                .await
            {
                warn!(collection = %collection, error = %e, "Could not refresh fallback copy");
            }
        }
    }
}

/// Key a record is stored under.
fn record_key(collection: Collection, value: &Value) -> Option<String> {
    let field = match collection {
        Collection::Settings => return Some(ProfileSettings::KEY.to_string()),
        Collection::ProductStats => "name",
        _ => "id",
    };
    value.get(field)?.as_str().map(ToString::to_string)
}

fn decode_record<T: DeserializeOwned>(collection: Collection, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(collection = %collection, error = %e, "Skipping undecodable record");
            None
        }
    }
}

fn encode_record<T: Serialize>(record: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(record)?)
}
