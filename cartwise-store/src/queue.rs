//! Offline write queue.
//!
//! Writes the primary engine rejected wait here in FIFO order until
//! [`crate::Store::process_offline_queue`] replays them. The queue and the
//! dead-letter list are mirrored into the fallback store after every change
//! so they survive restarts.

use cartwise_core::OfflineOperation;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::kv::KvStore;

/// Fallback key holding pending operations.
pub const QUEUE_KEY: &str = "cartwise.offline_queue";

/// Fallback key holding operations that exhausted their retries.
pub const DEAD_LETTER_KEY: &str = "cartwise.offline_dead_letter";

/// Durable FIFO of deferred writes.
#[derive(Debug)]
pub struct OfflineQueue {
    kv: Arc<KvStore>,
    pending: Mutex<Vec<OfflineOperation>>,
    in_flight: Mutex<Vec<OfflineOperation>>,
    dead: Mutex<Vec<OfflineOperation>>,
}

impl OfflineQueue {
    /// Restores the queue and dead letters from the fallback store.
    pub async fn load(kv: Arc<KvStore>) -> Self {
        let pending: Vec<OfflineOperation> = kv.get_json(QUEUE_KEY).await.unwrap_or_default();
        let dead: Vec<OfflineOperation> = kv.get_json(DEAD_LETTER_KEY).await.unwrap_or_default();
        if !pending.is_empty() || !dead.is_empty() {
            debug!(
                pending = pending.len(),
                dead = dead.len(),
                "Restored offline queue"
            );
        }
        Self {
            kv,
            pending: Mutex::new(pending),
            in_flight: Mutex::new(Vec::new()),
            dead: Mutex::new(dead),
        }
    }

    /// Appends an operation and mirrors the queue.
    ///
    /// # Errors
    ///
    /// Returns error if the mirror cannot be written. The operation is not
    /// kept in that case.
    pub async fn enqueue(&self, op: OfflineOperation) -> Result<(), StoreError> {
        let mut pending = self.pending.lock().await;
        pending.push(op);
        if let Err(e) = self.kv.set_json(QUEUE_KEY, &*pending).await {
            pending.pop();
            return Err(e);
        }
        debug!(len = pending.len(), "Operation queued");
        Ok(())
    }

    /// Removes every pending operation from memory, oldest first.
    ///
    /// The mirror is left as is until [`OfflineQueue::restore_front`]
    /// persists the outcome, so a crash mid-replay loses nothing. Until then
    /// the taken operations still show up in [`OfflineQueue::outstanding`].
    pub async fn take_all(&self) -> Vec<OfflineOperation> {
        let mut pending = self.pending.lock().await;
        let ops = std::mem::take(&mut *pending);
        *self.in_flight.lock().await = ops.clone();
        ops
    }

    /// Puts operations back ahead of anything queued since they were taken,
    /// then mirrors the queue.
    ///
    /// # Errors
    ///
    /// Returns error if the mirror cannot be written. The in-memory queue
    /// is updated regardless.
    pub async fn restore_front(&self, ops: Vec<OfflineOperation>) -> Result<(), StoreError> {
        let mut pending = self.pending.lock().await;
        let newer = std::mem::replace(&mut *pending, ops);
        pending.extend(newer);
        self.in_flight.lock().await.clear();
        self.kv.set_json(QUEUE_KEY, &*pending).await
    }

    /// Moves an operation to the dead-letter list.
    ///
    /// # Errors
    ///
    /// Returns error if the dead-letter mirror cannot be written.
    pub async fn dead_letter(&self, op: OfflineOperation) -> Result<(), StoreError> {
        let mut dead = self.dead.lock().await;
        warn!(id = %op.id, kind = %op.kind, attempts = op.attempts, "Operation dead-lettered");
        dead.push(op);
        self.kv.set_json(DEAD_LETTER_KEY, &*dead).await
    }

    /// Copy of the pending operations.
    pub async fn pending(&self) -> Vec<OfflineOperation> {
        self.pending.lock().await.clone()
    }

    /// Pending operations plus any taken by a replay still in progress.
    pub async fn outstanding(&self) -> Vec<OfflineOperation> {
        let pending = self.pending.lock().await;
        let mut ops = self.in_flight.lock().await.clone();
        ops.extend(pending.iter().cloned());
        ops
    }

    /// Number of pending operations.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Returns true if nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Copy of the dead-letter list.
    pub async fn dead_letters(&self) -> Vec<OfflineOperation> {
        self.dead.lock().await.clone()
    }

    /// Empties the dead-letter list. Returns how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the mirror cannot be written.
    pub async fn clear_dead_letters(&self) -> Result<usize, StoreError> {
        let mut dead = self.dead.lock().await;
        let count = dead.len();
        dead.clear();
        self.kv.remove(DEAD_LETTER_KEY).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartwise_core::OperationKind;
    use chrono::Utc;
    use serde_json::json;

    fn op(id: &str) -> OfflineOperation {
        OfflineOperation::new(OperationKind::DeleteItem, json!({ "id": id }), Utc::now())
    }

    #[tokio::test]
    async fn test_enqueue_mirrors_to_fallback() {
        let kv = Arc::new(KvStore::in_memory());
        let queue = OfflineQueue::load(Arc::clone(&kv)).await;

        queue.enqueue(op("a")).await.unwrap();
        queue.enqueue(op("b")).await.unwrap();

        let restored = OfflineQueue::load(kv).await;
        let pending = restored.pending().await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].payload["id"], "a");
        assert_eq!(pending[1].payload["id"], "b");
    }

    #[tokio::test]
    async fn test_enqueue_failure_drops_operation() {
        let kv = Arc::new(KvStore::in_memory());
        let queue = OfflineQueue::load(Arc::clone(&kv)).await;
        kv.set_fail_writes(true);

        assert!(queue.enqueue(op("a")).await.is_err());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_restore_front_keeps_fifo() {
        let kv = Arc::new(KvStore::in_memory());
        let queue = OfflineQueue::load(kv).await;
        queue.enqueue(op("first")).await.unwrap();

        let taken = queue.take_all().await;
        queue.enqueue(op("later")).await.unwrap();
        queue.restore_front(taken).await.unwrap();

        let ids: Vec<_> = queue
            .pending()
            .await
            .iter()
            .map(|o| o.payload["id"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, vec!["first", "later"]);
    }

    #[tokio::test]
    async fn test_taken_operations_stay_outstanding() {
        let kv = Arc::new(KvStore::in_memory());
        let queue = OfflineQueue::load(kv).await;
        queue.enqueue(op("a")).await.unwrap();

        let taken = queue.take_all().await;
        queue.enqueue(op("b")).await.unwrap();
        assert_eq!(queue.pending().await.len(), 1);
        assert_eq!(queue.outstanding().await.len(), 2);

        queue.restore_front(Vec::new()).await.unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(queue.outstanding().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dead_letters_persist_and_clear() {
        let kv = Arc::new(KvStore::in_memory());
        let queue = OfflineQueue::load(Arc::clone(&kv)).await;
        queue.dead_letter(op("x")).await.unwrap();

        let restored = OfflineQueue::load(Arc::clone(&kv)).await;
        assert_eq!(restored.dead_letters().await.len(), 1);
        assert_eq!(restored.clear_dead_letters().await.unwrap(), 1);
        assert!(OfflineQueue::load(kv).await.dead_letters().await.is_empty());
    }
}
