//! Offline queue replay.

use cartwise_core::{
    Budget, BudgetPatch, Item, ItemPatch, ListPatch, OfflineOperation, OperationKind,
    ProductStat, ProfileSettings, SettingsPatch, ShoppingList,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use super::payload::{
    PatchPayload, RecordRef, SoftDeletePayload, StatUsePayload, TargetPayload, decode,
    dependencies, target,
};
use super::{Store, encode_record};
use crate::engine::{Collection, StorageEngine};
use crate::error::StoreError;
use crate::notifier::{ChangeAction, ChangeEvent, ChangeTopic};

/// Counts from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Operations applied to the primary engine.
    pub replayed: usize,
    /// Operations that failed and wait for another attempt.
    pub requeued: usize,
    /// Operations moved to the dead-letter list.
    pub dead_lettered: usize,
    /// Operations skipped because their backoff has not elapsed, because an
    /// earlier operation on the same record is still waiting, or because
    /// there is no primary engine.
    pub deferred: usize,
    /// Operations whose target (or, for a new item, its list) no longer
    /// exists.
    pub dropped: usize,
}

impl ReplayReport {
    /// Total operations looked at.
    pub fn total(&self) -> usize {
        self.replayed + self.requeued + self.dead_lettered + self.deferred + self.dropped
    }
}

/// Result of replaying one operation.
enum Replayed {
    Applied(Option<ChangeEvent>),
    Dropped,
}

impl Store {
    /// Replays queued writes against the primary engine.
    pub async fn process_offline_queue(&self) -> ReplayReport {
        self.process_offline_queue_at(Utc::now()).await
    }

    /// Replays queued writes as of `now`.
    ///
    /// Operations run in enqueue order. A failed operation is retried later
    /// with exponential backoff and dead-lettered once it runs out of
    /// attempts, or at once if the failure cannot be fixed by retrying.
    /// While an operation waits, later operations on the same record (and
    /// new items of a waiting list) wait behind it.
    pub async fn process_offline_queue_at(&self, now: DateTime<Utc>) -> ReplayReport {
        let mut report = ReplayReport::default();
        let ops = self.queue.take_all().await;
        if ops.is_empty() {
            return report;
        }

        let Some(engine) = self.primary.clone() else {
            report.deferred = ops.len();
            debug!(pending = ops.len(), "No primary engine, replay deferred");
            self.put_back(ops).await;
            return report;
        };

        info!(pending = ops.len(), "Replaying offline queue");
        let mut remaining = Vec::new();
        // Records whose earlier operation is still waiting; later operations
        // on them wait too.
        let mut blocked: HashSet<RecordRef> = HashSet::new();
        for mut op in ops {
            let waiting_on_earlier = dependencies(&op).iter().any(|dep| blocked.contains(dep));
            if waiting_on_earlier || !op.is_due(now) {
                report.deferred += 1;
                blocked.extend(target(&op));
                remaining.push(op);
                continue;
            }

            match replay_one(engine.as_ref(), &op).await {
                Ok(Replayed::Applied(event)) => {
                    report.replayed += 1;
                    debug!(id = %op.id, kind = %op.kind, "Operation replayed");
                    if let Some(event) = event {
                        self.notifier.emit(&event);
                    }
                }
                Ok(Replayed::Dropped) => {
                    report.dropped += 1;
                    debug!(id = %op.id, kind = %op.kind, "Replay target gone, dropping");
                }
                Err(e) => {
                    op.attempts = op.attempts.saturating_add(1);
                    op.last_error = Some(e.to_string());

                    if !e.is_transient() || self.retry.is_exhausted(op.attempts) {
                        error!(
                            id = %op.id,
                            kind = %op.kind,
                            attempts = op.attempts,
                            error = %e,
                            "Giving up on queued operation"
                        );
                        report.dead_lettered += 1;
                        if let Err(e) = self.queue.dead_letter(op).await {
                            warn!(error = %e, "Could not persist dead letter");
                        }
                    } else {
                        let delay = self.retry.backoff(op.attempts);
                        let delay = chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::days(1));
                        op.not_before = Some(now + delay);
                        warn!(
                            id = %op.id,
                            kind = %op.kind,
                            attempts = op.attempts,
                            error = %e,
                            "Replay failed, will retry"
                        );
                        report.requeued += 1;
                        blocked.extend(target(&op));
                        remaining.push(op);
                    }
                }
            }
        }

        self.put_back(remaining).await;
        if report.replayed + report.dropped + report.dead_lettered > 0 {
            self.sync_shadow().await;
        }
        info!(
            replayed = report.replayed,
            requeued = report.requeued,
            dead_lettered = report.dead_lettered,
            deferred = report.deferred,
            dropped = report.dropped,
            "Replay finished"
        );
        report
    }

    async fn put_back(&self, ops: Vec<OfflineOperation>) {
        if let Err(e) = self.queue.restore_front(ops).await {
            warn!(error = %e, "Could not persist offline queue");
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

async fn replay_one(
    engine: &dyn StorageEngine,
    op: &OfflineOperation,
) -> Result<Replayed, StoreError> {
    let at = op.enqueued_at;
    match op.kind {
        OperationKind::CreateList => {
            put_record::<ShoppingList>(engine, Collection::Lists, ChangeTopic::Lists, &op.payload)
                .await
        }
        OperationKind::CreateItem => {
            let item: Item = decode(&op.payload)?;
            let list = fetch::<ShoppingList>(engine, Collection::Lists, &item.list_id).await?;
            if !list.is_some_and(|l| !l.is_deleted()) {
                return Ok(Replayed::Dropped);
            }
            store(engine, Collection::Items, &item.id, &item).await?;
            applied(ChangeTopic::Items, ChangeAction::Create, &item)
        }
        OperationKind::CreateBudget => {
            put_record::<Budget>(engine, Collection::Budgets, ChangeTopic::Budgets, &op.payload)
                .await
        }
        OperationKind::UpdateList => {
            let payload: PatchPayload<ListPatch> = decode(&op.payload)?;
            let Some(mut list) = fetch::<ShoppingList>(engine, Collection::Lists, &payload.id)
                .await?
                .filter(|l| !l.is_deleted())
            else {
                return Ok(Replayed::Dropped);
            };
            list.apply(&payload.patch, at)?;
            store(engine, Collection::Lists, &payload.id, &list).await?;
            applied(ChangeTopic::Lists, ChangeAction::Update, &list)
        }
        OperationKind::UpdateItem => {
            let payload: PatchPayload<ItemPatch> = decode(&op.payload)?;
            let Some(mut item) = fetch::<Item>(engine, Collection::Items, &payload.id).await?
            else {
                return Ok(Replayed::Dropped);
            };
            item.apply(&payload.patch, at)?;
            store(engine, Collection::Items, &payload.id, &item).await?;
            applied(ChangeTopic::Items, ChangeAction::Update, &item)
        }
        OperationKind::UpdateBudget => {
            let payload: PatchPayload<BudgetPatch> = decode(&op.payload)?;
            let Some(mut budget) =
                fetch::<Budget>(engine, Collection::Budgets, &payload.id).await?
            else {
                return Ok(Replayed::Dropped);
            };
            budget.apply(&payload.patch, at)?;
            store(engine, Collection::Budgets, &payload.id, &budget).await?;
            applied(ChangeTopic::Budgets, ChangeAction::Update, &budget)
        }
        OperationKind::DeleteList => {
            let payload: SoftDeletePayload = decode(&op.payload)?;
            let Some(mut list) =
                fetch::<ShoppingList>(engine, Collection::Lists, &payload.id).await?
            else {
                return Ok(Replayed::Dropped);
            };
            list.mark_deleted(payload.deleted_at);
            store(engine, Collection::Lists, &payload.id, &list).await?;
            applied(ChangeTopic::Lists, ChangeAction::Delete, &list)
        }
        OperationKind::DeleteItem => {
            remove_record::<Item>(engine, Collection::Items, ChangeTopic::Items, &op.payload).await
        }
        OperationKind::DeleteBudget => {
            remove_record::<Budget>(engine, Collection::Budgets, ChangeTopic::Budgets, &op.payload)
                .await
        }
        OperationKind::UpdateSettings => {
            let patch: SettingsPatch = decode(&op.payload)?;
            let mut settings = fetch::<ProfileSettings>(
                engine,
                Collection::Settings,
                ProfileSettings::KEY,
            )
            .await?
            .unwrap_or_default();
            settings.apply(&patch, at)?;
            store(engine, Collection::Settings, ProfileSettings::KEY, &settings).await?;
            applied(ChangeTopic::Settings, ChangeAction::Update, &settings)
        }
        OperationKind::UpsertProductStat => {
            let payload: StatUsePayload = decode(&op.payload)?;
            let existing =
                fetch::<ProductStat>(engine, Collection::ProductStats, &payload.name).await?;
            let stat = ProductStat::upsert(
                existing,
                &payload.name,
                payload.price,
                payload.category.as_deref(),
                at,
            );
            store(engine, Collection::ProductStats, &payload.name, &stat).await?;
            Ok(Replayed::Applied(None))
        }
    }
}

/// Idempotent put of a full record carried by a create operation.
async fn put_record<T>(
    engine: &dyn StorageEngine,
    collection: Collection,
    topic: ChangeTopic,
    payload: &Value,
) -> Result<Replayed, StoreError>
where
    T: DeserializeOwned + Serialize + HasKey,
{
    let record: T = decode(payload)?;
    store(engine, collection, record.key(), &record).await?;
    applied(topic, ChangeAction::Create, &record)
}

async fn remove_record<T: DeserializeOwned + Serialize>(
    engine: &dyn StorageEngine,
    collection: Collection,
    topic: ChangeTopic,
    payload: &Value,
) -> Result<Replayed, StoreError> {
    let target: TargetPayload = decode(payload)?;
    let Some(record) = fetch::<T>(engine, collection, &target.id).await? else {
        return Ok(Replayed::Dropped);
    };
    engine.delete(collection, &target.id).await?;
    applied(topic, ChangeAction::Delete, &record)
}

async fn fetch<T: DeserializeOwned>(
    engine: &dyn StorageEngine,
    collection: Collection,
    key: &str,
) -> Result<Option<T>, StoreError> {
    engine
        .get(collection, key)
        .await?
        .map(|value| serde_json::from_value(value).map_err(StoreError::from))
        .transpose()
}

async fn store<T: Serialize>(
    engine: &dyn StorageEngine,
    collection: Collection,
    key: &str,
    record: &T,
) -> Result<(), StoreError> {
    engine.put(collection, key, &encode_record(record)?).await
}

fn applied<T: Serialize>(
    topic: ChangeTopic,
    action: ChangeAction,
    record: &T,
) -> Result<Replayed, StoreError> {
    let value = encode_record(record)?;
    Ok(Replayed::Applied(Some(ChangeEvent::new(topic, action, value))))
}

/// Records that carry their own primary key.
trait HasKey {
    fn key(&self) -> &str;
}

impl HasKey for ShoppingList {
    fn key(&self) -> &str {
        &self.id
    }
}

impl HasKey for Budget {
    fn key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_total() {
        let report = ReplayReport {
            replayed: 2,
            requeued: 1,
            dead_lettered: 1,
            deferred: 3,
            dropped: 1,
        };
        assert_eq!(report.total(), 8);
    }
}
