//! Item operations.

use cartwise_core::{Item, ItemPatch, NewItem, OperationKind};
use chrono::Utc;
use tracing::{debug, warn};

use super::payload::{PatchPayload, TargetPayload, encode};
use super::{Mutation, Store, WriteOutcome, encode_record};
use crate::engine::Collection;
use crate::notifier::{ChangeAction, ChangeTopic};

impl Store {
    /// Every item of every list, oldest first. Soft delete is not applied.
    pub async fn items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.read_all(Collection::Items).await;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }

    /// Items of one list, oldest first.
    ///
    /// Empty when the list is soft-deleted.
    pub async fn items_for_list(&self, list_id: &str) -> Vec<Item> {
        if self.raw_list(list_id).await.is_some_and(|l| l.is_deleted()) {
            return Vec::new();
        }
        let mut items: Vec<Item> = self
            .read_all::<Item>(Collection::Items)
            .await
            .into_iter()
            .filter(|item| item.list_id == list_id)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }

    /// An item by id.
    pub async fn item(&self, id: &str) -> Option<Item> {
        self.read_one(Collection::Items, id).await
    }

    /// Adds an item to a visible list and records a product use.
    ///
    /// When the list cannot be read at all, or still has queued writes, the
    /// item is queued; replay drops it if the list turns out to be missing.
    pub async fn create_item(&self, input: NewItem) -> WriteOutcome<Item> {
        let queue_it = match self.live_list(&input.list_id).await {
            Ok(Some(_)) => self.is_queued(Collection::Lists, &input.list_id).await,
            Ok(None) => return WriteOutcome::NotFound,
            Err(e) => {
                warn!(list_id = %input.list_id, error = %e, "List unreadable, queueing item");
                true
            }
        };
        let now = Utc::now();
        let item = match Item::create(&input, now) {
            Ok(item) => item,
            Err(e) => return WriteOutcome::Failed(e.into()),
        };
        let value = match encode_record(&item) {
            Ok(value) => value,
            Err(e) => return WriteOutcome::Failed(e),
        };

        let mutation = Mutation::Put(&value);
        let payload = value.clone();
        let result = if queue_it {
            self.defer(Collection::Items, &item.id, mutation, OperationKind::CreateItem, payload)
                .await
        } else {
            self.write(Collection::Items, &item.id, mutation, OperationKind::CreateItem, payload)
                .await
        };
        let written = match result {
            Ok(written) => written,
            Err(e) => return WriteOutcome::Failed(e),
        };

        debug!(id = %item.id, list_id = %item.list_id, name = %item.name, "Item created");
        self.record_product_use(&item.name, item.price, item.category.as_deref(), now)
            .await;
        self.emit(ChangeTopic::Items, ChangeAction::Create, &item);
        written.outcome(item)
    }

    /// Merges `patch` into an item.
    ///
    /// A patch touching name or price also records a product use under the
    /// item's new name.
    pub async fn update_item(&self, id: &str, patch: ItemPatch) -> WriteOutcome<Item> {
        let mut item = match self.lookup::<Item>(Collection::Items, id).await {
            Ok(Some(item)) => item,
            Ok(None) => return WriteOutcome::NotFound,
            Err(e) => return WriteOutcome::Failed(e),
        };
        let now = Utc::now();
        if let Err(e) = item.apply(&patch, now) {
            return WriteOutcome::Failed(e.into());
        }
        let touches_stats = patch.touches_product_stats();
        let (value, payload) = match (
            encode_record(&item),
            encode(&PatchPayload {
                id: id.to_string(),
                patch,
            }),
        ) {
            (Ok(value), Ok(payload)) => (value, payload),
            (Err(e), _) | (_, Err(e)) => return WriteOutcome::Failed(e),
        };

        let written = match self
            .write(
                Collection::Items,
                id,
                Mutation::Put(&value),
                OperationKind::UpdateItem,
                payload,
            )
            .await
        {
            Ok(written) => written,
            Err(e) => return WriteOutcome::Failed(e),
        };

        if touches_stats {
            self.record_product_use(&item.name, item.price, item.category.as_deref(), now)
                .await;
        }
        self.emit(ChangeTopic::Items, ChangeAction::Update, &item);
        written.outcome(item)
    }

    /// Removes an item permanently.
    pub async fn delete_item(&self, id: &str) -> WriteOutcome<Item> {
        let item = match self.lookup::<Item>(Collection::Items, id).await {
            Ok(Some(item)) => item,
            Ok(None) => return WriteOutcome::NotFound,
            Err(e) => return WriteOutcome::Failed(e),
        };
        let payload = match encode(&TargetPayload { id: id.to_string() }) {
            Ok(payload) => payload,
            Err(e) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Items,
                id,
                Mutation::Remove,
                OperationKind::DeleteItem,
                payload,
            )
            .await
        {
            Ok(written) => {
                debug!(id, "Item deleted");
                self.emit(ChangeTopic::Items, ChangeAction::Delete, &item);
                written.outcome(item)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }
}
