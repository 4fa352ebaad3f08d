//! Shopping list operations.

use cartwise_core::{ListPatch, NewList, OperationKind, ShoppingList};
use chrono::Utc;
use tracing::debug;

use super::payload::{PatchPayload, SoftDeletePayload, encode};
use super::{Mutation, Store, WriteOutcome, encode_record};
use crate::engine::Collection;
use crate::error::StoreError;
use crate::notifier::{ChangeAction, ChangeTopic};

impl Store {
    /// Visible lists, most recently updated first.
    pub async fn lists(&self) -> Vec<ShoppingList> {
        let mut lists: Vec<ShoppingList> = self
            .read_all::<ShoppingList>(Collection::Lists)
            .await
            .into_iter()
            .filter(|list| !list.is_deleted())
            .collect();
        lists.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        lists
    }

    /// A visible list by id.
    pub async fn list(&self, id: &str) -> Option<ShoppingList> {
        self.raw_list(id).await.filter(|list| !list.is_deleted())
    }

    /// A list by id, including soft-deleted ones.
    pub async fn raw_list(&self, id: &str) -> Option<ShoppingList> {
        self.read_one(Collection::Lists, id).await
    }

    /// A list that can still be changed: present and not soft-deleted.
    pub(super) async fn live_list(&self, id: &str) -> Result<Option<ShoppingList>, StoreError> {
        Ok(self
            .lookup::<ShoppingList>(Collection::Lists, id)
            .await?
            .filter(|list| !list.is_deleted()))
    }

    /// Creates a list. Without an explicit currency the settings default
    /// is used.
    pub async fn create_list(&self, input: NewList) -> WriteOutcome<ShoppingList> {
        let settings = self.settings().await;
        let list = match ShoppingList::create(&input, &settings.default_currency, Utc::now()) {
            Ok(list) => list,
            Err(e) => return WriteOutcome::Failed(e.into()),
        };
        let value = match encode_record(&list) {
            Ok(value) => value,
            Err(e) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Lists,
                &list.id,
                Mutation::Put(&value),
                OperationKind::CreateList,
                value.clone(),
            )
            .await
        {
            Ok(written) => {
                debug!(id = %list.id, name = %list.name, "List created");
                self.emit(ChangeTopic::Lists, ChangeAction::Create, &list);
                written.outcome(list)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }

    /// Merges `patch` into a visible list.
    pub async fn update_list(&self, id: &str, patch: ListPatch) -> WriteOutcome<ShoppingList> {
        let mut list = match self.live_list(id).await {
            Ok(Some(list)) => list,
            Ok(None) => return WriteOutcome::NotFound,
            Err(e) => return WriteOutcome::Failed(e),
        };
        if let Err(e) = list.apply(&patch, Utc::now()) {
            return WriteOutcome::Failed(e.into());
        }
        let (value, payload) = match (
            encode_record(&list),
            encode(&PatchPayload {
                id: id.to_string(),
                patch,
            }),
        ) {
            (Ok(value), Ok(payload)) => (value, payload),
            (Err(e), _) | (_, Err(e)) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Lists,
                id,
                Mutation::Put(&value),
                OperationKind::UpdateList,
                payload,
            )
            .await
        {
            Ok(written) => {
                self.emit(ChangeTopic::Lists, ChangeAction::Update, &list);
                written.outcome(list)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }

    /// Soft-deletes a list by stamping `deleted_at`.
    ///
    /// Its items are kept but no longer listed.
    pub async fn delete_list(&self, id: &str) -> WriteOutcome<ShoppingList> {
        let mut list = match self.live_list(id).await {
            Ok(Some(list)) => list,
            Ok(None) => return WriteOutcome::NotFound,
            Err(e) => return WriteOutcome::Failed(e),
        };
        let now = Utc::now();
        list.mark_deleted(now);
        let (value, payload) = match (
            encode_record(&list),
            encode(&SoftDeletePayload {
                id: id.to_string(),
                deleted_at: now,
            }),
        ) {
            (Ok(value), Ok(payload)) => (value, payload),
            (Err(e), _) | (_, Err(e)) => return WriteOutcome::Failed(e),
        };

        match self
            .write(
                Collection::Lists,
                id,
                Mutation::Put(&value),
                OperationKind::DeleteList,
                payload,
            )
            .await
        {
            Ok(written) => {
                debug!(id, "List soft-deleted");
                self.emit(ChangeTopic::Lists, ChangeAction::Delete, &list);
                written.outcome(list)
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }
}
