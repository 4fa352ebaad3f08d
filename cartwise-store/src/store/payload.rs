//! Offline operation payloads.
//!
//! Create operations carry the full record and need no wrapper. Everything
//! else is one of the shapes below, written when an operation is queued and
//! read back on replay.

use cartwise_core::{OfflineOperation, OperationKind, ProfileSettings};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::Collection;
use crate::error::StoreError;

/// A record in the primary engine.
pub(crate) type RecordRef = (Collection, String);

/// `{ "id" }` for hard deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TargetPayload {
    pub id: String,
}

/// `{ "id", "patch" }` for updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PatchPayload<P> {
    pub id: String,
    pub patch: P,
}

/// `{ "id", "deletedAt" }` for list soft deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SoftDeletePayload {
    pub id: String,
    pub deleted_at: DateTime<Utc>,
}

/// `{ "name", "price", "category" }` for product statistic upserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StatUsePayload {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
}

/// Serializes a payload for queueing.
pub(crate) fn encode<T: Serialize>(payload: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(payload)?)
}

/// Reads a queued payload back.
pub(crate) fn decode<T: DeserializeOwned>(payload: &Value) -> Result<T, StoreError> {
    T::deserialize(payload).map_err(|e| StoreError::InvalidPayload(e.to_string()))
}

/// The record an operation writes, or `None` if its payload names none.
pub(crate) fn target(op: &OfflineOperation) -> Option<RecordRef> {
    let collection = match op.kind {
        OperationKind::CreateList | OperationKind::UpdateList | OperationKind::DeleteList => {
            Collection::Lists
        }
        OperationKind::CreateItem | OperationKind::UpdateItem | OperationKind::DeleteItem => {
            Collection::Items
        }
        OperationKind::CreateBudget | OperationKind::UpdateBudget | OperationKind::DeleteBudget => {
            Collection::Budgets
        }
        OperationKind::UpdateSettings => {
            return Some((Collection::Settings, ProfileSettings::KEY.to_string()));
        }
        OperationKind::UpsertProductStat => Collection::ProductStats,
    };
    let field = match collection {
        Collection::ProductStats => "name",
        _ => "id",
    };
    let key = op.payload.get(field)?.as_str()?;
    Some((collection, key.to_string()))
}

/// Records that must be settled before `op` may replay: its target and,
/// for a new item, the list it goes into.
pub(crate) fn dependencies(op: &OfflineOperation) -> Vec<RecordRef> {
    let mut deps: Vec<RecordRef> = target(op).into_iter().collect();
    if op.kind == OperationKind::CreateItem {
        if let Some(list_id) = op.payload.get("listId").and_then(Value::as_str) {
            deps.push((Collection::Lists, list_id.to_string()));
        }
    }
    deps
}
