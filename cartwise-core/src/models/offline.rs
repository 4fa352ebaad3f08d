//! Deferred write operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::new_id;

/// Which store operation a deferred write replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Payload: the full list record.
    CreateList,
    /// Payload: `{ "id", "patch" }`.
    UpdateList,
    /// Payload: `{ "id", "deletedAt" }`.
    DeleteList,
    /// Payload: the full item record.
    CreateItem,
    /// Payload: `{ "id", "patch" }`.
    UpdateItem,
    /// Payload: `{ "id" }`.
    DeleteItem,
    /// Payload: the full budget record.
    CreateBudget,
    /// Payload: `{ "id", "patch" }`.
    UpdateBudget,
    /// Payload: `{ "id" }`.
    DeleteBudget,
    /// Payload: the settings patch.
    UpdateSettings,
    /// Payload: `{ "name", "price", "category" }`.
    UpsertProductStat,
}

impl OperationKind {
    /// Stable operation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateList => "create_list",
            OperationKind::UpdateList => "update_list",
            OperationKind::DeleteList => "delete_list",
            OperationKind::CreateItem => "create_item",
            OperationKind::UpdateItem => "update_item",
            OperationKind::DeleteItem => "delete_item",
            OperationKind::CreateBudget => "create_budget",
            OperationKind::UpdateBudget => "update_budget",
            OperationKind::DeleteBudget => "delete_budget",
            OperationKind::UpdateSettings => "update_settings",
            OperationKind::UpsertProductStat => "upsert_product_stat",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write that failed against the primary engine and waits for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineOperation {
    /// Synthetic identifier.
    pub id: String,
    /// Operation to replay.
    pub kind: OperationKind,
    /// Operation input, opaque to the queue.
    pub payload: serde_json::Value,
    /// When the operation was first queued.
    pub enqueued_at: DateTime<Utc>,
    /// Failed replay attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Earliest time the next replay may run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
}

impl OfflineOperation {
    /// Wraps a payload into a fresh operation.
    pub fn new(kind: OperationKind, payload: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            kind,
            payload,
            enqueued_at: now,
            attempts: 0,
            last_error: None,
            not_before: None,
        }
    }

    /// Whether the operation may be replayed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_none_or(|t| t <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_operation_is_due() {
        let now = Utc::now();
        let op = OfflineOperation::new(OperationKind::DeleteItem, serde_json::json!({"id": "x"}), now);
        assert_eq!(op.attempts, 0);
        assert!(op.is_due(now));
    }

    #[test]
    fn test_deferred_operation() {
        let now = Utc::now();
        let mut op = OfflineOperation::new(OperationKind::DeleteItem, serde_json::Value::Null, now);
        op.not_before = Some(now + Duration::seconds(30));
        assert!(!op.is_due(now));
        assert!(op.is_due(now + Duration::seconds(30)));
    }

    #[test]
    fn test_kind_names_match_serde() {
        let json = serde_json::to_string(&OperationKind::UpsertProductStat).unwrap();
        assert_eq!(json, format!("\"{}\"", OperationKind::UpsertProductStat.as_str()));
    }
}
