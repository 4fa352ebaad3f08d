//! Storage engines.
//!
//! The [`StorageEngine`] trait is the seam between the store and whatever
//! durably holds its records. Records cross it as JSON values keyed by
//! primary id (product statistics are keyed by name).
//!
//! - [`SqliteEngine`] - the on-disk primary engine
//! - [`MemoryEngine`] - an in-process engine with fault injection

mod memory;
mod sqlite;

pub use memory::MemoryEngine;
pub use sqlite::SqliteEngine;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::error::StoreError;

/// Newest schema version the engines understand.
///
/// - 1: lists, items, product statistics, settings
/// - 2: adds budgets
pub const SCHEMA_VERSION: u32 = 2;

// ============================================================================
// Collections
// ============================================================================

/// The logical collections the store keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Shopping lists, keyed by id.
    Lists,
    /// List items, keyed by id.
    Items,
    /// Product statistics, keyed by item name.
    ProductStats,
    /// Budgets, keyed by id.
    Budgets,
    /// The settings singleton.
    Settings,
}

impl Collection {
    /// All collections, in schema order.
    pub fn all() -> &'static [Collection] {
        &[
            Collection::Lists,
            Collection::Items,
            Collection::ProductStats,
            Collection::Budgets,
            Collection::Settings,
        ]
    }

    /// Table name in the primary engine.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Lists => "lists",
            Collection::Items => "items",
            Collection::ProductStats => "product_stats",
            Collection::Budgets => "budgets",
            Collection::Settings => "settings",
        }
    }

    /// Schema version that introduced the collection.
    pub fn since_version(&self) -> u32 {
        match self {
            Collection::Budgets => 2,
            _ => 1,
        }
    }

    /// Key of the serialized collection in the fallback store.
    pub fn fallback_key(&self) -> String {
        format!("cartwise.{}", self.table())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

// ============================================================================
// Engine Trait
// ============================================================================

/// Durable key-value storage organized in named collections.
///
/// Engines only store and return records; soft delete, validation and change
/// notification all live in the store above them.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Fetches one record.
    ///
    /// Returns `Ok(None)` when the key is absent.
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError>;

    /// Fetches every record of a collection.
    async fn get_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    /// Inserts or replaces a record.
    async fn put(&self, collection: Collection, key: &str, record: &Value)
    -> Result<(), StoreError>;

    /// Removes a record. Returns whether it existed.
    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError>;

    /// Schema version currently applied.
    async fn schema_version(&self) -> Result<u32, StoreError>;
}
